use std::fmt;
use std::str::FromStr;

use crate::errors::{DremioError, DremioResult};
use crate::literal::quote_identifier;

/// A path in the Dremio catalog, e.g. `space.folder.table`
///
/// Segments are stored unquoted and never contain double quotes.
/// The `Display` form is the dotted, double-quoted identifier (`"a"."b"."c"`),
/// which parses back into the same segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TablePath {
    segments: Vec<String>,
}

impl TablePath {
    /// Build a path from segments, stripping double quotes and dropping empty segments
    pub fn new<I, S>(segments: I) -> TablePath
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TablePath {
            segments: segments
                .into_iter()
                .map(|s| s.as_ref().replace('"', ""))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a path from its string form
    ///
    /// Accepts dotted notation with optionally quoted segments (`a."b c".'d.e'`)
    /// and bracketed lists (`[a, "b c", 'd']`).
    pub fn parse(path: &str) -> DremioResult<TablePath> {
        let trimmed = path.trim();
        let segments = match trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            Some(inner) => split_segments(inner, ',', path)?,
            None => split_segments(trimmed, '.', path)?,
        };
        Ok(TablePath::new(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment, usually the table name
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Everything but the last segment
    pub fn parent(&self) -> TablePath {
        let end = self.segments.len().saturating_sub(1);
        TablePath {
            segments: self.segments[..end].to_vec(),
        }
    }

    /// Append a segment
    pub fn join(&self, segment: &str) -> TablePath {
        let mut segments = self.segments.clone();
        segments.push(segment.replace('"', ""));
        TablePath::new(segments)
    }

    /// Replace the last segment
    pub fn with_name(&self, name: &str) -> TablePath {
        self.parent().join(name)
    }

    /// The double-quoted form, safe to embed in SQL as an identifier
    pub fn quoted(&self) -> String {
        self.segments
            .iter()
            .map(|s| quote_identifier(s))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The plain dotted form `a.b.c`, ambiguous when a segment contains a dot
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

/// Split on `separator`, honouring single and double quoted segments
///
/// Inside single quotes a backslash escapes the next character.
fn split_segments(input: &str, separator: char, original: &str) -> DremioResult<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('\'') if c == '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == separator => {
                segments.push(current.trim().to_owned());
                current.clear();
            }
            None => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(DremioError::usage(format!(
            "unterminated quote in path {original:?}"
        )));
    }
    segments.push(current.trim().to_owned());
    Ok(segments)
}

impl FromStr for TablePath {
    type Err = DremioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TablePath::parse(s)
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted())
    }
}

impl From<Vec<String>> for TablePath {
    fn from(segments: Vec<String>) -> Self {
        TablePath::new(segments)
    }
}

impl From<&[&str]> for TablePath {
    fn from(segments: &[&str]) -> Self {
        TablePath::new(segments)
    }
}

impl<const N: usize> From<[&str; N]> for TablePath {
    fn from(segments: [&str; N]) -> Self {
        TablePath::new(segments)
    }
}
