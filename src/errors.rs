use serde::Deserialize;

/// Status the engine reports when a `CREATE` target already exists
pub const CONFLICT_STATUS: u16 = 409;
/// Status the engine reports when a catalog entry or table is missing
pub const NOT_FOUND_STATUS: u16 = 404;
/// Status assigned to failed jobs that are neither conflicts nor missing objects
pub const FAILED_JOB_STATUS: u16 = 400;

#[derive(thiserror::Error, Debug)]
pub enum DremioError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("Dremio engine error: {status}: {message}")]
    Engine { status: u16, message: String },
    #[error("Table '{path}' already exists. Use update_table() to modify it. {message}")]
    TableExists { path: String, message: String },
    #[error("Table '{path}' does not exist. Use create_table() instead.")]
    TableNotFound { path: String },
    #[error("Invalid usage: {0}")]
    Usage(String),
    #[error(transparent)]
    JSONError(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Job {0} was cancelled: {1}")]
    JobCancelled(String, String),
    #[error("Job {0} did not finish within {1} seconds")]
    JobTimeout(String, u64),
    #[error("Missing configuration: {0} not set")]
    MissingConfig(&'static str),
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
}

pub type DremioResult<T> = Result<T, DremioError>;

impl DremioError {
    pub(crate) fn usage(message: impl Into<String>) -> DremioError {
        DremioError::Usage(message.into())
    }

    /// The engine status code carried by this error, if any
    ///
    /// Conflicts report [`CONFLICT_STATUS`] and missing tables [`NOT_FOUND_STATUS`]
    /// even after they have been relabeled.
    pub fn status(&self) -> Option<u16> {
        match self {
            DremioError::Engine { status, .. } => Some(*status),
            DremioError::TableExists { .. } => Some(CONFLICT_STATUS),
            DremioError::TableNotFound { .. } => Some(NOT_FOUND_STATUS),
            DremioError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the engine rejected a statement because its target already exists
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(CONFLICT_STATUS)
    }

    /// Whether this error means a catalog entry is missing
    ///
    /// Checks the status first and falls back to matching the message.
    pub fn is_not_found(&self) -> bool {
        match self {
            DremioError::TableNotFound { .. } => true,
            DremioError::Engine { status, message } => {
                *status == NOT_FOUND_STATUS || message_reports_missing(message)
            }
            _ => false,
        }
    }
}

const MISSING_PATTERNS: &[&str] = &["no such file or directory", "could not find", "does not exist"];

/// Catalog objects whose name may be followed directly by "not found"
const MISSING_SUBJECTS: &[&str] = &["object ", "table ", "dataset ", "entity "];

const EXISTING_PATTERNS: &[&str] = &["already exists"];

/// Whether an engine message says a catalog object is missing
///
/// "not found" only counts right after a quoted object name, as in
/// `Object 'x' not found within 'space'` or `Table [a.b] not found`,
/// so that `Column 'x' not found in any table` does not.
pub(crate) fn message_reports_missing(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    MISSING_PATTERNS.iter().any(|p| message.contains(p)) || names_missing_object(&message)
}

fn names_missing_object(message: &str) -> bool {
    MISSING_SUBJECTS.iter().any(|subject| {
        message.match_indices(subject).any(|(start, _)| {
            let rest = &message[start + subject.len()..];
            let close = match rest.chars().next() {
                Some('\'') => '\'',
                Some('"') => '"',
                Some('[') => ']',
                _ => return false,
            };
            rest[1..]
                .find(close)
                .map(|end| rest[end + 2..].trim_start().starts_with("not found"))
                .unwrap_or(false)
        })
    })
}

/// Classify the message of a failed job into a status code
///
/// The job API reports failed jobs with a message only, no structured code.
/// Only messages about a missing catalog object are classified as [`NOT_FOUND_STATUS`].
pub(crate) fn classify_job_failure(message: &str) -> u16 {
    let lower = message.to_ascii_lowercase();
    if EXISTING_PATTERNS.iter().any(|p| lower.contains(p)) {
        CONFLICT_STATUS
    } else if message_reports_missing(message) {
        NOT_FOUND_STATUS
    } else {
        FAILED_JOB_STATUS
    }
}

/// Error body returned by the REST API on non-2xx responses
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireError {
    pub error_message: String,
}

/// Turn a non-2xx response into an engine error, keeping the server's message
pub(crate) async fn check_response(response: reqwest::Response) -> DremioResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    let message = match serde_json::from_str::<WireError>(&body) {
        Ok(wire) => wire.error_message,
        Err(_) => body,
    };
    Err(DremioError::Engine {
        status: status.as_u16(),
        message,
    })
}
