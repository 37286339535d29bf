//! SQL literal rendering and column type mapping.
//!
//! Every value that ends up inside generated SQL text goes through [`escape`],
//! so this is the module to review for quoting problems.

use crate::cells::{Cell, ColumnType};

/// Render a value as a SQL literal
///
/// * nulls and non-finite floats become `NULL`
/// * strings are single quoted, with embedded quotes doubled
/// * timestamps become `TIMESTAMP 'YYYY-MM-DD HH:MM:SS'` (truncated to seconds)
/// * dates become `DATE 'YYYY-MM-DD'`
/// * booleans become `TRUE` / `FALSE`
/// * numbers are emitted unquoted
pub fn escape(value: &Cell) -> String {
    match value {
        Cell::Null => "NULL".to_owned(),
        Cell::Float(f) if !f.is_finite() => "NULL".to_owned(),
        Cell::Varchar(s) => quote_string(s),
        Cell::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S")),
        Cell::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
        Cell::Boolean(true) => "TRUE".to_owned(),
        Cell::Boolean(false) => "FALSE".to_owned(),
        // Debug keeps a decimal point or exponent, so the engine reads a DOUBLE
        Cell::Float(f) => format!("{f:?}"),
        Cell::Int(i) => i.to_string(),
    }
}

/// Single quote a string for use as a SQL string literal
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Double quote an identifier, doubling embedded double quotes
pub fn quote_identifier(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Map a column type to the SQL type keyword used when creating tables
pub fn map_type(column_type: &ColumnType) -> &'static str {
    match column_type {
        ColumnType::Int8
        | ColumnType::Int16
        | ColumnType::Int32
        | ColumnType::Int64
        | ColumnType::UInt8
        | ColumnType::UInt16
        | ColumnType::UInt32
        | ColumnType::UInt64 => "BIGINT",
        ColumnType::Float32 | ColumnType::Float64 => "DOUBLE",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Date | ColumnType::Datetime => "TIMESTAMP",
        ColumnType::Utf8 | ColumnType::Other(_) => "VARCHAR",
    }
}
