use chrono::naive::{NaiveDate, NaiveDateTime};

/// The semantic type of a `DataFrame` column
///
/// These mirror the dtypes a DataFrame library exposes, so that adapters can map
/// one-to-one. Use [`crate::map_type`] to get the SQL keyword used in `CREATE TABLE`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
    Date,
    Datetime,
    Utf8,
    /// Anything else, e.g. nested or engine-specific types, by name
    Other(String),
}

impl ColumnType {
    /// Parse the type name Dremio reports in a result schema
    pub fn from_sql_name(name: &str) -> ColumnType {
        match name.to_ascii_uppercase().as_str() {
            "TINYINT" => ColumnType::Int8,
            "SMALLINT" => ColumnType::Int16,
            "INT" | "INTEGER" => ColumnType::Int32,
            "BIGINT" => ColumnType::Int64,
            "FLOAT" => ColumnType::Float32,
            "DOUBLE" | "DECIMAL" => ColumnType::Float64,
            "BOOLEAN" => ColumnType::Boolean,
            "DATE" => ColumnType::Date,
            "TIMESTAMP" => ColumnType::Datetime,
            "VARCHAR" | "CHAR" => ColumnType::Utf8,
            other => ColumnType::Other(other.to_owned()),
        }
    }

    /// Convert a JSON value from a result row into a `Cell` of this type
    ///
    /// Values that don't parse as the declared type are kept as text
    /// rather than dropped.
    pub fn to_cell(&self, value: &serde_json::Value) -> Cell {
        use serde_json::Value;
        match (self, value) {
            (_, Value::Null) => Cell::Null,
            (_, Value::Bool(b)) => Cell::Boolean(*b),
            (
                ColumnType::Float32 | ColumnType::Float64,
                Value::Number(n),
            ) => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            (_, Value::Number(n)) => {
                let text = n.to_string();
                match text.parse::<i128>() {
                    Ok(i) => Cell::Int(i),
                    Err(_) => text.parse().map(Cell::Float).unwrap_or(Cell::Varchar(text)),
                }
            }
            (ColumnType::Date, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Cell::Date)
                .unwrap_or_else(|_| Cell::Varchar(s.clone())),
            (ColumnType::Datetime, Value::String(s)) => parse_timestamp(s)
                .map(Cell::Timestamp)
                .unwrap_or_else(|| Cell::Varchar(s.clone())),
            (_, Value::String(s)) => Cell::Varchar(s.clone()),
            (_, nested) => Cell::Varchar(nested.to_string()),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// A single scalar value, either read from a result set or supplied in a `DataFrame`
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Int(i128),
    Float(f64),
    Varchar(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// The column type a value of this kind implies, `None` for nulls
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Cell::Null => None,
            Cell::Int(_) => Some(ColumnType::Int64),
            Cell::Float(_) => Some(ColumnType::Float64),
            Cell::Varchar(_) => Some(ColumnType::Utf8),
            Cell::Boolean(_) => Some(ColumnType::Boolean),
            Cell::Date(_) => Some(ColumnType::Date),
            Cell::Timestamp(_) => Some(ColumnType::Datetime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

macro_rules! impl_cell {
    ($ty: ty, $ex: ident, $conv: expr) => {
        impl From<$ty> for Cell {
            fn from(value: $ty) -> Self {
                Cell::$ex($conv(value))
            }
        }
    };
}
impl_cell!(bool, Boolean, |v| v);
impl_cell!(i8, Int, i128::from);
impl_cell!(i16, Int, i128::from);
impl_cell!(i32, Int, i128::from);
impl_cell!(i64, Int, i128::from);
impl_cell!(u8, Int, i128::from);
impl_cell!(u16, Int, i128::from);
impl_cell!(u32, Int, i128::from);
impl_cell!(u64, Int, i128::from);
impl_cell!(f32, Float, f64::from);
impl_cell!(f64, Float, |v| v);
impl_cell!(String, Varchar, |v| v);
impl_cell!(&str, Varchar, str::to_owned);
impl_cell!(NaiveDate, Date, |v| v);
impl_cell!(NaiveDateTime, Timestamp, |v| v);

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

impl From<Cell> for serde_json::Value {
    fn from(cell: Cell) -> Self {
        use serde_json::json;
        use Cell::*;
        match cell {
            Null => json!(null),
            Int(value) => json!(value),
            Float(value) => json!(value),
            Varchar(value) => json!(value),
            Boolean(value) => json!(value),
            Date(value) => json!(value),
            Timestamp(value) => json!(value),
        }
    }
}
