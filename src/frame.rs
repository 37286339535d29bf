use crate::cells::{Cell, ColumnType};
use crate::errors::{DremioError, DremioResult};

/// A named, typed column of a `DataFrame`
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Column {
        Column {
            name: name.into(),
            data_type,
        }
    }
}

/// An in-memory table: ordered, typed columns plus rows of `Cell`s
///
/// This is what the table helpers materialize into Dremio.
/// Every row has exactly one cell per column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl DataFrame {
    /// Create an empty frame with the given schema
    pub fn new(columns: Vec<Column>) -> DataFrame {
        DataFrame {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, which must have one cell per column
    pub fn push_row(&mut self, row: Vec<Cell>) -> DremioResult<()> {
        if row.len() != self.columns.len() {
            return Err(DremioError::usage(format!(
                "row has {} values but the frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builder-style [`DataFrame::push_row`]
    pub fn with_row(mut self, row: Vec<Cell>) -> DremioResult<DataFrame> {
        self.push_row(row)?;
        Ok(self)
    }

    /// Build a frame from named columns of values
    ///
    /// Each column's type is inferred from its non-null values, widening integers
    /// to floats where both appear; all-null columns become `Utf8`.
    /// All columns must have the same length.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Cell>)>) -> DremioResult<DataFrame> {
        let height = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut schema = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            let name: String = name.into();
            if values.len() != height {
                return Err(DremioError::usage(format!(
                    "column {name:?} has {} values, expected {height}",
                    values.len()
                )));
            }
            schema.push(Column::new(name, infer_type(&values)));
            data.push(values.into_iter());
        }
        let rows = (0..height)
            .map(|_| data.iter_mut().filter_map(Iterator::next).collect())
            .collect();
        Ok(DataFrame {
            columns: schema,
            rows,
        })
    }

    /// Build a frame from a list of JSON objects
    ///
    /// Columns appear in the order their keys are first seen.
    /// Missing keys become nulls, nested values are kept as JSON text.
    pub fn from_json_objects(objects: &[serde_json::Value]) -> DremioResult<DataFrame> {
        let mut names: Vec<String> = Vec::new();
        for object in objects {
            let map = object
                .as_object()
                .ok_or_else(|| DremioError::usage("expected an array of JSON objects"))?;
            for key in map.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
        let columns: Vec<(String, Vec<Cell>)> = names
            .into_iter()
            .map(|name| {
                let values = objects
                    .iter()
                    .map(|object| json_to_cell(object.get(&name)))
                    .collect();
                (name, values)
            })
            .collect();
        DataFrame::from_columns(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Convert back into a list of JSON objects
    pub fn json_objects(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                serde_json::Value::Object(
                    row.iter()
                        .zip(&self.columns)
                        .map(|(cell, column)| (column.name.clone(), cell.clone().into()))
                        .collect(),
                )
            })
            .collect()
    }
}

/// The narrowest type that holds every non-null value
///
/// Integers mixed with floats widen to `Float64`, dates mixed with timestamps to
/// `Datetime`. Any other mix of kinds, or no values at all, gives `Utf8`.
fn infer_type(values: &[Cell]) -> ColumnType {
    let mut kinds = values.iter().filter_map(Cell::column_type);
    let Some(first) = kinds.next() else {
        return ColumnType::Utf8;
    };
    kinds
        .try_fold(first, |seen, next| match (seen, next) {
            (seen, next) if seen == next => Some(seen),
            (ColumnType::Int64, ColumnType::Float64) | (ColumnType::Float64, ColumnType::Int64) => {
                Some(ColumnType::Float64)
            }
            (ColumnType::Date, ColumnType::Datetime) | (ColumnType::Datetime, ColumnType::Date) => {
                Some(ColumnType::Datetime)
            }
            _ => None,
        })
        .unwrap_or(ColumnType::Utf8)
}

fn json_to_cell(value: Option<&serde_json::Value>) -> Cell {
    use serde_json::Value;
    match value {
        None | Some(Value::Null) => Cell::Null,
        Some(Value::Bool(b)) => Cell::Boolean(*b),
        Some(Value::Number(n)) => {
            let text = n.to_string();
            match text.parse::<i128>() {
                Ok(i) => Cell::Int(i),
                Err(_) => n.as_f64().map(Cell::Float).unwrap_or(Cell::Varchar(text)),
            }
        }
        Some(Value::String(s)) => Cell::Varchar(s.clone()),
        Some(nested) => Cell::Varchar(nested.to_string()),
    }
}
