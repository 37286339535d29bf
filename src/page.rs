use std::sync::Arc;

use serde::Deserialize;

use crate::cells::{Cell, ColumnType};
use crate::errors::DremioResult;
use crate::frame::{Column, DataFrame};

/// One page of a query's results
pub struct Page {
    pub(crate) schema: Arc<Vec<Column>>,
    pub(crate) data: Arc<Vec<serde_json::Value>>,
    pub(crate) index: usize,
}

impl Page {
    pub(crate) fn new(
        index: usize,
        schema: Arc<Vec<Column>>,
        data: Arc<Vec<serde_json::Value>>,
    ) -> Page {
        Page {
            schema,
            data,
            index,
        }
    }

    /// Get the index of this page
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the number of rows in just this page
    /// This is obtained from data.len() rather than the job's row count
    /// because this page may have been constructed by concatenating
    pub fn num_rows(&self) -> usize {
        self.data.len()
    }

    /// The rows just as they were returned from Dremio, one JSON object per row
    pub fn raw_rows(&self) -> &[serde_json::Value] {
        self.data.as_ref()
    }

    /// Convert the rows into `Cell`s in a list of lists format, in schema column order
    pub fn cells(&self) -> Vec<Vec<Cell>> {
        self.data
            .iter()
            .map(|row| {
                self.schema
                    .iter()
                    .map(|column| {
                        column
                            .data_type
                            .to_cell(row.get(&column.name).unwrap_or(&serde_json::Value::Null))
                    })
                    .collect()
            })
            .collect()
    }

    /// Convert the rows into `serde_json::Value`s in a list of lists format
    pub fn json_table(&self) -> Vec<Vec<serde_json::Value>> {
        self.cells()
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.into()).collect())
            .collect()
    }

    /// Convert the rows into `serde_json::Value`s in a list of objects format
    pub fn json_objects(&self) -> Vec<serde_json::Value> {
        self.json_table()
            .into_iter()
            .map(|row| {
                serde_json::Value::Object(
                    row.into_iter()
                        .enumerate()
                        .map(|(i, cell)| (self.schema[i].name.clone(), cell))
                        .collect(),
                )
            })
            .collect()
    }

    /// Copy this page into a `DataFrame` with the same schema
    pub fn to_frame(&self) -> DremioResult<DataFrame> {
        let mut frame = DataFrame::new(self.schema.as_ref().clone());
        for row in self.cells() {
            frame.push_row(row)?;
        }
        Ok(frame)
    }
}

//
// Wire types
//

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireResults {
    pub row_count: usize,
    #[serde(default)]
    pub schema: Vec<WireField>,
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
}

impl WireResults {
    pub fn columns(&self) -> Vec<Column> {
        self.schema
            .iter()
            .map(|field| Column::new(&field.name, ColumnType::from_sql_name(&field.data_type.name)))
            .collect()
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct WireField {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: WireFieldType,
}

#[derive(Deserialize, Debug)]
pub(crate) struct WireFieldType {
    pub name: String,
}
