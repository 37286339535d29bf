//! Rendering of the DDL/DML statements used by the table helpers.
//!
//! These only produce text. Nothing here is parsed or validated locally;
//! the engine is responsible for rejecting malformed statements.

use crate::cells::Cell;
use crate::frame::Column;
use crate::literal::{escape, map_type, quote_identifier, quote_string};
use crate::path::TablePath;

/// Source of rows for a `MERGE INTO`
#[derive(Clone, Copy, Debug)]
pub enum MergeSource<'a> {
    Query(&'a str),
    Table(&'a TablePath),
}

/// Column definition list, e.g. `"id" BIGINT, "name" VARCHAR`
pub fn column_definitions(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), map_type(&c.data_type)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table(target: &TablePath, columns: &[Column]) -> String {
    format!("CREATE TABLE {target} ({})", column_definitions(columns))
}

pub fn create_table_as(target: &TablePath, query: &str) -> String {
    format!("CREATE TABLE {target} AS {query}")
}

/// A single `INSERT INTO ... VALUES` with one tuple per row
pub fn insert_values(target: &TablePath, rows: &[Vec<Cell>]) -> String {
    let tuples = rows
        .iter()
        .map(|row| {
            let values = row.iter().map(escape).collect::<Vec<_>>().join(", ");
            format!("({values})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {target} VALUES {tuples}")
}

/// `MERGE INTO` with the target aliased `t` and the source aliased `s`
pub fn merge_into(target: &TablePath, source: MergeSource<'_>, on: &str) -> String {
    let using = match source {
        MergeSource::Query(query) => format!("({query})"),
        MergeSource::Table(table) => table.quoted(),
    };
    format!(
        "MERGE INTO {target} AS t USING {using} AS s ON ({on}) \
         WHEN MATCHED THEN UPDATE SET * \
         WHEN NOT MATCHED THEN INSERT *"
    )
}

pub fn drop_table(target: &TablePath) -> String {
    format!("DROP TABLE {target}")
}

/// `SELECT * FROM TABLE(function('"a"."b"'))` for Iceberg metadata table functions
///
/// The path is passed as its quoted compound name so segments containing dots survive.
pub fn table_function(function: &str, target: &TablePath) -> String {
    format!(
        "SELECT * FROM TABLE({function}({}))",
        quote_string(&target.quoted())
    )
}
