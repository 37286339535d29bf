use crate::engine::SqlExecutor;
use crate::errors::{DremioError, DremioResult};
use crate::frame::DataFrame;
use crate::path::TablePath;
use crate::sql;

/// Rows per `INSERT` statement unless overridden
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Where the rows of a new or merged table come from
#[derive(Clone, Copy, Debug)]
pub(crate) enum TableSource<'a> {
    Frame(&'a DataFrame),
    Query(&'a str),
}

impl<'a> TableSource<'a> {
    /// Exactly one of a frame or a query must be given
    pub(crate) fn from_parts(
        frame: Option<&'a DataFrame>,
        query: Option<&'a str>,
    ) -> DremioResult<TableSource<'a>> {
        match (frame, query) {
            (Some(frame), None) => Ok(TableSource::Frame(frame)),
            (None, Some(query)) => Ok(TableSource::Query(query)),
            (None, None) => Err(DremioError::usage(
                "provide either a DataFrame or a SQL query as the source",
            )),
            (Some(_), Some(_)) => Err(DremioError::usage(
                "provide only one of a DataFrame or a SQL query as the source, not both",
            )),
        }
    }
}

/// A builder for creating an Iceberg table (usually created by [`crate::DremioClient::create_table`])
///
/// From a `DataFrame`, this sends `CREATE TABLE` with the frame's schema followed by
/// one `INSERT` per batch of rows. From a query, it sends a single `CREATE TABLE ... AS`.
///
/// Batches are not transactional: if an `INSERT` fails, the rows of earlier
/// batches stay in the table.
#[derive(Debug)]
pub struct TableCreator<'a, E: ?Sized> {
    executor: &'a E,
    path: DremioResult<TablePath>,
    name: Option<String>,
    frame: Option<&'a DataFrame>,
    query: Option<&'a str>,
    batch_size: usize,
}

impl<'a, E: SqlExecutor + ?Sized> TableCreator<'a, E> {
    /// Start a table creation under `path`, parsed with [`TablePath::parse`]
    pub fn new(executor: &'a E, path: &str) -> TableCreator<'a, E> {
        Self::with_path(executor, TablePath::parse(path))
    }

    /// Start a table creation under an already parsed path
    pub fn at(executor: &'a E, path: TablePath) -> TableCreator<'a, E> {
        Self::with_path(executor, Ok(path))
    }

    fn with_path(executor: &'a E, path: DremioResult<TablePath>) -> TableCreator<'a, E> {
        TableCreator {
            executor,
            path,
            name: None,
            frame: None,
            query: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Table name, appended to the path
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Use the schema and rows of a `DataFrame`
    pub fn from_frame(mut self, frame: &'a DataFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Use a query for create-as-select
    pub fn from_sql(mut self, query: &'a str) -> Self {
        self.query = Some(query);
        self
    }

    /// Maximum rows per `INSERT` statement
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Create the table, returning its full path
    ///
    /// Usage errors are reported before anything is sent to the engine.
    /// If the table already exists this fails with [`DremioError::TableExists`].
    pub async fn execute(self) -> DremioResult<TablePath> {
        let source = TableSource::from_parts(self.frame, self.query)?;
        let mut target = self.path?;
        if let Some(name) = &self.name {
            target = target.join(name);
        }
        create_table(self.executor, &target, source, self.batch_size).await?;
        Ok(target)
    }
}

/// Create `target` from `source`, relabeling a conflict as [`DremioError::TableExists`]
pub(crate) async fn create_table<E: SqlExecutor + ?Sized>(
    executor: &E,
    target: &TablePath,
    source: TableSource<'_>,
    batch_size: usize,
) -> DremioResult<()> {
    write_table(executor, target, source, batch_size, true).await
}

/// Create an internal table such as a staging table
///
/// Engine errors are returned unchanged; a conflict is not relabeled as
/// [`DremioError::TableExists`].
pub(crate) async fn create_staging_table<E: SqlExecutor + ?Sized>(
    executor: &E,
    target: &TablePath,
    source: TableSource<'_>,
    batch_size: usize,
) -> DremioResult<()> {
    write_table(executor, target, source, batch_size, false).await
}

async fn write_table<E: SqlExecutor + ?Sized>(
    executor: &E,
    target: &TablePath,
    source: TableSource<'_>,
    batch_size: usize,
    relabel_conflict: bool,
) -> DremioResult<()> {
    if target.is_empty() {
        return Err(DremioError::usage("the table path is empty"));
    }
    let create = match source {
        TableSource::Query(query) => sql::create_table_as(target, query),
        TableSource::Frame(frame) => {
            if batch_size == 0 {
                return Err(DremioError::usage("batch_size must be at least 1"));
            }
            if frame.num_columns() == 0 {
                return Err(DremioError::usage(
                    "cannot create a table from a DataFrame without columns",
                ));
            }
            sql::create_table(target, frame.columns())
        }
    };
    match executor.execute(&create).await {
        Ok(_) => {}
        Err(e) if relabel_conflict && e.is_conflict() => {
            return Err(DremioError::TableExists {
                path: target.to_string(),
                message: e.to_string(),
            })
        }
        Err(e) => return Err(e),
    }
    if let TableSource::Frame(frame) = source {
        for (i, batch) in frame.rows().chunks(batch_size).enumerate() {
            log::debug!("Inserting batch {} ({} rows) into {}", i, batch.len(), target);
            executor.execute(&sql::insert_values(target, batch)).await?;
        }
    }
    Ok(())
}
