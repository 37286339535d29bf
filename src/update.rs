use crate::create::{create_staging_table, TableSource, DEFAULT_BATCH_SIZE};
use crate::engine::{CatalogLookup, SqlExecutor};
use crate::errors::{DremioError, DremioResult};
use crate::frame::DataFrame;
use crate::path::TablePath;
use crate::sql::{self, MergeSource};
use crate::statement::Job;

const STAGING_SUFFIX: &str = "_temp_update";

/// A builder for upserting into an existing table (usually created by [`crate::DremioClient::update_table`])
///
/// The target is checked in the catalog first. A query source is merged directly.
/// A `DataFrame` source is first written to a staging table next to the target,
/// merged from there and then dropped, unless [`TableUpdater::keep_staging`] is set.
///
/// The `ON` condition is raw SQL referring to the target as `t` and the source as `s`,
/// e.g. `t.id = s.id`. It is passed through unchecked.
#[derive(Debug)]
pub struct TableUpdater<'a, E: ?Sized, C: ?Sized> {
    executor: &'a E,
    catalog: &'a C,
    path: DremioResult<TablePath>,
    on: Option<String>,
    frame: Option<&'a DataFrame>,
    query: Option<&'a str>,
    batch_size: usize,
    keep_staging: bool,
}

/// What an update did
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub target: TablePath,
    /// The finished `MERGE INTO` job
    pub merge: Job,
    /// The staging table, if one was created and kept
    pub staging: Option<TablePath>,
}

impl<'a, E, C> TableUpdater<'a, E, C>
where
    E: SqlExecutor + ?Sized,
    C: CatalogLookup + ?Sized,
{
    /// Start an update of the table at `path`, parsed with [`TablePath::parse`]
    pub fn new(executor: &'a E, catalog: &'a C, path: &str) -> TableUpdater<'a, E, C> {
        Self::with_path(executor, catalog, TablePath::parse(path))
    }

    /// Start an update of the table at an already parsed path
    pub fn at(executor: &'a E, catalog: &'a C, path: TablePath) -> TableUpdater<'a, E, C> {
        Self::with_path(executor, catalog, Ok(path))
    }

    fn with_path(
        executor: &'a E,
        catalog: &'a C,
        path: DremioResult<TablePath>,
    ) -> TableUpdater<'a, E, C> {
        TableUpdater {
            executor,
            catalog,
            path,
            on: None,
            frame: None,
            query: None,
            batch_size: DEFAULT_BATCH_SIZE,
            keep_staging: false,
        }
    }

    /// The merge condition, e.g. `t.id = s.id`
    pub fn on(mut self, condition: impl Into<String>) -> Self {
        self.on = Some(condition.into());
        self
    }

    /// Merge the rows of a `DataFrame`
    pub fn from_frame(mut self, frame: &'a DataFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Merge the rows of a query
    pub fn from_sql(mut self, query: &'a str) -> Self {
        self.query = Some(query);
        self
    }

    /// Maximum rows per `INSERT` into the staging table
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Keep the staging table after a successful merge
    pub fn keep_staging(mut self, keep: bool) -> Self {
        self.keep_staging = keep;
        self
    }

    /// Run the update
    ///
    /// Fails with [`DremioError::TableNotFound`] without merging if the target is missing.
    /// Failures to create the staging table, merge, or drop the staging table are returned
    /// as-is; in the latter two cases the staging table is left behind.
    pub async fn execute(self) -> DremioResult<UpdateOutcome> {
        let source = TableSource::from_parts(self.frame, self.query)?;
        let target = self.path?;
        if target.is_empty() {
            return Err(DremioError::usage("the table path is empty"));
        }
        let on = self
            .on
            .as_deref()
            .map(str::trim)
            .filter(|on| !on.is_empty())
            .ok_or_else(|| DremioError::usage("a merge condition is required, e.g. t.id = s.id"))?;
        if matches!(source, TableSource::Frame(_)) && self.batch_size == 0 {
            return Err(DremioError::usage("batch_size must be at least 1"));
        }

        ensure_exists(self.catalog, &target).await?;

        match source {
            TableSource::Query(query) => {
                let merge = self
                    .executor
                    .execute(&sql::merge_into(&target, MergeSource::Query(query), on))
                    .await?;
                Ok(UpdateOutcome {
                    target,
                    merge,
                    staging: None,
                })
            }
            TableSource::Frame(frame) => {
                let staging = staging_path(&target);
                log::debug!("Staging {} rows in {}", frame.num_rows(), staging);
                create_staging_table(self.executor, &staging, source, self.batch_size).await?;

                let merge = self
                    .executor
                    .execute(&sql::merge_into(&target, MergeSource::Table(&staging), on))
                    .await
                    .map_err(|e| {
                        log::warn!(
                            "MERGE into {} failed, staging table {} was left in place",
                            target,
                            staging
                        );
                        e
                    })?;

                if self.keep_staging {
                    return Ok(UpdateOutcome {
                        target,
                        merge,
                        staging: Some(staging),
                    });
                }
                self.executor.execute(&sql::drop_table(&staging)).await?;
                Ok(UpdateOutcome {
                    target,
                    merge,
                    staging: None,
                })
            }
        }
    }
}

/// Translate a missing catalog entry into [`DremioError::TableNotFound`]
async fn ensure_exists<C: CatalogLookup + ?Sized>(
    catalog: &C,
    target: &TablePath,
) -> DremioResult<()> {
    match catalog.lookup(target).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Err(DremioError::TableNotFound {
            path: target.to_string(),
        }),
        Err(e) => Err(e),
    }
}

/// `<table>_temp_update_<token>` next to the target
///
/// The random token keeps concurrent updates of the same table from sharing a staging table.
fn staging_path(target: &TablePath) -> TablePath {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let name = target.name().unwrap_or_default();
    target.with_name(&format!("{name}{STAGING_SUFFIX}_{}", &token[..8]))
}

#[cfg(test)]
mod tests {
    use crate::cells::Cell;
    use crate::testing::RecordingEngine;

    use super::*;

    const TARGET: &str = r#""lake"."people""#;

    fn people() -> DataFrame {
        DataFrame::from_columns(vec![
            ("id", vec![Cell::from(1), Cell::from(2)]),
            ("name", vec![Cell::from("Alice"), Cell::from("Bob")]),
        ])
        .unwrap()
    }

    fn kinds(engine: &RecordingEngine) -> Vec<String> {
        engine
            .statements()
            .iter()
            .map(|s| s.split_whitespace().take(2).collect::<Vec<_>>().join(" "))
            .collect()
    }

    #[tokio::test]
    async fn merges_from_query() -> DremioResult<()> {
        let engine = RecordingEngine::default().with_table(TARGET);
        let outcome = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_sql("SELECT * FROM lake.new_people")
            .execute()
            .await?;
        assert!(outcome.staging.is_none());
        assert_eq!(engine.lookups(), vec![TablePath::from(["lake", "people"])]);
        assert_eq!(
            engine.statements(),
            vec![format!(
                "MERGE INTO {TARGET} AS t USING (SELECT * FROM lake.new_people) AS s ON (t.id = s.id) \
                 WHEN MATCHED THEN UPDATE SET * WHEN NOT MATCHED THEN INSERT *"
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn merges_from_frame_through_staging() -> DremioResult<()> {
        let engine = RecordingEngine::default().with_table(TARGET);
        let frame = people();
        let outcome = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .execute()
            .await?;
        assert!(outcome.staging.is_none());
        assert_eq!(
            kinds(&engine),
            ["CREATE TABLE", "INSERT INTO", "MERGE INTO", "DROP TABLE"]
        );
        let statements = engine.statements();
        assert!(statements[0].starts_with(r#"CREATE TABLE "lake"."people_temp_update_"#));
        assert!(statements[1].ends_with("VALUES (1, 'Alice'), (2, 'Bob')"));
        // The merge reads from the same staging table that gets dropped
        let staging = statements[3].trim_start_matches("DROP TABLE ");
        assert!(statements[2].contains(&format!("USING {staging} AS s")));
        assert!(!engine.has_table(staging));
        Ok(())
    }

    #[tokio::test]
    async fn batches_staging_inserts() -> DremioResult<()> {
        let engine = RecordingEngine::default().with_table(TARGET);
        let ids: Vec<Cell> = (0..2500).map(Cell::from).collect();
        let frame = DataFrame::from_columns(vec![("id", ids)])?;
        TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .batch_size(1000)
            .execute()
            .await?;
        assert_eq!(
            kinds(&engine),
            [
                "CREATE TABLE",
                "INSERT INTO",
                "INSERT INTO",
                "INSERT INTO",
                "MERGE INTO",
                "DROP TABLE"
            ]
        );
        let tuples: Vec<usize> = engine
            .statements()
            .iter()
            .filter(|s| s.starts_with("INSERT INTO"))
            .map(|s| s.matches('(').count())
            .collect();
        assert_eq!(tuples, vec![1000, 1000, 500]);
        Ok(())
    }

    #[tokio::test]
    async fn keeps_staging_on_request() -> DremioResult<()> {
        let engine = RecordingEngine::default().with_table(TARGET);
        let frame = people();
        let outcome = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .keep_staging(true)
            .execute()
            .await?;
        assert_eq!(kinds(&engine), ["CREATE TABLE", "INSERT INTO", "MERGE INTO"]);
        let staging = outcome.staging.expect("staging table kept");
        assert!(engine.has_table(&staging.quoted()));
        assert_eq!(staging.parent(), outcome.target.parent());
        Ok(())
    }

    #[test]
    fn staging_names_are_unique() {
        let target = TablePath::from(["lake", "people"]);
        let a = staging_path(&target);
        let b = staging_path(&target);
        assert_ne!(a, b);
        assert!(a.name().unwrap().starts_with("people_temp_update_"));
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let engine = RecordingEngine::default();
        let frame = people();
        let err = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DremioError::TableNotFound { ref path } if path == TARGET));
        assert!(engine.statements().is_empty());
    }

    #[tokio::test]
    async fn missing_target_detected_by_message() {
        let engine = RecordingEngine::default()
            .with_table(TARGET)
            .fail_lookups(500, "No such file or directory");
        let err = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_sql("SELECT 1")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DremioError::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn other_lookup_failures_propagate() {
        let engine = RecordingEngine::default().fail_lookups(403, "Forbidden");
        let err = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_sql("SELECT 1")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DremioError::Engine { status: 403, .. }));
        assert!(engine.statements().is_empty());
    }

    #[tokio::test]
    async fn staging_collision_stops_before_merge() {
        let engine = RecordingEngine::default()
            .with_table(TARGET)
            .fail_when("CREATE TABLE", 409, "Table already exists.");
        let frame = people();
        let err = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DremioError::Engine { status: 409, .. }));
        assert!(!err.to_string().contains("update_table()"));
        assert_eq!(kinds(&engine), ["CREATE TABLE"]);
    }

    #[tokio::test]
    async fn failed_merge_leaves_staging_table() {
        let engine = RecordingEngine::default()
            .with_table(TARGET)
            .fail_when("MERGE INTO", 400, "Column 'idx' not found in any table");
        let frame = people();
        let err = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.idx = s.idx")
            .from_frame(&frame)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DremioError::Engine { status: 400, .. }));
        assert_eq!(kinds(&engine), ["CREATE TABLE", "INSERT INTO", "MERGE INTO"]);
    }

    #[tokio::test]
    async fn drop_failure_is_surfaced() {
        let engine = RecordingEngine::default()
            .with_table(TARGET)
            .fail_when("DROP TABLE", 403, "Permission denied");
        let frame = people();
        let err = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, DremioError::Engine { status: 403, .. }));
    }

    #[tokio::test]
    async fn usage_errors_before_io() {
        let engine = RecordingEngine::default().with_table(TARGET);
        let frame = people();

        let neither = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .execute()
            .await;
        assert!(matches!(neither, Err(DremioError::Usage(_))));

        let both = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .from_sql("SELECT 1")
            .execute()
            .await;
        assert!(matches!(both, Err(DremioError::Usage(_))));

        let zero_batch = TableUpdater::new(&engine, &engine, "lake.people")
            .on("t.id = s.id")
            .from_frame(&frame)
            .batch_size(0)
            .execute()
            .await;
        assert!(matches!(zero_batch, Err(DremioError::Usage(_))));

        let no_condition = TableUpdater::new(&engine, &engine, "lake.people")
            .on("  ")
            .from_sql("SELECT 1")
            .execute()
            .await;
        assert!(matches!(no_condition, Err(DremioError::Usage(_))));

        assert!(engine.lookups().is_empty());
        assert!(engine.statements().is_empty());
    }
}
