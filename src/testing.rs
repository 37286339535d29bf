//! An in-memory engine that records every statement it is sent.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::engine::{CatalogEntry, CatalogLookup, SqlExecutor};
use crate::errors::{DremioError, DremioResult, CONFLICT_STATUS, NOT_FOUND_STATUS};
use crate::path::TablePath;
use crate::statement::{Job, JobState};

struct Failure {
    pattern: String,
    status: u16,
    message: String,
}

/// Tracks which tables exist (by quoted path) from the `CREATE`/`DROP` statements it runs
#[derive(Default)]
pub(crate) struct RecordingEngine {
    statements: Mutex<Vec<String>>,
    lookups: Mutex<Vec<TablePath>>,
    tables: Mutex<HashSet<String>>,
    failures: Vec<Failure>,
    lookup_failure: Option<(u16, String)>,
}

impl RecordingEngine {
    pub fn with_table(self, quoted_path: &str) -> Self {
        self.tables.lock().unwrap().insert(quoted_path.to_owned());
        self
    }

    /// Fail any statement containing `pattern`
    pub fn fail_when(mut self, pattern: &str, status: u16, message: &str) -> Self {
        self.failures.push(Failure {
            pattern: pattern.to_owned(),
            status,
            message: message.to_owned(),
        });
        self
    }

    /// Fail every catalog lookup
    pub fn fail_lookups(mut self, status: u16, message: &str) -> Self {
        self.lookup_failure = Some((status, message.to_owned()));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<TablePath> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn has_table(&self, quoted_path: &str) -> bool {
        self.tables.lock().unwrap().contains(quoted_path)
    }
}

fn target_of<'s>(sql: &'s str, prefix: &str) -> Option<&'s str> {
    sql.strip_prefix(prefix)
        .and_then(|rest| rest.split_whitespace().next())
}

fn completed() -> Job {
    Job {
        id: "job".into(),
        job_state: JobState::Completed,
        row_count: None,
        error_message: None,
        cancellation_reason: None,
        query_type: Some("REST".into()),
        started_at: None,
        ended_at: None,
    }
}

#[async_trait::async_trait]
impl SqlExecutor for RecordingEngine {
    async fn execute(&self, sql: &str) -> DremioResult<Job> {
        self.statements.lock().unwrap().push(sql.to_owned());
        if let Some(failure) = self.failures.iter().find(|f| sql.contains(&f.pattern)) {
            return Err(DremioError::Engine {
                status: failure.status,
                message: failure.message.clone(),
            });
        }
        let mut tables = self.tables.lock().unwrap();
        if let Some(target) = target_of(sql, "CREATE TABLE ") {
            if !tables.insert(target.to_owned()) {
                return Err(DremioError::Engine {
                    status: CONFLICT_STATUS,
                    message: format!("Table [{target}] already exists."),
                });
            }
        } else if let Some(target) = target_of(sql, "DROP TABLE ") {
            if !tables.remove(target) {
                return Err(DremioError::Engine {
                    status: NOT_FOUND_STATUS,
                    message: format!("Table [{target}] not found."),
                });
            }
        }
        Ok(completed())
    }
}

#[async_trait::async_trait]
impl CatalogLookup for RecordingEngine {
    async fn lookup(&self, path: &TablePath) -> DremioResult<CatalogEntry> {
        self.lookups.lock().unwrap().push(path.clone());
        if let Some((status, message)) = &self.lookup_failure {
            return Err(DremioError::Engine {
                status: *status,
                message: message.clone(),
            });
        }
        if self.has_table(&path.quoted()) {
            Ok(CatalogEntry {
                id: "entry".into(),
                path: path.segments().to_vec(),
                entity_type: Some("dataset".into()),
                kind: Some("PHYSICAL_DATASET".into()),
                tag: None,
            })
        } else {
            Err(DremioError::Engine {
                status: NOT_FOUND_STATUS,
                message: format!("Could not find entity with path [{}]", path.dotted()),
            })
        }
    }
}
