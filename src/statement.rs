use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, TryStream, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::cells::Cell;
use crate::errors::{check_response, classify_job_failure, DremioError, DremioResult};
use crate::frame::Column;
use crate::page::{Page, WireResults};
use crate::DremioClient;

/// Rows per results request; the REST API refuses anything larger
pub(crate) const PAGE_LIMIT: usize = 500;

/// A builder for a SQL statement (created by DremioClient)
#[derive(Debug, Clone)]
pub struct Statement {
    wire: WireSqlRequest,
    timeout: u64,
    config: DremioClient,
}

impl Statement {
    /// Create a new statement from a SQL string and a DremioClient
    ///
    /// Usually you will want to use [`DremioClient::prepare`] instead of this method
    /// but the difference is merely ergonomic.
    pub fn new(sql: &str, config: &DremioClient) -> Statement {
        Statement {
            wire: WireSqlRequest {
                sql: sql.to_owned(),
                context: None,
            },
            timeout: config.statement_timeout,
            config: config.to_owned(),
        }
    }

    /// How long to wait for the job to finish, in seconds
    ///
    /// Defaults to [`DremioClient::statement_timeout`]. The job is not cancelled
    /// on timeout, the caller just stops waiting for it.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Statement {
        self.timeout = timeout_seconds;
        self
    }

    /// Resolve unqualified names in the SQL against this catalog path
    pub fn with_context<I, S>(mut self, context: I) -> Statement
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wire.context = Some(context.into_iter().map(Into::into).collect());
        self
    }

    pub fn sql(&self) -> &str {
        &self.wire.sql
    }

    async fn submit(&self, client: &reqwest::Client) -> DremioResult<String> {
        log::debug!("Sending statement: {}", self.wire.sql);
        let response = client
            .post(format!("{}/api/v3/sql", self.config.base_url))
            .json(&self.wire)
            .send()
            .await?;
        let job = check_response(response).await?.json::<WireJobId>().await?;
        log::debug!("Submitted job {}", job.id);
        Ok(job.id)
    }

    async fn wait(&self, client: &reqwest::Client, job_id: &str) -> DremioResult<Job> {
        let started = Instant::now();
        let deadline = Duration::from_secs(self.timeout);
        loop {
            let response = client
                .get(format!("{}/api/v3/job/{}", self.config.base_url, job_id))
                .send()
                .await?;
            let mut job = check_response(response).await?.json::<Job>().await?;
            job.id = job_id.to_owned();
            log::debug!("Job {} is {:?}", job_id, job.job_state);
            match job.job_state {
                JobState::Completed => return Ok(job),
                JobState::Failed => {
                    let message = job.error_message.unwrap_or_default();
                    return Err(DremioError::Engine {
                        status: classify_job_failure(&message),
                        message,
                    });
                }
                JobState::Canceled => {
                    return Err(DremioError::JobCancelled(
                        job.id,
                        job.cancellation_reason.unwrap_or_default(),
                    ))
                }
                _ if started.elapsed() >= deadline => {
                    return Err(DremioError::JobTimeout(job.id, self.timeout))
                }
                _ => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
    }

    /// Execute SQL without fetching its result rows
    ///
    /// This is useful for DDL and DML statements like `CREATE TABLE`, `INSERT` and `MERGE`.
    /// Waits until the job reaches a final state.
    pub async fn run(&self) -> DremioResult<Job> {
        let client = self.config.http_client()?;
        let job_id = self.submit(&client).await?;
        self.wait(&client, &job_id).await
    }

    /// Execute SQL that returns a result set
    ///
    /// The first page of results is buffered immediately,
    /// further pages are fetched lazily.
    ///
    /// For small results, consider using [`QueryResponse::only_page`].
    pub async fn query(&self) -> DremioResult<QueryResponse> {
        let job = self.run().await?;
        let first = fetch_results(&self.config, &job.id, 0).await?;
        Ok(QueryResponse {
            row_count: first.row_count,
            schema: Arc::new(first.columns()),
            data: Arc::new(first.rows),
            job,
            statement: self.clone(),
        })
    }
}

async fn fetch_results(
    config: &DremioClient,
    job_id: &str,
    offset: usize,
) -> DremioResult<WireResults> {
    log::debug!("Fetching results of job {} from offset {}", job_id, offset);
    let response = config
        .http_client()?
        .get(format!("{}/api/v3/job/{}/results", config.base_url, job_id))
        .query(&[("offset", offset), ("limit", PAGE_LIMIT)])
        .send()
        .await?;
    Ok(check_response(response).await?.json::<WireResults>().await?)
}

/// The result of SQL that returns rows
///
/// The first page is included immediately,
/// but additional pages are streamed lazily and incur additional IO.
#[derive(Debug)]
pub struct QueryResponse {
    row_count: usize,
    schema: Arc<Vec<Column>>,
    data: Arc<Vec<serde_json::Value>>,
    job: Job,
    statement: Statement,
}

impl QueryResponse {
    /// The finished job that produced these results
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Get the number of rows across all pages
    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    pub fn num_pages(&self) -> usize {
        // An empty result still has one (empty) page
        self.row_count.div_ceil(PAGE_LIMIT).max(1)
    }

    /// Column names and types of the result set
    pub fn columns(&self) -> &[Column] {
        &self.schema
    }

    /// A convenience method to assert that there is only one page and return it
    ///
    /// This never causes IO, is not async, and can only error with [`DremioError::UnsupportedFeature`]
    pub fn only_page(self) -> DremioResult<Page> {
        if self.num_pages() != 1 {
            Err(DremioError::UnsupportedFeature(
                "results span multiple pages, use pages() or concat_pages()",
            ))
        } else {
            Ok(Page::new(0, self.schema.clone(), self.data.clone()))
        }
    }

    /// Get a single page of the results
    ///
    /// The first page is returned immediately,
    /// any other page incurs an additional request.
    /// Returns `None` if the requested page does not exist.
    pub async fn page(&self, index: usize) -> DremioResult<Option<Page>> {
        if index == 0 {
            Ok(Some(Page::new(0, self.schema.clone(), self.data.clone())))
        } else if index >= self.num_pages() {
            Ok(None)
        } else {
            let results =
                fetch_results(&self.statement.config, &self.job.id, index * PAGE_LIMIT).await?;
            Ok(Some(Page::new(
                index,
                self.schema.clone(),
                Arc::new(results.rows),
            )))
        }
    }

    /// Stream over all pages in the results
    ///
    /// This incurs IO, so try to only use this once.
    /// One page is buffered, so one request can be in flight while processing another page.
    pub fn pages(&self) -> impl TryStream<Ok = Page, Error = DremioError> + '_ {
        let page_futures = (0..self.num_pages()).map(|index| self.page(index));
        futures::stream::iter(page_futures)
            .buffered(1)
            .try_filter_map(|page| async move { Ok(page) })
    }

    /// Concatenate all pages into a single page
    ///
    /// This incurs IO and could use an unbounded amount of memory.
    pub async fn concat_pages(&self) -> DremioResult<Page> {
        let mut rows = Vec::with_capacity(self.num_rows());
        for page in self.pages().try_collect::<Vec<_>>().await? {
            rows.extend(page.raw_rows().iter().cloned());
        }
        Ok(Page::new(0, self.schema.clone(), Arc::new(rows)))
    }

    /// Stream over all rows in the results as `Cell`s
    pub fn rows(&self) -> impl TryStream<Ok = Vec<Cell>, Error = DremioError> + '_ {
        self.pages()
            .map_ok(|page| futures::stream::iter(page.cells()).map(Ok))
            .try_flatten()
    }

    /// Stream over all rows in the results as JSON objects
    pub fn json_objects(
        &self,
    ) -> impl TryStream<Ok = serde_json::Value, Error = DremioError> + '_ {
        self.pages()
            .map_ok(|page| futures::stream::iter(page.json_objects()).map(Ok))
            .try_flatten()
    }
}

/// Lifecycle state of a Dremio job
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    NotSubmitted,
    Starting,
    Running,
    Completed,
    Canceled,
    Failed,
    CancellationRequested,
    Planning,
    Pending,
    MetadataRetrieval,
    Queued,
    EngineStart,
    ExecutionPlanning,
    #[serde(other)]
    Unknown,
}

/// Status of a job, as reported by `GET /api/v3/job/{id}`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Filled in from the job id the status was requested for
    #[serde(default)]
    pub id: String,
    pub job_state: JobState,
    pub row_count: Option<u64>,
    pub error_message: Option<String>,
    pub cancellation_reason: Option<String>,
    pub query_type: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

//
// Wire types
//

#[derive(Serialize, Debug, Clone)]
struct WireSqlRequest {
    sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Vec<String>>,
}

#[derive(Deserialize, Debug)]
struct WireJobId {
    id: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builds_request() {
        let client = DremioClient::new("https://dremio.local:9047", "token");
        let statement = client
            .prepare("SELECT * FROM people")
            .with_context(["lake", "sales"])
            .with_timeout(5);
        assert_eq!(statement.sql(), "SELECT * FROM people");
        assert_eq!(statement.timeout, 5);
        assert_eq!(
            serde_json::to_value(&statement.wire).unwrap(),
            json!({"sql": "SELECT * FROM people", "context": ["lake", "sales"]})
        );
        let bare = client.prepare("SELECT 1");
        assert_eq!(
            serde_json::to_value(&bare.wire).unwrap(),
            json!({"sql": "SELECT 1"})
        );
    }

    #[test]
    fn parses_job_status() {
        let job: Job = serde_json::from_value(json!({
            "jobState": "FAILED",
            "rowCount": 0,
            "errorMessage": "Table [lake.people] already exists.",
            "startedAt": "2023-01-01T00:00:00.000Z",
            "endedAt": "2023-01-01T00:00:01.000Z",
            "queryType": "REST",
            "queueName": "SMALL"
        }))
        .unwrap();
        assert_eq!(job.job_state, JobState::Failed);
        assert_eq!(job.row_count, Some(0));
        assert!(job.ended_at.is_some());

        let job: Job = serde_json::from_value(json!({"jobState": "SOMETHING_NEW"})).unwrap();
        assert_eq!(job.job_state, JobState::Unknown);
    }
}
