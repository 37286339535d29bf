//! This module provides a Dremio connector for Rust.
//!
//! It includes the `DremioClient` struct, which holds the configuration for connecting to Dremio
//! and runs SQL through the REST job API, plus helpers to materialize in-memory
//! `DataFrame`s as Iceberg tables and to upsert into existing tables with `MERGE INTO`.
//!
//! Example usage:
//!
//! ```rust,no_run
//! use light_dremio_connector::{Cell, DataFrame, DremioClient, DremioError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DremioError> {
//!     let client = DremioClient::new("https://dremio.example.com:9047", "PERSONAL_ACCESS_TOKEN");
//!
//!     let frame = DataFrame::from_columns(vec![
//!         ("id", vec![Cell::from(1), Cell::from(2)]),
//!         ("name", vec![Cell::from("Alice"), Cell::from("Bob")]),
//!     ])?;
//!
//!     // CREATE TABLE followed by batched INSERTs
//!     client
//!         .create_table("lake.sales")
//!         .name("people")
//!         .from_frame(&frame)
//!         .execute()
//!         .await?;
//!
//!     // Upsert through a staging table and MERGE INTO
//!     client
//!         .update_table("lake.sales.people")
//!         .on("t.id = s.id")
//!         .from_frame(&frame)
//!         .execute()
//!         .await?;
//!
//!     // Query the results back
//!     let result = client.prepare("SELECT * FROM lake.sales.people").query().await?;
//!     let page = result.only_page()?;
//!     match &page.cells()[0][0] {
//!         Cell::Int(x) => println!("Got an integer: {}", x),
//!         _ => panic!("Got something else"),
//!     }
//!
//!     Ok(())
//! }
//! ```
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod cells;
mod create;
mod engine;
mod errors;
mod frame;
mod literal;
mod metadata;
mod page;
mod path;
pub mod sql;
mod statement;
#[cfg(test)]
mod testing;
mod update;

pub use cells::{Cell, ColumnType};
pub use create::{TableCreator, DEFAULT_BATCH_SIZE};
pub use engine::{CatalogEntry, CatalogLookup, SqlExecutor};
pub use errors::{DremioError, DremioResult, CONFLICT_STATUS, NOT_FOUND_STATUS};
pub use frame::{Column, DataFrame};
pub use literal::{escape, map_type};
pub use metadata::TableMetadata;
pub use page::Page;
pub use path::TablePath;
pub use statement::{Job, JobState, QueryResponse, Statement};
pub use update::{TableUpdater, UpdateOutcome};

const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How the token is presented in the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Personal access token, sent as `Bearer <token>`
    PersonalAccessToken,
    /// Session token from `/apiv2/login`, sent as `_dremio<token>`
    Session,
}

#[derive(Debug, Clone)]
pub struct DremioClient {
    /// e.g. `https://dremio.example.com:9047`
    pub base_url: String,
    pub token: String,
    pub token_kind: TokenKind,
    /// How long to wait for a job to finish, in seconds
    pub statement_timeout: u64,
    /// Delay between job status polls
    pub poll_interval: Duration,
}

impl DremioClient {
    /// Create a client authenticating with a personal access token
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> DremioClient {
        DremioClient {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            token_kind: TokenKind::PersonalAccessToken,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT_SECS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create a client from `DREMIO_URL` and `DREMIO_TOKEN`
    pub fn from_env() -> DremioResult<DremioClient> {
        let require = |name: &'static str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.is_empty())
                .ok_or(DremioError::MissingConfig(name))
        };
        Ok(DremioClient::new(require("DREMIO_URL")?, require("DREMIO_TOKEN")?))
    }

    /// Exchange a username and password for a session token
    pub async fn login(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> DremioResult<DremioClient> {
        let mut client = DremioClient::new(base_url, "");
        log::debug!("Logging in to {} as {}", client.base_url, username);
        let response = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?
            .post(format!("{}/apiv2/login", client.base_url))
            .json(&WireLogin {
                user_name: username,
                password,
            })
            .send()
            .await?;
        let session = errors::check_response(response)
            .await?
            .json::<WireSession>()
            .await?;
        client.token = session.token;
        client.token_kind = TokenKind::Session;
        Ok(client)
    }

    pub fn with_statement_timeout(mut self, timeout_seconds: u64) -> DremioClient {
        self.statement_timeout = timeout_seconds;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> DremioClient {
        self.poll_interval = poll_interval;
        self
    }

    /// Prepare a SQL statement for execution
    pub fn prepare(&self, sql: &str) -> Statement {
        Statement::new(sql, self)
    }

    /// Start building a `CREATE TABLE` under `path`
    ///
    /// `path` may already include the table name, or it can be given with
    /// [`TableCreator::name`]. Paths that fail to parse are reported by `execute`.
    pub fn create_table(&self, path: impl AsRef<str>) -> TableCreator<'_, DremioClient> {
        TableCreator::new(self, path.as_ref())
    }

    /// Start building a `MERGE INTO` the existing table at `path`
    pub fn update_table(
        &self,
        path: impl AsRef<str>,
    ) -> TableUpdater<'_, DremioClient, DremioClient> {
        TableUpdater::new(self, self, path.as_ref())
    }

    /// Query one of the Iceberg metadata tables of `path`
    pub async fn table_metadata(
        &self,
        path: &TablePath,
        kind: TableMetadata,
    ) -> DremioResult<QueryResponse> {
        self.prepare(&kind.sql(path)).query().await
    }

    fn authorization(&self) -> String {
        match self.token_kind {
            TokenKind::PersonalAccessToken => format!("Bearer {}", self.token),
            TokenKind::Session => format!("_dremio{}", self.token),
        }
    }

    pub(crate) fn http_client(&self) -> DremioResult<reqwest::Client> {
        use reqwest::header::*;

        let mut headers = HeaderMap::with_capacity(4);
        headers.append(CONTENT_TYPE, "application/json".parse()?);
        headers.append(AUTHORIZATION, self.authorization().parse()?);
        headers.append(ACCEPT, "application/json".parse()?);
        headers.append(
            USER_AGENT,
            concat!(env!("CARGO_PKG_NAME"), '/', env!("CARGO_PKG_VERSION")).parse()?,
        );

        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireLogin<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct WireSession {
    token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_header_follows_token_kind() {
        let mut client = DremioClient::new("https://dremio.local:9047/", "abc");
        assert_eq!(client.base_url, "https://dremio.local:9047");
        assert_eq!(client.authorization(), "Bearer abc");
        client.token_kind = TokenKind::Session;
        assert_eq!(client.authorization(), "_dremioabc");
    }

    #[test]
    fn builds_http_client() -> DremioResult<()> {
        DremioClient::new("https://dremio.local:9047", "abc").http_client()?;
        Ok(())
    }
}
