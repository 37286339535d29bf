//! The two engine capabilities the table helpers depend on.
//!
//! `DremioClient` implements both over REST. The table helpers are generic over
//! them, so they can run against anything that can execute SQL and look up
//! catalog paths.

use serde::Deserialize;

use crate::errors::{check_response, DremioError, DremioResult};
use crate::path::TablePath;
use crate::statement::Job;
use crate::DremioClient;

/// Executes one SQL statement and waits for it to finish
#[async_trait::async_trait]
pub trait SqlExecutor: Sync {
    async fn execute(&self, sql: &str) -> DremioResult<Job>;
}

/// Looks up catalog entries by path
#[async_trait::async_trait]
pub trait CatalogLookup: Sync {
    /// Fails with an engine error when the path does not resolve
    async fn lookup(&self, path: &TablePath) -> DremioResult<CatalogEntry>;
}

/// A catalog entry, as returned by `GET /api/v3/catalog/by-path/...`
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub path: Vec<String>,
    /// e.g. `dataset`, `folder`, `space`, `source`
    pub entity_type: Option<String>,
    /// e.g. `PHYSICAL_DATASET` or `VIRTUAL_DATASET` for datasets
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tag: Option<String>,
}

#[async_trait::async_trait]
impl SqlExecutor for DremioClient {
    async fn execute(&self, sql: &str) -> DremioResult<Job> {
        self.prepare(sql).run().await
    }
}

#[async_trait::async_trait]
impl CatalogLookup for DremioClient {
    async fn lookup(&self, path: &TablePath) -> DremioResult<CatalogEntry> {
        let url = catalog_url(&self.base_url, path)?;
        log::debug!("Looking up catalog path {}", path);
        let response = self.http_client()?.get(url).send().await?;
        Ok(check_response(response)
            .await?
            .json::<CatalogEntry>()
            .await?)
    }
}

/// `{base}/api/v3/catalog/by-path/{segment}/...`, with each segment percent-encoded
fn catalog_url(base_url: &str, path: &TablePath) -> DremioResult<reqwest::Url> {
    let mut url =
        reqwest::Url::parse(base_url).map_err(|e| DremioError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| DremioError::InvalidUrl(base_url.to_owned()))?
        .pop_if_empty()
        .extend(["api", "v3", "catalog", "by-path"])
        .extend(path.segments());
    Ok(url)
}
