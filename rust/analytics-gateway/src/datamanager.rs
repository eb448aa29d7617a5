//! HTTP client for the remote data manager that executes analytical SQL.

use crate::error::{upstream_excerpt, Result, ServiceError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DataManagerConfig {
    pub query_endpoint: String,
    pub table_endpoint: Option<String>,
    pub execute_endpoint: Option<String>,
    pub timeout: Duration,
}

/// Remote query engine. Statements are opaque SQL text.
#[async_trait]
pub trait DataManager: Send + Sync {
    /// Runs an ad-hoc query and returns the engine's JSON payload.
    async fn query(&self, sql: &str) -> Result<Value>;

    /// Describes a table's columns, as free text suitable for a prompt.
    async fn table_schema(&self, table: &str) -> Result<String>;

    /// Runs a previously saved statement.
    async fn execute(&self, sql: &str) -> Result<Value>;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Clone)]
pub struct HttpDataManager {
    client: Client,
    config: Arc<DataManagerConfig>,
}

impl HttpDataManager {
    pub fn new(config: DataManagerConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    async fn post_query(&self, endpoint: &str, sql: &str) -> Result<Value> {
        debug!(%endpoint, "dispatching query to data manager");
        let response = self
            .client
            .post(endpoint)
            .json(&QueryBody { query: sql })
            .send()
            .await
            .map_err(request_failed)?;

        let response = ensure_success(response).await?;
        response.json().await.map_err(|err| {
            ServiceError::Upstream(format!("data manager returned invalid JSON: {err}"))
        })
    }
}

#[async_trait]
impl DataManager for HttpDataManager {
    async fn query(&self, sql: &str) -> Result<Value> {
        self.post_query(&self.config.query_endpoint, sql).await
    }

    async fn table_schema(&self, table: &str) -> Result<String> {
        let endpoint = self.config.table_endpoint.as_deref().ok_or_else(|| {
            ServiceError::Config("DATA_MANAGER_TABLE_ENDPOINT is not configured".into())
        })?;

        let response = self
            .client
            .post(endpoint)
            .query(&[("table_name", table)])
            .send()
            .await
            .map_err(request_failed)?;

        ensure_success(response)
            .await?
            .text()
            .await
            .map_err(request_failed)
    }

    async fn execute(&self, sql: &str) -> Result<Value> {
        let endpoint = self.config.execute_endpoint.as_deref().ok_or_else(|| {
            ServiceError::Config("DATA_MANAGER_EXECUTE_ENDPOINT is not configured".into())
        })?;
        self.post_query(endpoint, sql).await
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(%status, "data manager rejected request");
    Err(ServiceError::Upstream(if body.trim().is_empty() {
        format!("data manager returned status {status}")
    } else {
        format!("data manager returned status {status}: {}", upstream_excerpt(&body))
    }))
}

fn request_failed(err: reqwest::Error) -> ServiceError {
    ServiceError::Upstream(format!("data manager request failed: {err}"))
}
