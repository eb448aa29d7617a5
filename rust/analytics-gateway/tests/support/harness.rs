#![allow(dead_code)]

use analytics_gateway::{
    config::AppConfig,
    datamanager::{DataManager, DataManagerConfig},
    db::DatabaseConfig,
    error::{Result, ServiceError},
    filter::DEFAULT_MAX_DEPTH,
    llm::CompletionProvider,
    models::{NewSavedQuery, SavedPrompt, SavedQueryRow},
    query::source::LakeConfig,
    server::Server,
    state::AppState,
    store::SavedQueryStore,
};
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceExt;

pub const API_KEY: &str = "test-api-key";
pub const CUSTOMER_ID: &str = "cust_test";
pub const BUCKET: &str = "lake-bucket";

pub fn test_config() -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database: DatabaseConfig {
            url: "postgres://gateway@localhost/gateway".to_string(),
            max_pool_size: 1,
            tls: None,
        },
        api_key: Some(API_KEY.to_string()),
        allowed_origins: None,
        request_timeout: Duration::from_secs(5),
        max_filter_depth: DEFAULT_MAX_DEPTH,
        lake: LakeConfig {
            bucket: BUCKET.to_string(),
            customer_id: CUSTOMER_ID.to_string(),
        },
        data_manager: DataManagerConfig {
            query_endpoint: "http://data-manager.invalid/query".to_string(),
            table_endpoint: Some("http://data-manager.invalid/table".to_string()),
            execute_endpoint: Some("http://data-manager.invalid/execute".to_string()),
            timeout: Duration::from_secs(5),
        },
        openai: None,
    }
}

/// Data manager double that records every statement it receives.
pub struct RecordingDataManager {
    rows: Value,
    failure: Option<String>,
    statements: Mutex<Vec<String>>,
    schema_requests: Mutex<Vec<String>>,
}

impl RecordingDataManager {
    pub fn returning(rows: Value) -> Self {
        Self {
            rows,
            failure: None,
            statements: Mutex::new(Vec::new()),
            schema_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::returning(Value::Null)
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        self.statements.lock().last().cloned()
    }

    pub fn schema_requests(&self) -> Vec<String> {
        self.schema_requests.lock().clone()
    }

    fn respond(&self, sql: &str) -> Result<Value> {
        self.statements.lock().push(sql.to_string());
        match &self.failure {
            Some(message) => Err(ServiceError::Upstream(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}

#[async_trait]
impl DataManager for RecordingDataManager {
    async fn query(&self, sql: &str) -> Result<Value> {
        self.respond(sql)
    }

    async fn table_schema(&self, table: &str) -> Result<String> {
        self.schema_requests.lock().push(table.to_string());
        Ok(format!("{table}(_data JSON, added_date_full DATE)"))
    }

    async fn execute(&self, sql: &str) -> Result<Value> {
        self.respond(sql)
    }
}

/// Completion provider that answers every prompt with the same reply.
pub struct StaticCompletion {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl StaticCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for StaticCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SavedQueryRow>>,
}

impl MemoryStore {
    pub fn rows(&self) -> Vec<SavedQueryRow> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl SavedQueryStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, row: NewSavedQuery) -> Result<SavedQueryRow> {
        let mut rows = self.rows.lock();
        let saved = SavedQueryRow {
            id: rows.len() as i32 + 1,
            customer_id: row.customer_id,
            prompt_id: row.prompt_id,
            query_text: row.query_text,
            prompt: row.prompt,
        };
        rows.push(saved.clone());
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<SavedPrompt>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .map(|row| SavedPrompt {
                prompt_id: row.prompt_id.clone(),
                prompt: row.prompt.clone(),
            })
            .collect())
    }

    async fn query_text(&self, prompt_id: &str) -> Result<Option<String>> {
        Ok(self
            .rows
            .lock()
            .iter()
            .rev()
            .find(|row| row.prompt_id == prompt_id)
            .map(|row| row.query_text.clone()))
    }
}

/// Router wired to in-memory collaborators.
pub struct GatewayTestHarness {
    router: Router,
    pub data_manager: Arc<RecordingDataManager>,
    pub completion: Option<Arc<StaticCompletion>>,
    pub store: Arc<MemoryStore>,
}

pub struct HarnessBuilder {
    config: AppConfig,
    data_manager: RecordingDataManager,
    completion: Option<StaticCompletion>,
}

impl HarnessBuilder {
    pub fn data_manager(mut self, data_manager: RecordingDataManager) -> Self {
        self.data_manager = data_manager;
        self
    }

    pub fn completion(mut self, reply: &str) -> Self {
        self.completion = Some(StaticCompletion::new(reply));
        self
    }

    pub fn config(mut self, update: impl FnOnce(&mut AppConfig)) -> Self {
        update(&mut self.config);
        self
    }

    pub fn build(self) -> GatewayTestHarness {
        let data_manager = Arc::new(self.data_manager);
        let completion = self.completion.map(Arc::new);
        let store = Arc::new(MemoryStore::default());

        let state = AppState::new(
            Arc::new(self.config),
            data_manager.clone(),
            completion
                .clone()
                .map(|provider| provider as Arc<dyn CompletionProvider>),
            store.clone(),
        );

        GatewayTestHarness {
            router: Server::from_state(state).router(),
            data_manager,
            completion,
            store,
        }
    }
}

impl GatewayTestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            config: test_config(),
            data_manager: RecordingDataManager::returning(json!([{ "count": 1 }])),
            completion: None,
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn get(&self, path: &str) -> http::Response<Body> {
        self.send("GET", path, None, true).await
    }

    pub async fn get_without_api_key(&self, path: &str) -> http::Response<Body> {
        self.send("GET", path, None, false).await
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> http::Response<Body> {
        let body = serde_json::to_vec(payload).expect("payload should serialize");
        self.send("POST", path, Some(body), true).await
    }

    /// Posts `body` verbatim, with the given content type if any.
    pub async fn post_raw(
        &self,
        path: &str,
        body: &str,
        content_type: Option<&str>,
    ) -> http::Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("x-api-key", API_KEY);
        if let Some(content_type) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request should build");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn post_json_without_api_key<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> http::Response<Body> {
        let body = serde_json::to_vec(payload).expect("payload should serialize");
        self.send("POST", path, Some(body), false).await
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
        include_api_key: bool,
    ) -> http::Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);

        if include_api_key {
            builder = builder.header("x-api-key", API_KEY);
        }

        let request = match body {
            Some(bytes) => builder
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(bytes)),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}

pub async fn read_text(response: http::Response<Body>) -> (StatusCode, String) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}
