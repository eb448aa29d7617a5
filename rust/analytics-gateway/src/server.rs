use crate::{
    config::AppConfig,
    datamanager::HttpDataManager,
    db,
    error::{Result, ServiceError},
    extract::{ApiJson, ApiQuery},
    llm::{CompletionProvider, OpenAiClient},
    models::{SavedPrompt, SavedQueryRow},
    prompt::CompletionRequest,
    query::{reports::Report, ReportParams, TableParams, TranslateResponse},
    response::ApiResponse,
    saved::SaveQueryRequest,
    state::AppState,
    store::{PgSavedQueryStore, SavedQueryStore},
};
use anyhow::Context;
use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config.database).await?;
        let store = PgSavedQueryStore::new(pool);
        store
            .ensure_schema()
            .await
            .context("failed to prepare saved_queries table")?;

        let config = Arc::new(config);
        let data_manager = HttpDataManager::new(config.data_manager.clone())?;
        let completion: Option<Arc<dyn CompletionProvider>> = match config.openai.clone() {
            Some(openai) => Some(Arc::new(OpenAiClient::new(openai)?)),
            None => {
                warn!("OPENAI_KEY not set; /completion is disabled");
                None
            }
        };

        let state = AppState::new(
            Arc::clone(&config),
            Arc::new(data_manager),
            completion,
            Arc::new(store),
        );
        Ok(Self { config, state })
    }

    /// Builds a server around pre-wired state.
    pub fn from_state(state: AppState) -> Self {
        Self {
            config: Arc::clone(&state.config),
            state,
        }
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/", get(Self::index))
            .route("/query", post(Self::query))
            .route("/translate", post(Self::translate))
            .route("/completion", post(Self::completion))
            .route("/save-query", post(Self::save_query))
            .route("/getPrompts", get(Self::prompts))
            .route("/execute/:id", get(Self::execute))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_api_key,
            ));

        Router::new()
            .route("/healthz", get(Self::health))
            .merge(api)
            .with_state(self.state.clone())
            .layer(cors_layer(&self.config))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "analytics gateway listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn index(
        State(state): State<AppState>,
        ApiQuery(params): ApiQuery<ReportParams>,
    ) -> Result<Response> {
        let Some(report) = params.report_type.as_deref().and_then(Report::from_type) else {
            return Ok("Hello, World!".into_response());
        };

        let output = state.query.run_report(report, &params).await?;
        Ok(ApiResponse::report(output).into_response())
    }

    async fn query(
        State(state): State<AppState>,
        ApiQuery(params): ApiQuery<TableParams>,
        ApiJson(body): ApiJson<Value>,
    ) -> Result<ApiResponse<Value>> {
        let table = required_table(&params)?;
        let data = state.query.query_data(table, &body).await?;
        Ok(ApiResponse::success(data))
    }

    async fn translate(
        State(state): State<AppState>,
        ApiQuery(params): ApiQuery<TableParams>,
        ApiJson(body): ApiJson<Value>,
    ) -> Result<ApiResponse<TranslateResponse>> {
        let table = required_table(&params)?;
        Ok(ApiResponse::success(state.query.translate(table, &body)?))
    }

    async fn completion(
        State(state): State<AppState>,
        ApiJson(request): ApiJson<CompletionRequest>,
    ) -> Result<ApiResponse<String>> {
        let sql = state.prompts.generate(request).await?;
        Ok(ApiResponse::success(sql))
    }

    async fn save_query(
        State(state): State<AppState>,
        ApiJson(request): ApiJson<SaveQueryRequest>,
    ) -> Result<ApiResponse<SavedQueryRow>> {
        let saved = state.saved.save(request).await?;
        Ok(ApiResponse::success(saved))
    }

    async fn prompts(State(state): State<AppState>) -> Result<ApiResponse<Vec<SavedPrompt>>> {
        Ok(ApiResponse::success(state.saved.list().await?))
    }

    async fn execute(
        State(state): State<AppState>,
        Path(id): Path<String>,
    ) -> Result<ApiResponse<Value>> {
        Ok(ApiResponse::success(state.saved.execute(&id).await?))
    }
}

fn required_table(params: &TableParams) -> Result<&str> {
    params
        .table_name
        .as_deref()
        .ok_or_else(|| ServiceError::InvalidRequest("tableName is required".into()))
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    enforce_api_key(request.headers(), &state.config)?;
    Ok(next.run(request).await)
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    if let Some(expected) = &config.api_key {
        let provided = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected.as_str()) {
            return Err(ServiceError::Auth);
        }
    }

    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    match &config.allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            layer.allow_origin(AllowOrigin::list(origins))
        }
        None => layer.allow_origin(Any),
    }
}
