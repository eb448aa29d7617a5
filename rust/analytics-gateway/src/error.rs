use crate::filter::FilterError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Upper bound on how much of an upstream error body is echoed to callers.
const UPSTREAM_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed")]
    Auth,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Auth => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidRequest(_) | ServiceError::Filter(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

/// Trimmed prefix of an upstream response body, cut on a char boundary.
pub fn upstream_excerpt(body: &str) -> &str {
    let body = body.trim();
    if body.len() <= UPSTREAM_BODY_LIMIT {
        return body;
    }
    let mut end = UPSTREAM_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                ServiceError::Internal(source) => error!(error = ?source, "request failed"),
                other => error!(error = %other, "request failed"),
            }
        }

        let body = ErrorBody {
            status: "fail",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
