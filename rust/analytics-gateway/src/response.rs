//! Success envelope shared by all JSON endpoints.

use crate::query::{reports::Presentation, ReportOutput};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
            chart: None,
        }
    }
}

impl ApiResponse<Value> {
    pub fn report(output: ReportOutput) -> Self {
        let ReportOutput { presentation, rows } = output;
        match presentation {
            Presentation::Raw => Self::success(rows),
            Presentation::Typed(label) => Self {
                status: "success",
                data: json!({ "type": label, "data": rows }),
                chart: Some(json!({})),
            },
            Presentation::Chart(kind) => Self {
                status: "success",
                data: json!({}),
                chart: Some(json!({ "chartType": kind, "data": rows })),
            },
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
