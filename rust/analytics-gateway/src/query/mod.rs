//! Builds analytical SQL for the data manager and forwards it.

pub mod reports;
pub mod source;

pub use crate::filter::BindParam;

use crate::{
    config::AppConfig,
    datamanager::DataManager,
    error::Result,
    filter::{self, FilterExpr},
    time::DateRange,
};
use reports::{Presentation, Report};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use source::validate_table_name;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableParams {
    #[serde(default, rename = "tableName")]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportParams {
    #[serde(default, rename = "type")]
    pub report_type: Option<String>,
    #[serde(default, rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(default, rename = "tableName")]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateResponse {
    /// Interpolated `WHERE` clause body.
    #[serde(rename = "where")]
    pub where_clause: String,
    /// Complete statement as it would be sent to the data manager.
    pub sql: String,
    pub parameterized: filter::ParameterizedFilter,
}

#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub presentation: Presentation,
    pub rows: Value,
}

#[derive(Clone)]
pub struct QueryEngine {
    data_manager: Arc<dyn DataManager>,
    config: Arc<AppConfig>,
}

impl QueryEngine {
    pub fn new(data_manager: Arc<dyn DataManager>, config: Arc<AppConfig>) -> Self {
        Self {
            data_manager,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Validates a raw JSON filter against the configured nesting limit.
    pub fn parse_filter(&self, body: &Value) -> Result<FilterExpr> {
        Ok(filter::parse_with_depth(body, self.config.max_filter_depth)?)
    }

    pub fn filtered_select(&self, table: &str, expr: &FilterExpr) -> Result<String> {
        let source = self.config.lake.read_parquet(validate_table_name(table)?)?;
        Ok(format!("SELECT * FROM {source} WHERE {}", filter::compile(expr)))
    }

    /// Compiles `body` into a filtered select over `table` and runs it.
    pub async fn query_data(&self, table: &str, body: &Value) -> Result<Value> {
        let expr = self.parse_filter(body)?;
        let sql = self.filtered_select(table, &expr)?;
        info!(%table, "forwarding filtered query");
        self.data_manager.query(&sql).await
    }

    pub fn translate(&self, table: &str, body: &Value) -> Result<TranslateResponse> {
        let expr = self.parse_filter(body)?;
        Ok(TranslateResponse {
            where_clause: filter::compile(&expr),
            sql: self.filtered_select(table, &expr)?,
            parameterized: filter::compile_parameterized(&expr),
        })
    }

    pub async fn run_report(&self, report: Report, params: &ReportParams) -> Result<ReportOutput> {
        let range = if report.requires_dates() {
            Some(DateRange::from_params(
                params.start_date.as_deref(),
                params.end_date.as_deref(),
            )?)
        } else {
            None
        };

        let sql = report.sql(
            &self.config.lake,
            range.as_ref(),
            params
                .table_name
                .as_deref()
                .filter(|table| !table.trim().is_empty()),
        )?;
        info!(report = report.type_name(), "running report");
        let rows = self.data_manager.query(&sql).await?;

        Ok(ReportOutput {
            presentation: report.presentation(),
            rows,
        })
    }
}
