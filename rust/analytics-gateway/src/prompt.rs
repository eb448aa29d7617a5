//! Natural-language to SQL generation backed by a completion provider.

use crate::{
    datamanager::DataManager,
    error::{Result, ServiceError},
    llm::CompletionProvider,
    models::NewSavedQuery,
    query::source::{validate_table_name, LakeConfig},
    store::SavedQueryStore,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

const INSTRUCTIONS: &str = "You write DuckDB SQL over Parquet files stored on S3. \
The user describes the analysis they need: columns, datasets, date ranges, calculations, \
groupings and orderings. Build a single query that answers it.\n\
- Use added_date_full, not ts, for date filtering and aggregation; do not cast the start or end date.\n\
- Reach nested JSON fields with JSON_EXTRACT(_data, '$.key1.key2').\n\
- Convert numeric JSON fields with CAST(JSON_EXTRACT(_data, '$.key1.key2') AS DOUBLE).\n\
- Reply with the SQL only, without explanations.\n";

static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```sql\r?\n([\s\S]*?)\r?\n```").expect("SQL fence pattern is valid")
});

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "tableName1")]
    pub table_name1: Option<String>,
    #[serde(default, rename = "tableName2")]
    pub table_name2: Option<String>,
}

#[derive(Clone)]
pub struct PromptService {
    data_manager: Arc<dyn DataManager>,
    completion: Option<Arc<dyn CompletionProvider>>,
    store: Arc<dyn SavedQueryStore>,
    lake: LakeConfig,
}

impl PromptService {
    pub fn new(
        data_manager: Arc<dyn DataManager>,
        completion: Option<Arc<dyn CompletionProvider>>,
        store: Arc<dyn SavedQueryStore>,
        lake: LakeConfig,
    ) -> Self {
        Self {
            data_manager,
            completion,
            store,
            lake,
        }
    }

    /// Drafts SQL for the request, stores it with the prompt and returns it.
    pub async fn generate(&self, request: CompletionRequest) -> Result<String> {
        let question = request
            .query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("Please provide a query".into()))?;
        let primary = request
            .table_name1
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("Please provide a table name".into()))?;
        let secondary = request.table_name2.filter(|t| !t.trim().is_empty());

        let completion = self.completion.as_ref().ok_or_else(|| {
            ServiceError::Config("completion provider is not configured (set OPENAI_KEY)".into())
        })?;

        let mut prompt = String::from(INSTRUCTIONS);
        for table in std::iter::once(primary.as_str()).chain(secondary.as_deref()) {
            self.describe_table(&mut prompt, table).await?;
        }
        prompt.push_str(&question);
        debug!(prompt_len = prompt.len(), "built completion prompt");

        let response = completion.complete(&prompt).await?;
        let sql = match extract_sql(&response) {
            Some(sql) => sql.to_string(),
            None => response,
        };
        info!(sql_len = sql.len(), "completion produced query");

        self.store
            .insert(NewSavedQuery::new(&self.lake.customer_id, sql.clone(), prompt))
            .await?;
        Ok(sql)
    }

    async fn describe_table(&self, prompt: &mut String, table: &str) -> Result<()> {
        let table = validate_table_name(table)?;
        info!(%table, "fetching table schema");
        let schema = self.data_manager.table_schema(table).await?;
        prompt.push_str(&format!(
            "S3 path: '{}'\nDataset {table}: {}\n",
            self.lake.s3_uri(table)?,
            schema.trim()
        ));
        Ok(())
    }
}

/// Body of the first ```` ```sql ```` fenced block in a completion, if any.
pub fn extract_sql(response: &str) -> Option<&str> {
    SQL_FENCE
        .captures(response)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str())
}
