use crate::{
    datamanager::DataManager,
    error::{Result, ServiceError},
    models::{NewSavedQuery, SavedPrompt, SavedQueryRow},
    store::SavedQueryStore,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveQueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub query_name: Option<String>,
}

/// Saved query listing, storage and replay against the data manager.
#[derive(Clone)]
pub struct SavedQueries {
    store: Arc<dyn SavedQueryStore>,
    data_manager: Arc<dyn DataManager>,
    customer_id: String,
}

impl SavedQueries {
    pub fn new(
        store: Arc<dyn SavedQueryStore>,
        data_manager: Arc<dyn DataManager>,
        customer_id: String,
    ) -> Self {
        Self {
            store,
            data_manager,
            customer_id,
        }
    }

    pub async fn save(&self, request: SaveQueryRequest) -> Result<SavedQueryRow> {
        let (query, name) = match (non_empty(request.query), non_empty(request.query_name)) {
            (Some(query), Some(name)) => (query, name),
            _ => return Err(ServiceError::InvalidRequest("No query provided".into())),
        };

        info!(query_name = %name, "saving query");
        self.store
            .insert(NewSavedQuery::new(&self.customer_id, query, name))
            .await
    }

    pub async fn list(&self) -> Result<Vec<SavedPrompt>> {
        self.store.list().await
    }

    pub async fn execute(&self, prompt_id: &str) -> Result<Value> {
        let sql = self
            .store
            .query_text(prompt_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no saved query for id '{prompt_id}'")))?;

        info!(%prompt_id, "executing saved query");
        self.data_manager.execute(&sql).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
