//! Persistence for generated and user-saved queries.

use crate::{
    db::PgPool,
    error::{Result, ServiceError},
    models::{NewSavedQuery, SavedPrompt, SavedQueryRow},
    schema::saved_queries::dsl,
};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::{error, info, warn};

const CREATE_SAVED_QUERIES: &str = "CREATE TABLE IF NOT EXISTS saved_queries (
    id SERIAL PRIMARY KEY,
    customer_id VARCHAR(255) NOT NULL,
    prompt_id VARCHAR(255) NOT NULL,
    query_text TEXT NOT NULL,
    prompt TEXT NOT NULL
)";

#[async_trait]
pub trait SavedQueryStore: Send + Sync {
    /// Creates the backing table when it does not exist yet.
    async fn ensure_schema(&self) -> Result<()>;

    async fn insert(&self, row: NewSavedQuery) -> Result<SavedQueryRow>;

    /// All saved prompts in insertion order.
    async fn list(&self) -> Result<Vec<SavedPrompt>>;

    /// SQL text stored under `prompt_id`, if any.
    async fn query_text(&self, prompt_id: &str) -> Result<Option<String>>;
}

#[derive(Clone)]
pub struct PgSavedQueryStore {
    pool: PgPool,
}

impl PgSavedQueryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<bb8::PooledConnection<'_, crate::db::PgConnectionManager>> {
        self.pool.get().await.map_err(|err| {
            error!(error = ?err, "failed to acquire database connection");
            ServiceError::Internal(anyhow::anyhow!("{err:?}"))
        })
    }
}

#[async_trait]
impl SavedQueryStore for PgSavedQueryStore {
    async fn ensure_schema(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.batch_execute(CREATE_SAVED_QUERIES)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))?;
        info!("saved_queries table ready");
        Ok(())
    }

    async fn insert(&self, row: NewSavedQuery) -> Result<SavedQueryRow> {
        let mut conn = self.connection().await?;
        let saved = diesel::insert_into(dsl::saved_queries)
            .values(&row)
            .returning(SavedQueryRow::as_returning())
            .get_result(&mut *conn)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))?;

        info!(id = saved.id, prompt_id = %saved.prompt_id, "saved query inserted");
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<SavedPrompt>> {
        let mut conn = self.connection().await?;
        dsl::saved_queries
            .select((dsl::prompt_id, dsl::prompt))
            .order(dsl::id.asc())
            .load::<SavedPrompt>(&mut *conn)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))
    }

    async fn query_text(&self, prompt_id: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let text = dsl::saved_queries
            .filter(dsl::prompt_id.eq(prompt_id))
            .select(dsl::query_text)
            .order(dsl::id.desc())
            .first::<String>(&mut *conn)
            .await
            .optional()
            .map_err(|err| ServiceError::Internal(err.into()))?;

        if text.is_none() {
            warn!(%prompt_id, "no saved query found");
        }
        Ok(text)
    }
}
