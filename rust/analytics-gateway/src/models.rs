//! Rows of the `saved_queries` table.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::saved_queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SavedQueryRow {
    pub id: i32,
    pub customer_id: String,
    pub prompt_id: String,
    pub query_text: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = crate::schema::saved_queries)]
pub struct NewSavedQuery {
    pub customer_id: String,
    pub prompt_id: String,
    pub query_text: String,
    pub prompt: String,
}

impl NewSavedQuery {
    /// New row keyed by a freshly generated prompt id.
    pub fn new(customer_id: &str, query_text: String, prompt: String) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            prompt_id: uuid::Uuid::new_v4().to_string(),
            query_text,
            prompt,
        }
    }
}

/// Listing entry returned by `/getPrompts`.
#[derive(Debug, Clone, PartialEq, Queryable, Serialize, Deserialize)]
pub struct SavedPrompt {
    pub prompt_id: String,
    pub prompt: String,
}
