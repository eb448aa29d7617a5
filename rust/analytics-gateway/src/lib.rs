pub mod config;
pub mod datamanager;
pub mod db;
pub mod error;
pub mod extract;
pub mod filter;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod query;
pub mod response;
pub mod saved;
pub mod schema;
pub mod server;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod time;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the gateway using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).await?.run().await
}
