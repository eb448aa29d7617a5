//! Chat-completion client used to draft SQL from natural language.

use crate::error::{upstream_excerpt, Result, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Sends `prompt` as a single system message and returns the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!(model = %self.config.model, "requesting completion");
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "system",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ServiceError::Upstream(format!("completion request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "completion provider rejected request");
            return Err(ServiceError::Upstream(format!(
                "completion provider returned status {status}: {}",
                upstream_excerpt(&body)
            )));
        }

        let reply: ChatResponse = response.json().await.map_err(|err| {
            ServiceError::Upstream(format!("failed to decode completion response: {err}"))
        })?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ServiceError::Upstream("completion provider returned no content".into()))
    }
}
