//! Language-model trait and the Claude-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::security::SecretString;

/// Language-model abstraction consumed by the extraction client.
///
/// One call per chunk: system instructions plus a user prompt, returning
/// the raw completion text. Implementations map rate limits and timeouts
/// to the retryable [`ModelError`] variants.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Run one completion.
    async fn generate(&self, system: &str, user: &str) -> ModelResult<String>;
}

/// Claude-backed extraction model using the Anthropic messages API.
///
/// Deterministic settings (temperature 0) so the fixed-schema output is
/// strictly parseable.
#[derive(Clone)]
pub struct ClaudeModel {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl ClaudeModel {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::new(api_key),
            model: "claude-3-sonnet-20240229".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
        }
    }

    /// Create from the `CLAUDE_API_KEY` environment variable.
    pub fn from_env() -> ModelResult<Self> {
        let api_key = std::env::var("CLAUDE_API_KEY")
            .map_err(|_| ModelError::Config("CLAUDE_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for proxies and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Current model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ExtractionModel for ClaudeModel {
    async fn generate(&self, system: &str, user: &str) -> ModelResult<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else {
                    ModelError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Service(format!(
                "model API error {}: {}",
                status, body
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Http(Box::new(e)))?;

        let text: String = parsed
            .content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(text)
    }
}
