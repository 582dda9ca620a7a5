//! Remote model APIs behind one trait

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::{defaults, AdvisoryConfig};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server returned status {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("Response carried no text content")]
    EmptyResponse,
    #[error("{0}")]
    Unsupported(String),
}

/// Unified trait for advisory backends
#[async_trait]
pub trait AdvisoryBackend: Send + Sync {
    /// Generate a response given a prompt
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl AdvisoryBackend for Box<dyn AdvisoryBackend> {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        (**self).generate(prompt).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

fn http_client(config: &AdvisoryConfig) -> Result<reqwest::Client, BackendError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn base_url(config: &AdvisoryConfig, fallback: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(fallback)
        .trim_end_matches('/')
        .to_string()
}

async fn checked(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

// ============================================================================
// Anthropic Messages API
// ============================================================================

pub struct AnthropicBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicBackend {
    pub fn new(config: &AdvisoryConfig, api_key: &str) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(config)?,
            base_url: base_url(config, defaults::ANTHROPIC_BASE_URL),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl AdvisoryBackend for AnthropicBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;
        let parsed: AnthropicResponse = checked(resp).await?.json().await?;
        parsed
            .content
            .into_iter()
            .find_map(|b| b.text)
            .ok_or(BackendError::EmptyResponse)
    }

    fn backend_name(&self) -> &'static str {
        "anthropic"
    }
}

// ============================================================================
// OpenAI chat completions
// ============================================================================

pub struct OpenAiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &AdvisoryConfig, api_key: &str) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(config)?,
            base_url: base_url(config, defaults::OPENAI_BASE_URL),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl AdvisoryBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: ChatCompletion = checked(resp).await?.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(BackendError::EmptyResponse)
    }

    fn backend_name(&self) -> &'static str {
        "openai"
    }
}

// ============================================================================
// Ollama (local)
// ============================================================================

pub struct OllamaBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: ChatMessage,
}

impl OllamaBackend {
    pub fn new(config: &AdvisoryConfig) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(config)?,
            base_url: base_url(config, defaults::OLLAMA_BASE_URL),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl AdvisoryBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": [{"role": "user", "content": prompt}],
        });
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let parsed: OllamaResponse = checked(resp).await?.json().await?;
        parsed.message.content.ok_or(BackendError::EmptyResponse)
    }

    fn backend_name(&self) -> &'static str {
        "ollama"
    }
}

// ============================================================================
// Unsupported
// ============================================================================

/// Backend that is never available.
///
/// Stands in for misconfigured providers so decisions come from the rule
/// engine instead of failing agent startup.
pub struct UnsupportedBackend {
    reason: String,
}

impl UnsupportedBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl AdvisoryBackend for UnsupportedBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
        Err(BackendError::Unsupported(self.reason.clone()))
    }

    fn backend_name(&self) -> &'static str {
        "unsupported"
    }
}
