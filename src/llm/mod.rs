pub mod prompts;
pub mod providers;

pub use providers::gemini::GeminiProvider;
pub use providers::openai::OpenAiCompatProvider;

use crate::core::config::ScoutConfig;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("no API key configured for {0}")]
    MissingApiKey(ProviderKind),
}

impl LlmError {
    /// Bad or missing credentials; retrying or moving on to the next question will not help.
    pub fn is_auth(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => matches!(status, 401 | 403),
            LlmError::MissingApiKey(_) => true,
            _ => false,
        }
    }

    /// Rate limits, server errors and transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: None,
        }
    }
}

/// A chat-completion backend. One implementation per API family; everything
/// above this trait is provider-agnostic.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Model identifiers visible to the configured key.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;

    /// One completion for the ordered messages.
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions)
        -> Result<String, LlmError>;
}

/// Supported API families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Groq,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::Gemini => "gemini-2.5-flash-lite",
        }
    }

    /// Prefix of the provider's environment variables (`GROQ_API_KEY`, ...).
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ",
            ProviderKind::Gemini => "GEMINI",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" | "openai" => Ok(ProviderKind::Groq),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(format!("unknown provider '{}' (expected groq or gemini)", other)),
        }
    }
}

/// Build the provider selected by `kind` from the resolved configuration.
pub fn provider_from_config(
    client: reqwest::Client,
    config: &ScoutConfig,
    kind: ProviderKind,
) -> Result<Arc<dyn ChatProvider>, LlmError> {
    let api_key = config
        .resolve_api_key(kind)
        .ok_or(LlmError::MissingApiKey(kind))?;
    let base_url = config.resolve_base_url(kind);
    let model = config.resolve_model(kind);
    let timeout = config.resolve_llm_timeout();
    let max_retry = config.resolve_max_retry();

    let provider: Arc<dyn ChatProvider> = match kind {
        ProviderKind::Groq => Arc::new(
            OpenAiCompatProvider::new(client, base_url, &api_key, model)?
                .with_timeout(timeout)
                .with_max_retry(max_retry),
        ),
        ProviderKind::Gemini => Arc::new(
            GeminiProvider::new(client, base_url, &api_key, model)?
                .with_timeout(timeout)
                .with_max_retry(max_retry),
        ),
    };
    Ok(provider)
}

/// Trim whitespace and one layer of surrounding quotes; `None` when nothing is left.
pub(crate) fn clean_api_key(raw: &str) -> Option<String> {
    let key = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    (!key.is_empty()).then(|| key.to_string())
}

/// Best human-readable message in an error body.
pub(crate) fn api_error_message(body: &str) -> String {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let from_error = match v.get("error") {
        Some(Value::Object(e)) => e.get("message").and_then(Value::as_str),
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    };
    from_error
        .or_else(|| v.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Run `op` again on transient failures until `max_elapsed` has passed.
pub(crate) async fn with_retry<T, F, Fut>(
    provider: &str,
    max_elapsed: Duration,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(max_elapsed))
        .build();

    retry(policy, || {
        let attempt = op();
        async move {
            attempt.await.map_err(|e| {
                if e.is_transient() {
                    warn!("{} call failed, retrying: {}", provider, e);
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}
