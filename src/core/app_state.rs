use crate::core::config::{load_scout_config, ScoutConfig};
use crate::llm::prompts::load_system_prompt;
use std::sync::Arc;

/// Process-wide state: one HTTP client, the resolved config and the system
/// prompt (read once at construction, shared read-only afterwards).
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<ScoutConfig>,
    pub system_prompt: Arc<str>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("provider", &self.config.resolve_provider())
            .field("strict", &self.config.resolve_strict())
            .field("system_prompt_chars", &self.system_prompt.chars().count())
            .finish()
    }
}

impl AppState {
    /// Config from `form-scout.json`/env, system prompt from its configured path.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_config(http_client, load_scout_config())
    }

    pub fn with_config(http_client: reqwest::Client, config: ScoutConfig) -> Self {
        let system_prompt = load_system_prompt(&config.resolve_system_prompt_path());
        Self {
            http_client,
            config: Arc::new(config),
            system_prompt: Arc::from(system_prompt),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Arc::from(prompt.into());
        self
    }
}
