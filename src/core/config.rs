use crate::llm::ProviderKind;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ScoutConfig : file-based config loader (form-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const CONFIG_FILE_NAME: &str = "form-scout.json";
pub const ENV_CONFIG_PATH: &str = "FORM_SCOUT_CONFIG";

/// LLM sub-config (the `llm` key in form-scout.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct LlmConfig {
    /// `groq` (any OpenAI-compatible endpoint) or `gemini`.
    pub provider: Option<String>,
    pub base_url: Option<String>,
    /// Never logged.
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    /// Upper bound on time spent retrying rate limits and server errors.
    pub max_retry_secs: Option<u64>,
}

/// Form fetch/submit sub-config (the `form` key).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct FormConfig {
    pub timeout_secs: Option<u64>,
    /// Reject undeclared answers instead of silently dropping them.
    pub strict: Option<bool>,
    /// Pause between questions, milliseconds.
    pub delay_ms: Option<u64>,
}

/// Prompt context sub-config (the `context` key).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ContextConfig {
    pub system_prompt_path: Option<String>,
    pub qa_cache_path: Option<String>,
    pub qa_cache_max_pairs: Option<usize>,
    pub qa_cache_max_chars: Option<usize>,
    pub reset_on_new_section: Option<bool>,
}

/// Top-level config loaded from `form-scout.json`.
///
/// Every `resolve_*` accessor follows the same order: JSON field, then the
/// environment variable, then a built-in default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct ScoutConfig {
    pub llm: LlmConfig,
    pub form: FormConfig,
    pub context: ContextConfig,
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).map(|v| {
        !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        )
    })
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

impl ScoutConfig {
    /// `llm.provider` → `FORM_SCOUT_PROVIDER` → `groq`. Unknown names fall back
    /// to the default with a warning.
    pub fn resolve_provider(&self) -> ProviderKind {
        let Some(raw) = non_blank(&self.llm.provider).or_else(|| env_string("FORM_SCOUT_PROVIDER"))
        else {
            return ProviderKind::default();
        };
        raw.parse().unwrap_or_else(|e| {
            tracing::warn!("{}; using {}", e, ProviderKind::default());
            ProviderKind::default()
        })
    }

    /// `llm.base_url` → `GROQ_BASE_URL` / `GEMINI_BASE_URL` → provider default.
    pub fn resolve_base_url(&self, kind: ProviderKind) -> String {
        non_blank(&self.llm.base_url)
            .or_else(|| env_string(&format!("{}_BASE_URL", kind.env_prefix())))
            .unwrap_or_else(|| kind.default_base_url().to_string())
    }

    /// `llm.api_key` → `GROQ_API_KEY` / `GEMINI_API_KEY` → `None`.
    pub fn resolve_api_key(&self, kind: ProviderKind) -> Option<String> {
        non_blank(&self.llm.api_key)
            .or_else(|| env_string(&format!("{}_API_KEY", kind.env_prefix())))
    }

    /// `llm.model` → `GROQ_MODEL` / `GEMINI_MODEL` → provider default.
    pub fn resolve_model(&self, kind: ProviderKind) -> String {
        non_blank(&self.llm.model)
            .or_else(|| env_string(&format!("{}_MODEL", kind.env_prefix())))
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    /// `llm.temperature` → `FORM_SCOUT_TEMPERATURE` → 0.1.
    pub fn resolve_temperature(&self) -> f32 {
        self.llm
            .temperature
            .or_else(|| env_parse("FORM_SCOUT_TEMPERATURE"))
            .unwrap_or(0.1)
    }

    /// `llm.timeout_secs` → `LLM_TIMEOUT_SECS` → 60s.
    pub fn resolve_llm_timeout(&self) -> Duration {
        Duration::from_secs(
            self.llm
                .timeout_secs
                .or_else(|| env_parse("LLM_TIMEOUT_SECS"))
                .unwrap_or(60),
        )
    }

    /// `llm.max_retry_secs` → `LLM_MAX_RETRY_SECS` → 20s.
    pub fn resolve_max_retry(&self) -> Duration {
        Duration::from_secs(
            self.llm
                .max_retry_secs
                .or_else(|| env_parse("LLM_MAX_RETRY_SECS"))
                .unwrap_or(20),
        )
    }

    /// `form.timeout_secs` → `HTTP_TIMEOUT_SECS` → 20s.
    pub fn resolve_form_timeout(&self) -> Duration {
        Duration::from_secs(
            self.form
                .timeout_secs
                .or_else(|| env_parse("HTTP_TIMEOUT_SECS"))
                .unwrap_or(20),
        )
    }

    /// `form.strict` → `FORM_SCOUT_STRICT` → `true`.
    pub fn resolve_strict(&self) -> bool {
        self.form
            .strict
            .or_else(|| env_bool("FORM_SCOUT_STRICT"))
            .unwrap_or(true)
    }

    /// `form.delay_ms` → `FORM_SCOUT_DELAY_MS` → 300ms.
    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(
            self.form
                .delay_ms
                .or_else(|| env_parse("FORM_SCOUT_DELAY_MS"))
                .unwrap_or(300),
        )
    }

    /// `context.system_prompt_path` → `SYSTEM_PROMPT_PATH` → `system_prompt.txt`.
    pub fn resolve_system_prompt_path(&self) -> PathBuf {
        non_blank(&self.context.system_prompt_path)
            .or_else(|| env_string("SYSTEM_PROMPT_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("system_prompt.txt"))
    }

    /// `context.qa_cache_path` → `QA_CACHE_PATH` → `None` (memory only).
    pub fn resolve_qa_cache_path(&self) -> Option<PathBuf> {
        non_blank(&self.context.qa_cache_path)
            .or_else(|| env_string("QA_CACHE_PATH"))
            .map(PathBuf::from)
    }

    /// `context.qa_cache_max_pairs` → `QA_CACHE_MAX_PAIRS` → 5.
    pub fn resolve_qa_cache_max_pairs(&self) -> usize {
        self.context
            .qa_cache_max_pairs
            .or_else(|| env_parse("QA_CACHE_MAX_PAIRS"))
            .unwrap_or(5)
    }

    /// `context.qa_cache_max_chars` → `QA_CACHE_MAX_CHARS` → 900.
    pub fn resolve_qa_cache_max_chars(&self) -> usize {
        self.context
            .qa_cache_max_chars
            .or_else(|| env_parse("QA_CACHE_MAX_CHARS"))
            .unwrap_or(900)
    }

    pub fn resolve_reset_on_new_section(&self) -> bool {
        self.context.reset_on_new_section.unwrap_or(true)
    }
}

/// Load `form-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `FORM_SCOUT_CONFIG` env var path
/// 2. `./form-scout.json`
/// 3. `~/.form-scout/form-scout.json`
///
/// Missing file → `ScoutConfig::default()` (all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = Vec::new();
    if let Some(env_path) = env_string(ENV_CONFIG_PATH) {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from(CONFIG_FILE_NAME));
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".form-scout").join(CONFIG_FILE_NAME));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<ScoutConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("{} loaded from {}", CONFIG_FILE_NAME, path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "{} parse error at {}: {}; using defaults",
                    CONFIG_FILE_NAME,
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}
