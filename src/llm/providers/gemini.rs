use super::read_json;
use crate::llm::{
    clean_api_key, with_retry, ChatMessage, ChatOptions, ChatProvider, LlmError, ProviderKind,
    Role,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Google Generative Language API (`models/{model}:generateContent`).
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_retry: Duration,
}

impl GeminiProvider {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: &str,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key =
            clean_api_key(api_key).ok_or(LlmError::MissingApiKey(ProviderKind::Gemini))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            timeout: Duration::from_secs(60),
            max_retry: Duration::from_secs(20),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retry(mut self, max_retry: Duration) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// System messages go to `systemInstruction`; `assistant` turns become `model`.
    fn request_body(messages: &[ChatMessage], options: &ChatOptions) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut generation = json!({"temperature": options.temperature});
        if let Some(max_tokens) = options.max_tokens {
            generation["maxOutputTokens"] = json!(max_tokens);
        }
        let mut body = json!({"contents": contents, "generationConfig": generation});
        if !system.is_empty() {
            body["systemInstruction"] = json!({
                "role": "system",
                "parts": [{"text": system.join("\n\n")}],
            });
        }
        body
    }

    async fn chat_once(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(&Self::request_body(messages, options))
            .send()
            .await?;
        let value = read_json(response).await?;

        let text: String = value
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        debug!("{} replied with {} chars", self.model, text.len());
        Ok(text.to_string())
    }

    async fn list_models_once(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;
        let value = read_json(response).await?;
        Ok(value
            .get("models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        with_retry(self.name(), self.max_retry, || self.list_models_once()).await
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        with_retry(self.name(), self.max_retry, || {
            self.chat_once(messages, options)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(Client::new(), server.uri(), "g-key", "gemini-test")
            .unwrap()
            .with_max_retry(Duration::from_secs(0))
    }

    #[test]
    fn request_body_maps_roles() {
        let body = GeminiProvider::request_body(
            &[
                ChatMessage::system("rules"),
                ChatMessage::user("q1"),
                ChatMessage::assistant("a1"),
                ChatMessage::system("more"),
                ChatMessage::user("q2"),
            ],
            &ChatOptions {
                temperature: 0.3,
                max_tokens: Some(64),
            },
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "rules\n\nmore");
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn no_system_instruction_without_system_messages() {
        let body = GeminiProvider::request_body(&[ChatMessage::user("q")], &ChatOptions::default());
        assert!(body.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn chat_concatenates_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"answer\": "}, {"text": "\"B\"}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .chat(&[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(reply, "{\"answer\": \"B\"}");
    }

    #[tokio::test]
    async fn api_errors_keep_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "API key not valid"}
            })))
            .mount(&server)
            .await;
        let err = provider(&server)
            .chat(&[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn lists_model_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(query_param("key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "models/gemini-test"}]
            })))
            .mount(&server)
            .await;
        assert_eq!(
            provider(&server).list_models().await.unwrap(),
            vec!["models/gemini-test"]
        );
    }
}
