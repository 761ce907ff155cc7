use super::read_json;
use crate::llm::{
    clean_api_key, with_retry, ChatMessage, ChatOptions, ChatProvider, LlmError, ProviderKind,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Any OpenAI-style `chat/completions` endpoint (Groq by default).
pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_retry: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: &str,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = clean_api_key(api_key).ok_or(LlmError::MissingApiKey(ProviderKind::Groq))?;
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

    async fn chat_once(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": self.model,
            "temperature": options.temperature,
            "messages": messages
                .iter()
                .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
                .collect::<Vec<_>>(),
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let value = read_json(response).await?;

        let content = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(LlmError::EmptyContent)?;
        debug!("{} replied with {} chars", self.model, content.len());
        Ok(content)
    }

    async fn list_models_once(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        let value = read_json(response).await?;
        Ok(value
            .get("data")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
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
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(Client::new(), server.uri(), " \"sk-test\" ", "llama-test")
            .unwrap()
            .with_max_retry(Duration::from_secs(0))
    }

    #[tokio::test]
    async fn chat_posts_messages_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "llama-test",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " {\"answer\": \"Yes\"} "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .chat(
                &[ChatMessage::system("sys"), ChatMessage::user("hi")],
                &ChatOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(reply, "{\"answer\": \"Yes\"}");
    }

    #[tokio::test]
    async fn auth_failure_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API Key"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        let err = provider(&server)
            .chat(&[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn lists_model_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "llama-a"}, {"id": "llama-b"}]
            })))
            .mount(&server)
            .await;
        let models = provider(&server).list_models().await.unwrap();
        assert_eq!(models, vec!["llama-a", "llama-b"]);
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            OpenAiCompatProvider::new(Client::new(), "http://x", "  ", "m"),
            Err(LlmError::MissingApiKey(ProviderKind::Groq))
        ));
    }
}
