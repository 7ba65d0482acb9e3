//! Language-model completion client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

/// A single prompt → text completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }
}

/// Text-generation capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String>;
}

/// Configuration for the chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ChatClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Ok(Self {
            base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            api_key: std::env::var("LLM_API_KEY")
                .map_err(|_| ServiceError::config_error("LLM_API_KEY not set"))?,
            model: std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(
                std::env::var("LLM_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: 1,
        })
    }
}

/// OpenAI-compatible chat-completions client.
pub struct ChatClient {
    http: Client,
    config: ChatClientConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ServiceResult<Self> {
        Self::new(ChatClientConfig::from_env()?)
    }

    async fn post_chat(&self, body: &serde_json::Value) -> ServiceResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!(model = %self.config.model, "sending chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::request_failed("llm", status.as_u16(), body));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServiceError::malformed("llm", "empty choices"))?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, request: &CompletionRequest) -> ServiceResult<String> {
        let mut body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            match self.post_chat(&body).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    warn!("chat completion failed (attempt {}): {e}", attempt + 1);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ServiceError::malformed("llm", "retry loop exhausted")))
    }
}

/// Strip markdown code fences the model wraps JSON in.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

/// Extract the first top-level JSON array span from free-form model output.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ChatClient {
        ChatClient::new(ChatClientConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            model: "test/model".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn completes_and_trims() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "  hello  "}}]
            })))
            .mount(&server)
            .await;

        let content = client_for(&server)
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn non_2xx_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402).set_body_string("payment required"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RequestFailed { status: 402, .. }));
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("plain"), "plain");
    }

    #[test]
    fn array_extraction() {
        assert_eq!(
            extract_json_array("Sure! Here: [1, 2, 3]. Enjoy."),
            Some("[1, 2, 3]")
        );
        assert_eq!(extract_json_array("no array here"), None);
    }
}
