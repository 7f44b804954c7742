use std::time::Duration;

use docflow_core::ContextMessage;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::error::{LlmError, LlmResult};
use crate::types::*;

const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60000;

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl ChatClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }
}

/// Client for OpenAI-compatible chat completion endpoints
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    async fn with_retry<T, F, Fut>(&self, operation: F, operation_name: &str) -> LlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = LlmResult<T>>,
    {
        let max_backoff = Duration::from_millis(MAX_BACKOFF_MS);
        let mut retries = 0;
        let mut backoff = self.config.initial_backoff;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => {
                    if retries >= self.config.max_retries {
                        error!(
                            "{} failed after {} retries: {}",
                            operation_name, retries, e
                        );
                        return Err(e);
                    }

                    let wait = match &e {
                        LlmError::RateLimited {
                            retry_after: Some(secs),
                        } => Duration::from_secs(*secs),
                        _ => backoff,
                    }
                    .min(max_backoff);

                    warn!(
                        "{} failed ({}), retrying in {}ms (attempt {}/{})",
                        operation_name,
                        e,
                        wait.as_millis(),
                        retries + 1,
                        self.config.max_retries
                    );

                    tokio::time::sleep(wait).await;
                    retries += 1;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(e) => {
                    if retries > 0 {
                        info!("{} failed after {} retries: {}", operation_name, retries, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Plain-text completion for a conversation.
    pub async fn chat_completion(&self, messages: &[ContextMessage]) -> LlmResult<String> {
        self.with_retry(
            || async { self.chat_completion_inner(messages, None).await },
            "chat_completion",
        )
        .await
    }

    /// Completion constrained to a JSON object reply.
    pub async fn chat_completion_json(&self, messages: &[ContextMessage]) -> LlmResult<String> {
        self.with_retry(
            || async {
                self.chat_completion_inner(messages, Some(ResponseFormat::json_object()))
                    .await
            },
            "chat_completion_json",
        )
        .await
    }

    async fn chat_completion_inner(
        &self,
        messages: &[ContextMessage],
        response_format: Option<ResponseFormat>,
    ) -> LlmResult<String> {
        debug!(
            "Creating chat completion with {} messages, model {}",
            messages.len(),
            self.config.model
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                warn!("Rate limited by chat API");
                return Err(LlmError::RateLimited { retry_after });
            }

            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                error!(
                    "Chat API error: {} (type: {:?})",
                    error_resp.error.message, error_resp.error.error_type
                );
                return Err(LlmError::Api {
                    message: error_resp.error.message,
                    status_code: Some(status.as_u16()),
                });
            }

            return Err(LlmError::Api {
                message: error_text,
                status_code: Some(status.as_u16()),
            });
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no completion returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "model": "test-model",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })
    }

    fn client(server: &MockServer) -> ChatClient {
        ChatClient::new(
            ChatClientConfig::new(server.uri(), "test-key", "test-model")
                .with_retries(2, Duration::from_millis(5)),
        )
    }

    #[test]
    fn test_config_trims_base_url() {
        let config = ChatClientConfig::new("https://api.example.com/v1/", "k", "m");
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_chat_completion_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello")))
            .expect(1)
            .mount(&server)
            .await;

        let content = client(&server)
            .chat_completion(&[ContextMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(content, "Hello");
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Recovered")))
            .mount(&server)
            .await;

        let content = client(&server)
            .chat_completion(&[ContextMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(content, "Recovered");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "bad model", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .chat_completion(&[ContextMessage::user("hi")])
            .await
            .unwrap_err();
        match err {
            LlmError::Api {
                message,
                status_code,
            } => {
                assert_eq!(message, "bad model");
                assert_eq!(status_code, Some(400));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server)
            .chat_completion(&[ContextMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_json_mode_sets_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let content = client(&server)
            .chat_completion_json(&[ContextMessage::user("review")])
            .await
            .unwrap();
        assert_eq!(content, "{}");
    }
}
