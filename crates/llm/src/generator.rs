use async_trait::async_trait;
use docflow_core::{ContextLog, Document};
use orchestrator::{ContentGenerator, OrchestratorError, Result};
use tracing::debug;

use crate::client::ChatClient;

/// Drafts documentation by sending the step's context log as the conversation.
#[derive(Clone)]
pub struct LlmGenerator {
    client: ChatClient,
}

impl LlmGenerator {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate(&self, title: &str, context: &ContextLog) -> Result<Document> {
        let content = self
            .client
            .chat_completion(context.messages())
            .await
            .map_err(OrchestratorError::generation)?;

        if content.trim().is_empty() {
            return Err(OrchestratorError::generation("model returned an empty draft"));
        }

        debug!(title, chars = content.len(), "Draft generated");
        Ok(Document::new(title, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatClientConfig;
    use docflow_core::ContextMessage;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> LlmGenerator {
        LlmGenerator::new(ChatClient::new(
            ChatClientConfig::new(server.uri(), "k", "m").with_retries(0, Duration::from_millis(1)),
        ))
    }

    #[tokio::test]
    async fn test_generate_sends_context_log() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "write docs"},
                    {"role": "user", "content": "Product Info:\nGlowBrew - lights"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "# GlowBrew"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let log = ContextLog::with_system("write docs")
            .appended(ContextMessage::user("Product Info:\nGlowBrew - lights"));
        let doc = generator(&server)
            .generate("Generated document - GlowBrew", &log)
            .await
            .unwrap();

        assert_eq!(doc.title(), "Generated document - GlowBrew");
        assert_eq!(doc.content(), "# GlowBrew");
    }

    #[tokio::test]
    async fn test_api_failure_maps_to_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate("t", &ContextLog::with_system("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Generation(_)));
        assert!(!err.is_run_fatal());
    }

    #[tokio::test]
    async fn test_empty_draft_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  "}}]
            })))
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate("t", &ContextLog::with_system("s"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty draft"));
    }
}
