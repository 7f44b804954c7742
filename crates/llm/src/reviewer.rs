//! Proofreading through a chat model that replies with a JSON verdict.

use async_trait::async_trait;
use docflow_core::{ContextMessage, Document, ReviewVerdict};
use orchestrator::documentation::DocumentationPrompts;
use orchestrator::{OrchestratorError, Result, Reviewer};
use serde_json::Value;
use tracing::debug;

use crate::client::ChatClient;
use crate::error::{LlmError, LlmResult};

#[derive(Clone)]
pub struct LlmReviewer {
    client: ChatClient,
    system_prompt: String,
}

impl LlmReviewer {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            system_prompt: DocumentationPrompts::reviewer_system().to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, document: &Document) -> Result<ReviewVerdict> {
        let messages = [
            ContextMessage::system(self.system_prompt.clone()),
            ContextMessage::user(DocumentationPrompts::review_request(document)),
        ];

        let reply = self
            .client
            .chat_completion_json(&messages)
            .await
            .map_err(OrchestratorError::review)?;

        let verdict = parse_verdict(&reply).map_err(OrchestratorError::review)?;
        debug!(
            document_id = %document.id(),
            approved = verdict.is_approved(),
            "Review parsed"
        );
        Ok(verdict)
    }
}

/// Pull the JSON object out of a reply that may wrap it in a code fence or
/// surrounding prose.
fn extract_json(content: &str) -> &str {
    if let Some(start) = content.find("```json") {
        let body = &content[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let Some(start) = content.find("```") {
        let body = &content[start + 3..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            return &content[start..=end];
        }
    }

    content.trim()
}

fn field<'a>(object: &'a serde_json::Map<String, Value>, name: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Parse a reviewer reply into a verdict.
///
/// Keys match case-insensitively. A `null` reply, or one without
/// suggestions, is a pass.
pub fn parse_verdict(reply: &str) -> LlmResult<ReviewVerdict> {
    let value: Value = serde_json::from_str(extract_json(reply))
        .map_err(|e| LlmError::InvalidResponse(format!("review is not JSON: {}", e)))?;

    let object = match value {
        Value::Null => return Ok(ReviewVerdict::approved()),
        Value::Object(object) => object,
        other => {
            return Err(LlmError::InvalidResponse(format!(
                "expected a JSON object, got {}",
                other
            )))
        }
    };

    let explanation = match field(&object, "explanation") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let suggestions = match field(&object, "suggestions") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(LlmError::InvalidResponse(format!(
                "suggestions must be a list, got {}",
                other
            )))
        }
    };

    Ok(ReviewVerdict {
        explanation,
        suggestions,
    })
}
