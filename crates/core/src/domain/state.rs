use serde::{Deserialize, Serialize};

use super::document::Document;

/// Role in a context message
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
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single role-tagged entry in a step's context log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

impl ContextMessage {
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

/// Ordered conversational history handed to the content generator.
///
/// Appending returns a new log; an existing snapshot is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextLog(Vec<ContextMessage>);

impl ContextLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self(vec![ContextMessage::system(prompt)])
    }

    pub fn appended(&self, message: ContextMessage) -> Self {
        let mut messages = self.0.clone();
        messages.push(message);
        Self(messages)
    }

    pub fn messages(&self) -> &[ContextMessage] {
        &self.0
    }

    pub fn last(&self) -> Option<&ContextMessage> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ContextMessage>> for ContextLog {
    fn from(messages: Vec<ContextMessage>) -> Self {
        Self(messages)
    }
}

/// Per-step state that survives across dispatches within a run and, when a
/// state store is configured, across process restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    #[serde(default)]
    context_log: ContextLog,
    #[serde(default)]
    last_document: Option<Document>,
    #[serde(default)]
    revision_count: u32,
}

impl StepState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context_log(&self) -> &ContextLog {
        &self.context_log
    }

    pub fn set_context_log(&mut self, log: ContextLog) {
        self.context_log = log;
    }

    pub fn last_document(&self) -> Option<&Document> {
        self.last_document.as_ref()
    }

    pub fn set_last_document(&mut self, document: Document) {
        self.last_document = Some(document);
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    /// Count one more revision attempt and return the new total.
    ///
    /// The counter only moves forward; a fresh `StepState` is the only way
    /// back to zero.
    pub fn record_revision(&mut self) -> u32 {
        self.revision_count = self.revision_count.saturating_add(1);
        self.revision_count
    }
}
