use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A versioned unit of content passed between steps.
///
/// A document never changes after construction. Revising content produces a
/// new `Document` with a fresh id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    id: Uuid,
    title: String,
    content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Rebuild a document with a known id, e.g. when loading persisted state.
    pub fn from_parts(id: Uuid, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
        }
    }

    /// Create the next version of this document with new content.
    pub fn revise(&self, content: impl Into<String>) -> Self {
        Self::new(self.title.clone(), content)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}
