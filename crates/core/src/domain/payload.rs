use serde::{Deserialize, Serialize};

use super::document::Document;
use super::verdict::ReviewVerdict;
use crate::error::{CoreError, CoreResult};

/// Typed data carried by an emitted event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Free text, e.g. the seed product name
    Text(String),
    Document(Document),
    Verdict(ReviewVerdict),
    /// Signal-only events
    Empty,
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Document(_) => "document",
            Self::Verdict(_) => "verdict",
            Self::Empty => "empty",
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_text(self) -> CoreResult<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_document(self) -> CoreResult<Document> {
        match self {
            Self::Document(doc) => Ok(doc),
            other => Err(other.mismatch("document")),
        }
    }

    pub fn into_verdict(self) -> CoreResult<ReviewVerdict> {
        match self {
            Self::Verdict(verdict) => Ok(verdict),
            other => Err(other.mismatch("verdict")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> CoreError {
        CoreError::PayloadMismatch {
            expected,
            actual: self.kind(),
        }
    }
}

impl From<Document> for Payload {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<ReviewVerdict> for Payload {
    fn from(verdict: ReviewVerdict) -> Self {
        Self::Verdict(verdict)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_document() {
        let doc = Document::new("t", "c");
        let payload = Payload::from(doc.clone());
        assert_eq!(payload.as_document(), Some(&doc));
        assert_eq!(payload.into_document().unwrap(), doc);
    }

    #[test]
    fn test_mismatch_reports_both_kinds() {
        let err = Payload::from("GlowBrew").into_verdict().unwrap_err();
        assert_eq!(
            err,
            CoreError::PayloadMismatch {
                expected: "verdict",
                actual: "text"
            }
        );
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(Payload::from("GlowBrew")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["data"], "GlowBrew");
    }
}
