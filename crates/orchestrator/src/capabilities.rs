//! Collaborator interfaces the documentation steps call out to.
//!
//! Each step is constructed with handles to exactly the collaborators it
//! uses. Implementations map their own failures onto the matching
//! [`OrchestratorError`](crate::OrchestratorError) variant so the runner can
//! record them against the invocation.

use async_trait::async_trait;
use docflow_core::{ContextLog, Document, ReviewVerdict};
use tracing::info;

use crate::error::Result;

/// Produces document content from accumulated context.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate a new document titled `title` from the context log.
    async fn generate(&self, title: &str, context: &ContextLog) -> Result<Document>;
}

/// Proofreads a document.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, document: &Document) -> Result<ReviewVerdict>;
}

/// Yes/no human checkpoint.
///
/// Implementations may block on console input or wait on an external
/// callback; the runner keeps other branches moving while this resolves.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, document: &Document) -> Result<bool>;
}

/// Sink for approved documents.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, document: &Document) -> Result<()>;
}

/// Approval gate with a preset answer, for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedApproval(pub bool);

#[async_trait]
impl ApprovalGate for FixedApproval {
    async fn request_approval(&self, document: &Document) -> Result<bool> {
        info!(
            document_id = %document.id(),
            approved = self.0,
            "Approval decided without a reviewer"
        );
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_approval() {
        let doc = Document::new("t", "c");
        assert!(FixedApproval(true).request_approval(&doc).await.unwrap());
        assert!(!FixedApproval(false).request_approval(&doc).await.unwrap());
    }
}
