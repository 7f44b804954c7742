use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::{Payload, StepState};
use tracing::info;

use super::{DocEvent, PROOFREAD};
use crate::capabilities::Reviewer;
use crate::core::{Step, StepContext};
use crate::error::{OrchestratorError, Result};

/// Sends each draft to the reviewer and routes on the verdict.
pub struct ProofreadStep {
    reviewer: Arc<dyn Reviewer>,
}

impl ProofreadStep {
    pub const PROOFREAD: &'static str = "proofread_documentation";

    pub fn new(reviewer: Arc<dyn Reviewer>) -> Self {
        Self { reviewer }
    }
}

#[async_trait]
impl Step<DocEvent> for ProofreadStep {
    fn name(&self) -> &str {
        PROOFREAD
    }

    fn functions(&self) -> &[&'static str] {
        &[Self::PROOFREAD]
    }

    fn emits(&self) -> &[DocEvent] {
        &[DocEvent::DocumentationApproved, DocEvent::DocumentationRejected]
    }

    async fn invoke(
        &self,
        function: &str,
        ctx: &mut StepContext<DocEvent>,
        _state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        if function != Self::PROOFREAD {
            return Err(OrchestratorError::unknown_function(PROOFREAD, function));
        }

        let document = payload.into_document()?;
        let verdict = self.reviewer.review(&document).await?;

        if verdict.is_approved() {
            info!(run_id = %ctx.run_id(), document_id = %document.id(), "Documentation passed proofreading");
            ctx.emit(DocEvent::DocumentationApproved, document);
        } else {
            info!(
                run_id = %ctx.run_id(),
                document_id = %document.id(),
                explanation = %verdict.explanation,
                suggestions = verdict.suggestions.len(),
                "Documentation failed proofreading"
            );
            ctx.emit(DocEvent::DocumentationRejected, verdict);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationHandle, StepId};
    use docflow_core::{Document, ReviewVerdict};
    use uuid::Uuid;

    struct FixedReviewer(ReviewVerdict);

    #[async_trait]
    impl Reviewer for FixedReviewer {
        async fn review(&self, _document: &Document) -> Result<ReviewVerdict> {
            Ok(self.0.clone())
        }
    }

    async fn proofread(verdict: ReviewVerdict) -> Vec<crate::core::Emission<DocEvent>> {
        let step = ProofreadStep::new(Arc::new(FixedReviewer(verdict)));
        let mut ctx = StepContext::new(
            Uuid::new_v4(),
            StepId::from(PROOFREAD),
            ProofreadStep::PROOFREAD,
            CancellationHandle::new().signal(),
        );
        step.invoke(
            ProofreadStep::PROOFREAD,
            &mut ctx,
            &mut StepState::new(),
            Document::new("t", "draft").into(),
        )
        .await
        .unwrap();
        ctx.into_emissions()
    }

    #[tokio::test]
    async fn test_pass_forwards_document() {
        let emitted = proofread(ReviewVerdict::approved()).await;
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].event, DocEvent::DocumentationApproved);
        assert_eq!(emitted[0].payload.as_document().unwrap().content(), "draft");
    }

    #[tokio::test]
    async fn test_rejection_forwards_verdict() {
        let verdict = ReviewVerdict::rejected("Typos", vec!["Fix spelling".to_string()]);
        let emitted = proofread(verdict.clone()).await;
        assert_eq!(emitted[0].event, DocEvent::DocumentationRejected);
        assert_eq!(emitted[0].payload, Payload::Verdict(verdict));
    }
}
