use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::{Payload, StepState};
use tracing::info;

use super::{DocEvent, FINAL_HUMAN_APPROVAL};
use crate::capabilities::ApprovalGate;
use crate::core::{Step, StepContext};
use crate::error::{OrchestratorError, Result};

/// Human checkpoint for drafts that exhausted their revisions.
///
/// A rejection ends the branch: nothing is emitted and nothing is published.
pub struct FinalHumanApprovalStep {
    gate: Arc<dyn ApprovalGate>,
}

impl FinalHumanApprovalStep {
    pub const FINAL_APPROVAL: &'static str = "final_approval";

    pub fn new(gate: Arc<dyn ApprovalGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Step<DocEvent> for FinalHumanApprovalStep {
    fn name(&self) -> &str {
        FINAL_HUMAN_APPROVAL
    }

    fn functions(&self) -> &[&'static str] {
        &[Self::FINAL_APPROVAL]
    }

    fn emits(&self) -> &[DocEvent] {
        &[DocEvent::DocumentationApproved]
    }

    async fn invoke(
        &self,
        function: &str,
        ctx: &mut StepContext<DocEvent>,
        _state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        if function != Self::FINAL_APPROVAL {
            return Err(OrchestratorError::unknown_function(FINAL_HUMAN_APPROVAL, function));
        }

        let document = payload.into_document()?;
        if self.gate.request_approval(&document).await? {
            info!(run_id = %ctx.run_id(), document_id = %document.id(), "Documentation approved by reviewer");
            ctx.emit(DocEvent::DocumentationApproved, document);
        } else {
            info!(run_id = %ctx.run_id(), document_id = %document.id(), "Documentation rejected by reviewer, not publishing");
        }
        Ok(())
    }
}
