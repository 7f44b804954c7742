use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::{Payload, StepState};
use tracing::info;

use super::{DocEvent, PUBLISH_DOCUMENTATION};
use crate::capabilities::Publisher;
use crate::core::{Step, StepContext};
use crate::error::{OrchestratorError, Result};

/// Terminal step; hands approved documents to the publisher.
pub struct PublishDocumentationStep {
    publisher: Arc<dyn Publisher>,
}

impl PublishDocumentationStep {
    pub const PUBLISH: &'static str = "publish_documentation";

    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Step<DocEvent> for PublishDocumentationStep {
    fn name(&self) -> &str {
        PUBLISH_DOCUMENTATION
    }

    fn functions(&self) -> &[&'static str] {
        &[Self::PUBLISH]
    }

    fn emits(&self) -> &[DocEvent] {
        &[]
    }

    async fn invoke(
        &self,
        function: &str,
        ctx: &mut StepContext<DocEvent>,
        _state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        if function != Self::PUBLISH {
            return Err(OrchestratorError::unknown_function(PUBLISH_DOCUMENTATION, function));
        }

        let document = payload.into_document()?;
        self.publisher.publish(&document).await?;
        info!(
            run_id = %ctx.run_id(),
            document_id = %document.id(),
            title = %document.title(),
            "Documentation published"
        );
        Ok(())
    }
}
