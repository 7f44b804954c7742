//! Documentation cycle: gather product info, draft, proofread, revise,
//! escalate to a human once revisions run out, then publish.
//!
//! ```text
//! Start -> gather_product_info
//!   ProductInfoGathered    -> generate_documentation.generate_documentation
//!   DocumentationGenerated -> proofread
//!   DocumentationRejected  -> generate_documentation.apply_suggestions
//!   NeedsFinalApproval     -> final_human_approval
//!   DocumentationApproved  -> publish_documentation  (from proofread or approval)
//! ```

mod approval;
mod gather;
mod generate;
mod prompts;
mod proofread;
mod publish;
mod revision;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capabilities::{ApprovalGate, ContentGenerator, Publisher, Reviewer};
use crate::error::{OrchestratorError, Result};
use crate::process::{ProcessBuilder, ProcessDefinition, RouteTarget};

pub use approval::FinalHumanApprovalStep;
pub use gather::GatherProductInfoStep;
pub use generate::GenerateDocumentationStep;
pub use prompts::DocumentationPrompts;
pub use proofread::ProofreadStep;
pub use publish::PublishDocumentationStep;
pub use revision::{RevisionDecision, RevisionPolicy, MAX_REVISIONS};

pub const PROCESS_NAME: &str = "DocumentationCycle";

pub const GATHER_PRODUCT_INFO: &str = "gather_product_info";
pub const GENERATE_DOCUMENTATION: &str = "generate_documentation";
pub const PROOFREAD: &str = "proofread";
pub const FINAL_HUMAN_APPROVAL: &str = "final_human_approval";
pub const PUBLISH_DOCUMENTATION: &str = "publish_documentation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocEvent {
    Start,
    ProductInfoGathered,
    DocumentationGenerated,
    DocumentationRejected,
    DocumentationApproved,
    NeedsFinalApproval,
}

impl DocEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::ProductInfoGathered => "ProductInfoGathered",
            Self::DocumentationGenerated => "DocumentationGenerated",
            Self::DocumentationRejected => "DocumentationRejected",
            Self::DocumentationApproved => "DocumentationApproved",
            Self::NeedsFinalApproval => "NeedsFinalApproval",
        }
    }
}

impl fmt::Display for DocEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators the documentation steps call.
#[derive(Clone)]
pub struct DocumentationCapabilities {
    pub generator: Arc<dyn ContentGenerator>,
    pub reviewer: Arc<dyn Reviewer>,
    pub approval: Arc<dyn ApprovalGate>,
    pub publisher: Arc<dyn Publisher>,
}

#[derive(Debug, Clone)]
pub struct DocumentationConfig {
    pub max_revisions: u32,
    pub system_prompt: String,
}

impl Default for DocumentationConfig {
    fn default() -> Self {
        Self {
            max_revisions: MAX_REVISIONS,
            system_prompt: DocumentationPrompts::generator_system().to_string(),
        }
    }
}

impl DocumentationConfig {
    pub fn with_max_revisions(mut self, max_revisions: u32) -> Self {
        self.max_revisions = max_revisions;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// Build the documentation cycle. The publish step is the run output.
pub fn documentation_process(
    capabilities: DocumentationCapabilities,
    config: DocumentationConfig,
) -> Result<ProcessDefinition<DocEvent>> {
    if config.max_revisions == 0 {
        return Err(OrchestratorError::configuration(
            "max_revisions must be at least 1",
        ));
    }

    let mut builder = ProcessBuilder::new(PROCESS_NAME);

    let gather = builder.add_step(GatherProductInfoStep::new());
    let generate = builder.add_step(
        GenerateDocumentationStep::new(
            capabilities.generator,
            RevisionPolicy::new(config.max_revisions),
        )
        .with_system_prompt(config.system_prompt),
    );
    let proofread = builder.add_step(ProofreadStep::new(capabilities.reviewer));
    let approval = builder.add_step(FinalHumanApprovalStep::new(capabilities.approval));
    let publish = builder.add_step(PublishDocumentationStep::new(capabilities.publisher));

    builder.on_input_event(DocEvent::Start).send_to(&gather);

    builder
        .on_event(&gather, DocEvent::ProductInfoGathered)
        .send_to(RouteTarget::step(&generate).function(GenerateDocumentationStep::GENERATE));
    builder
        .on_event(&generate, DocEvent::DocumentationGenerated)
        .send_to(&proofread);
    builder
        .on_event(&generate, DocEvent::NeedsFinalApproval)
        .send_to(&approval);
    builder
        .on_event(&proofread, DocEvent::DocumentationRejected)
        .send_to(RouteTarget::step(&generate).function(GenerateDocumentationStep::APPLY_SUGGESTIONS));
    builder
        .on_event(&proofread, DocEvent::DocumentationApproved)
        .send_to(&publish);
    builder
        .on_event(&approval, DocEvent::DocumentationApproved)
        .send_to(&publish);

    builder.output_step(&publish);
    builder.build()
}
