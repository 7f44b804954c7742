//! Drafting step: first draft from product info, then revisions from
//! proofreading feedback until the revision policy escalates.

use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::{ContextLog, ContextMessage, Document, Payload, StepState};
use tracing::{debug, info, warn};

use super::prompts::DocumentationPrompts;
use super::revision::{RevisionDecision, RevisionPolicy};
use super::{DocEvent, GENERATE_DOCUMENTATION};
use crate::capabilities::ContentGenerator;
use crate::core::{Step, StepContext};
use crate::error::{OrchestratorError, Result};

pub struct GenerateDocumentationStep {
    generator: Arc<dyn ContentGenerator>,
    policy: RevisionPolicy,
    system_prompt: String,
}

impl GenerateDocumentationStep {
    pub const GENERATE: &'static str = "generate_documentation";
    pub const APPLY_SUGGESTIONS: &'static str = "apply_suggestions";

    pub fn new(generator: Arc<dyn ContentGenerator>, policy: RevisionPolicy) -> Self {
        Self {
            generator,
            policy,
            system_prompt: DocumentationPrompts::generator_system().to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn policy(&self) -> RevisionPolicy {
        self.policy
    }

    /// Ask the generator for a draft and record the exchange in the context log.
    async fn draft(&self, state: &mut StepState, title: &str, request: String) -> Result<Document> {
        let log = state.context_log().appended(ContextMessage::user(request));
        let document = self.generator.generate(title, &log).await?;

        state.set_context_log(log.appended(ContextMessage::assistant(document.content())));
        state.set_last_document(document.clone());
        Ok(document)
    }

    async fn generate_documentation(
        &self,
        ctx: &mut StepContext<DocEvent>,
        state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        let product = payload.into_document()?;
        info!(
            run_id = %ctx.run_id(),
            product = %product.title(),
            "Generating documentation"
        );

        let title = format!("Generated document - {}", product.title());
        let document = self
            .draft(state, &title, DocumentationPrompts::product_info(&product))
            .await?;

        ctx.emit(DocEvent::DocumentationGenerated, document);
        Ok(())
    }

    async fn apply_suggestions(
        &self,
        ctx: &mut StepContext<DocEvent>,
        state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        let verdict = payload.into_verdict()?;
        if verdict.is_approved() {
            warn!(run_id = %ctx.run_id(), "Received a verdict without suggestions, nothing to revise");
            return Ok(());
        }

        let previous = state
            .last_document()
            .cloned()
            .ok_or_else(|| OrchestratorError::generation("no draft to revise"))?;

        let revision_count = state.record_revision();
        info!(
            run_id = %ctx.run_id(),
            revision_count,
            suggestions = verdict.suggestions.len(),
            "Applying proofreading suggestions"
        );

        let request = DocumentationPrompts::revision_request(&previous, &verdict);
        let document = self.draft(state, previous.title(), request).await?;

        match self.policy.decide(revision_count) {
            RevisionDecision::Escalate => {
                warn!(
                    run_id = %ctx.run_id(),
                    revision_count,
                    max_revisions = self.policy.max_revisions(),
                    "Revisions exhausted, requesting final approval"
                );
                ctx.emit(DocEvent::NeedsFinalApproval, document);
            }
            RevisionDecision::Resubmit => {
                debug!(run_id = %ctx.run_id(), revision_count, "Resubmitting revised draft");
                ctx.emit(DocEvent::DocumentationGenerated, document);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Step<DocEvent> for GenerateDocumentationStep {
    fn name(&self) -> &str {
        GENERATE_DOCUMENTATION
    }

    fn functions(&self) -> &[&'static str] {
        &[Self::GENERATE, Self::APPLY_SUGGESTIONS]
    }

    fn emits(&self) -> &[DocEvent] {
        &[DocEvent::DocumentationGenerated, DocEvent::NeedsFinalApproval]
    }

    /// The revision counter caps trips around the proofreading loop.
    fn bounds_cycles(&self) -> bool {
        true
    }

    async fn activate(&self, state: &mut StepState) -> Result<()> {
        if state.context_log().is_empty() {
            state.set_context_log(ContextLog::with_system(self.system_prompt.clone()));
        }
        Ok(())
    }

    async fn invoke(
        &self,
        function: &str,
        ctx: &mut StepContext<DocEvent>,
        state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        match function {
            Self::GENERATE => self.generate_documentation(ctx, state, payload).await,
            Self::APPLY_SUGGESTIONS => self.apply_suggestions(ctx, state, payload).await,
            other => Err(OrchestratorError::unknown_function(GENERATE_DOCUMENTATION, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationHandle, StepId};
    use docflow_core::{ReviewVerdict, Role};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Returns "draft N" for the N-th call.
    #[derive(Default)]
    struct NumberedGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentGenerator for NumberedGenerator {
        async fn generate(&self, title: &str, _context: &ContextLog) -> Result<Document> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Document::new(title, format!("draft {}", n)))
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl ContentGenerator for BrokenGenerator {
        async fn generate(&self, _title: &str, _context: &ContextLog) -> Result<Document> {
            Err(OrchestratorError::generation("model unavailable"))
        }
    }

    fn context() -> StepContext<DocEvent> {
        StepContext::new(
            Uuid::new_v4(),
            StepId::from(GENERATE_DOCUMENTATION),
            GenerateDocumentationStep::GENERATE,
            CancellationHandle::new().signal(),
        )
    }

    fn rejection() -> Payload {
        ReviewVerdict::rejected("Needs work", vec!["Be more formal".to_string()]).into()
    }

    async fn activated(step: &GenerateDocumentationStep) -> StepState {
        let mut state = StepState::new();
        step.activate(&mut state).await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_activate_seeds_system_prompt_once() {
        let step = GenerateDocumentationStep::new(Arc::new(NumberedGenerator::default()), RevisionPolicy::default())
            .with_system_prompt("be helpful");
        let mut state = activated(&step).await;
        assert_eq!(state.context_log().len(), 1);
        assert_eq!(state.context_log().messages()[0].role, Role::System);

        step.activate(&mut state).await.unwrap();
        assert_eq!(state.context_log().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_records_draft() {
        let step = GenerateDocumentationStep::new(Arc::new(NumberedGenerator::default()), RevisionPolicy::default());
        let mut state = activated(&step).await;
        let mut ctx = context();

        step.invoke(
            GenerateDocumentationStep::GENERATE,
            &mut ctx,
            &mut state,
            Document::new("Contoso GlowBrew", "sheet").into(),
        )
        .await
        .unwrap();

        let emitted = ctx.into_emissions();
        assert_eq!(emitted[0].event, DocEvent::DocumentationGenerated);
        let doc = emitted[0].payload.as_document().unwrap();
        assert_eq!(doc.title(), "Generated document - Contoso GlowBrew");
        assert_eq!(state.last_document(), Some(doc));

        // system, product info, draft
        let log = state.context_log();
        assert_eq!(log.len(), 3);
        assert!(log.messages()[1].content.starts_with("Product Info:\nContoso GlowBrew - "));
        assert_eq!(log.messages()[2].role, Role::Assistant);
        assert_eq!(state.revision_count(), 0);
    }

    #[tokio::test]
    async fn test_revisions_escalate_at_threshold() {
        let step = GenerateDocumentationStep::new(Arc::new(NumberedGenerator::default()), RevisionPolicy::new(3));
        let mut state = activated(&step).await;
        step.invoke(
            GenerateDocumentationStep::GENERATE,
            &mut context(),
            &mut state,
            Document::new("GlowBrew", "sheet").into(),
        )
        .await
        .unwrap();

        let mut events = Vec::new();
        for expected in 1..=3 {
            let mut ctx = context();
            step.invoke(GenerateDocumentationStep::APPLY_SUGGESTIONS, &mut ctx, &mut state, rejection())
                .await
                .unwrap();
            assert_eq!(state.revision_count(), expected);
            events.push(ctx.into_emissions()[0].event);
        }

        assert_eq!(
            events,
            vec![
                DocEvent::DocumentationGenerated,
                DocEvent::DocumentationGenerated,
                DocEvent::NeedsFinalApproval
            ]
        );
        assert_eq!(state.last_document().unwrap().content(), "draft 4");
    }

    #[tokio::test]
    async fn test_approved_verdict_is_ignored() {
        let step = GenerateDocumentationStep::new(Arc::new(NumberedGenerator::default()), RevisionPolicy::default());
        let mut state = activated(&step).await;
        let mut ctx = context();

        step.invoke(
            GenerateDocumentationStep::APPLY_SUGGESTIONS,
            &mut ctx,
            &mut state,
            ReviewVerdict::approved().into(),
        )
        .await
        .unwrap();

        assert!(ctx.emitted().is_empty());
        assert_eq!(state.revision_count(), 0);
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let step = GenerateDocumentationStep::new(Arc::new(BrokenGenerator), RevisionPolicy::default());
        let mut state = activated(&step).await;
        let mut ctx = context();

        let err = step
            .invoke(
                GenerateDocumentationStep::GENERATE,
                &mut ctx,
                &mut state,
                Document::new("GlowBrew", "sheet").into(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Generation(_)));
        assert!(ctx.emitted().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_function_rejected() {
        let step = GenerateDocumentationStep::new(Arc::new(NumberedGenerator::default()), RevisionPolicy::default());
        let err = step
            .invoke("summarize", &mut context(), &mut StepState::new(), Payload::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownFunction { .. }));
    }
}
