//! Entry step: turn a product name into the source material document.

use std::collections::BTreeMap;

use async_trait::async_trait;
use docflow_core::{CoreError, Document, Payload, StepState};
use tracing::info;

use super::{DocEvent, GATHER_PRODUCT_INFO};
use crate::core::{Step, StepContext};
use crate::error::{OrchestratorError, Result};

const GLOWBREW_SHEET: &str = r#"Product Description:
GlowBrew is a revolutionary AI driven coffee machine with industry leading number of LEDs and programmable light shows. The machine is also capable of brewing coffee and has a built in grinder.

Product Features:
1. **Luminous Brew Technology**: Customize your morning ambiance with programmable LED lights that sync with your brewing process.
2. **AI Taste Assistant**: Learns your taste preferences over time and suggests new brew combinations to explore.
3. **Gourmet Aroma Diffusion**: Built-in aroma diffusers enhance your coffee's scent profile, energizing your senses before the first sip.

Troubleshooting:
- **Issue**: LED Lights Malfunctioning
    - **Solution**: Reset the lighting settings via the app. Ensure the LED connections inside the GlowBrew are secure. Perform a factory reset if necessary."#;

pub struct GatherProductInfoStep {
    /// Lower-cased product keyword -> internal product sheet
    sheets: BTreeMap<String, String>,
}

impl Default for GatherProductInfoStep {
    fn default() -> Self {
        Self::new()
    }
}

impl GatherProductInfoStep {
    pub const GATHER: &'static str = "gather_product_information";

    /// Step preloaded with the built-in product sheets.
    pub fn new() -> Self {
        Self::empty().with_sheet("glowbrew", GLOWBREW_SHEET)
    }

    pub fn empty() -> Self {
        Self {
            sheets: BTreeMap::new(),
        }
    }

    /// Register a product sheet. Seeds containing `keyword` (case-insensitive)
    /// use it.
    pub fn with_sheet(mut self, keyword: impl AsRef<str>, sheet: impl Into<String>) -> Self {
        self.sheets
            .insert(keyword.as_ref().to_lowercase(), sheet.into());
        self
    }

    /// Look up the sheet for a product name.
    pub fn sheet_for(&self, product: &str) -> Option<&str> {
        let needle = product.to_lowercase();
        self.sheets
            .iter()
            .find(|(keyword, _)| needle.contains(keyword.as_str()))
            .map(|(_, sheet)| sheet.as_str())
    }

    fn minimal_sheet(product: &str) -> String {
        format!(
            "Product Description:\n{} is a new product. No internal documentation is available yet.",
            product
        )
    }
}

#[async_trait]
impl Step<DocEvent> for GatherProductInfoStep {
    fn name(&self) -> &str {
        GATHER_PRODUCT_INFO
    }

    fn functions(&self) -> &[&'static str] {
        &[Self::GATHER]
    }

    fn emits(&self) -> &[DocEvent] {
        &[DocEvent::ProductInfoGathered]
    }

    async fn invoke(
        &self,
        function: &str,
        ctx: &mut StepContext<DocEvent>,
        _state: &mut StepState,
        payload: Payload,
    ) -> Result<()> {
        if function != Self::GATHER {
            return Err(OrchestratorError::unknown_function(GATHER_PRODUCT_INFO, function));
        }

        let product = payload.into_text()?;
        let product = product.trim();
        if product.is_empty() {
            return Err(CoreError::Validation("product name is empty".to_string()).into());
        }

        let content = match self.sheet_for(product) {
            Some(sheet) => sheet.to_string(),
            None => Self::minimal_sheet(product),
        };

        info!(run_id = %ctx.run_id(), product, "Gathering product information");
        ctx.emit(DocEvent::ProductInfoGathered, Document::new(product, content));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CancellationHandle, StepId};
    use uuid::Uuid;

    fn context() -> StepContext<DocEvent> {
        StepContext::new(
            Uuid::new_v4(),
            StepId::from(GATHER_PRODUCT_INFO),
            GatherProductInfoStep::GATHER,
            CancellationHandle::new().signal(),
        )
    }

    #[test]
    fn test_sheet_lookup_is_case_insensitive() {
        let step = GatherProductInfoStep::new();
        assert!(step.sheet_for("Contoso GlowBrew").is_some());
        assert!(step.sheet_for("GLOWBREW").is_some());
        assert!(step.sheet_for("Contoso Toaster").is_none());
    }

    #[tokio::test]
    async fn test_known_product_uses_sheet() {
        let step = GatherProductInfoStep::new();
        let mut ctx = context();
        let mut state = StepState::new();

        step.invoke(
            GatherProductInfoStep::GATHER,
            &mut ctx,
            &mut state,
            Payload::from("Contoso GlowBrew"),
        )
        .await
        .unwrap();

        let emitted = ctx.into_emissions();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].event, DocEvent::ProductInfoGathered);
        let doc = emitted[0].payload.as_document().unwrap();
        assert_eq!(doc.title(), "Contoso GlowBrew");
        assert!(doc.content().contains("Luminous Brew Technology"));
    }

    #[tokio::test]
    async fn test_unknown_product_gets_minimal_sheet() {
        let step = GatherProductInfoStep::empty().with_sheet("Toaster", "Makes toast.");
        let mut ctx = context();

        step.invoke(
            GatherProductInfoStep::GATHER,
            &mut ctx,
            &mut StepState::new(),
            Payload::from("Contoso Kettle"),
        )
        .await
        .unwrap();

        let doc = ctx.emitted()[0].payload.as_document().unwrap().clone();
        assert!(doc.content().contains("Contoso Kettle is a new product"));
    }

    #[tokio::test]
    async fn test_non_text_seed_rejected() {
        let step = GatherProductInfoStep::new();
        let err = step
            .invoke(
                GatherProductInfoStep::GATHER,
                &mut context(),
                &mut StepState::new(),
                Payload::Empty,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Payload(_)));
    }
}
