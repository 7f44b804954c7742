//! Fluent construction of process definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{EventKind, Step, StepId};
use crate::error::{OrchestratorError, Result};

use super::definition::{unbounded_cycles, ProcessDefinition};
use super::router::{EventRouter, RoutingEdge};

/// Where an edge delivers its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    step: StepId,
    function: Option<String>,
}

impl RouteTarget {
    /// Deliver to the step's default handler.
    pub fn step(step: impl Into<StepId>) -> Self {
        Self {
            step: step.into(),
            function: None,
        }
    }

    /// Deliver to a specific handler of the step.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

impl From<&StepId> for RouteTarget {
    fn from(step: &StepId) -> Self {
        Self::step(step.clone())
    }
}

/// Collects steps and edges, then validates them into a [`ProcessDefinition`].
///
/// ```ignore
/// let mut builder = ProcessBuilder::new("DocumentationCycle");
/// let gather = builder.add_step(GatherProductInfoStep::new());
/// let generate = builder.add_step(GenerateDocumentationStep::new(generator, policy));
/// builder.on_input_event(DocEvent::Start).send_to(&gather);
/// builder
///     .on_event(&gather, DocEvent::ProductInfoGathered)
///     .send_to(RouteTarget::step(&generate).function("generate_documentation"));
/// let process = builder.build()?;
/// ```
pub struct ProcessBuilder<E> {
    name: String,
    steps: Vec<Arc<dyn Step<E>>>,
    edges: Vec<RoutingEdge<E>>,
    entry: Option<(E, StepId)>,
    output_step: Option<StepId>,
}

impl<E: EventKind> ProcessBuilder<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            edges: Vec::new(),
            entry: None,
            output_step: None,
        }
    }

    /// Register a step and return the id edges refer to it by.
    pub fn add_step<S: Step<E> + 'static>(&mut self, step: S) -> StepId {
        self.add_shared_step(Arc::new(step))
    }

    pub fn add_shared_step(&mut self, step: Arc<dyn Step<E>>) -> StepId {
        let id = StepId::new(step.name());
        self.steps.push(step);
        id
    }

    /// Bind the process input event to the step that receives the seed.
    pub fn on_input_event(&mut self, event: E) -> EntryBinding<'_, E> {
        EntryBinding {
            builder: self,
            event,
        }
    }

    /// Start an edge (or fan-out of edges) from `source` on `event`.
    pub fn on_event(&mut self, source: &StepId, event: E) -> EdgeBinding<'_, E> {
        EdgeBinding {
            builder: self,
            source: source.clone(),
            event,
        }
    }

    /// Designate the step whose received documents are the run output.
    pub fn output_step(&mut self, step: &StepId) -> &mut Self {
        self.output_step = Some(step.clone());
        self
    }

    pub fn build(self) -> Result<ProcessDefinition<E>> {
        let mut steps: HashMap<StepId, Arc<dyn Step<E>>> = HashMap::new();
        let mut step_order = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            let id = StepId::new(step.name());
            if !id.is_valid() {
                return Err(OrchestratorError::configuration(format!(
                    "invalid step name {:?}: use letters, digits, '_' or '-'",
                    id.as_str()
                )));
            }
            if step.functions().is_empty() {
                return Err(OrchestratorError::configuration(format!(
                    "step {} exposes no handlers",
                    id
                )));
            }
            if steps.insert(id.clone(), step).is_some() {
                return Err(OrchestratorError::configuration(format!(
                    "step {} registered twice",
                    id
                )));
            }
            step_order.push(id);
        }

        let (entry_event, entry_step) = self.entry.ok_or_else(|| {
            OrchestratorError::configuration(format!("process {} has no input event", self.name))
        })?;
        if !steps.contains_key(&entry_step) {
            return Err(OrchestratorError::configuration(format!(
                "input event {} targets unknown step {}",
                entry_event, entry_step
            )));
        }

        if let Some(output) = &self.output_step {
            if !steps.contains_key(output) {
                return Err(OrchestratorError::configuration(format!(
                    "output step {} is not registered",
                    output
                )));
            }
        }

        let router = EventRouter::new(&self.edges, &steps)?;
        let warnings = unbounded_cycles(&step_order, &steps, &router);
        for warning in &warnings {
            warn!(process = %self.name, "{}", warning);
        }

        info!(
            process = %self.name,
            steps = step_order.len(),
            edges = router.edge_count(),
            entry_event = %entry_event,
            "Process definition built"
        );

        Ok(ProcessDefinition {
            name: self.name,
            steps,
            step_order,
            router,
            entry_event,
            entry_step,
            output_step: self.output_step,
            warnings,
        })
    }
}

pub struct EntryBinding<'a, E> {
    builder: &'a mut ProcessBuilder<E>,
    event: E,
}

impl<'a, E: EventKind> EntryBinding<'a, E> {
    pub fn send_to(self, step: &StepId) {
        self.builder.entry = Some((self.event, step.clone()));
    }
}

pub struct EdgeBinding<'a, E> {
    builder: &'a mut ProcessBuilder<E>,
    source: StepId,
    event: E,
}

impl<'a, E: EventKind> EdgeBinding<'a, E> {
    /// Add a target; chain calls to fan the event out to several handlers.
    pub fn send_to(self, target: impl Into<RouteTarget>) -> Self {
        let target = target.into();
        self.builder.edges.push(RoutingEdge {
            source: self.source.clone(),
            event: self.event,
            target: target.step,
            function: target.function,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepContext;
    use async_trait::async_trait;
    use docflow_core::{Payload, StepState};

    struct Node {
        name: &'static str,
        emits: &'static [&'static str],
        bounded: bool,
    }

    impl Node {
        fn new(name: &'static str, emits: &'static [&'static str]) -> Self {
            Self {
                name,
                emits,
                bounded: false,
            }
        }
    }

    #[async_trait]
    impl Step<&'static str> for Node {
        fn name(&self) -> &str {
            self.name
        }

        fn functions(&self) -> &[&'static str] {
            &["run"]
        }

        fn emits(&self) -> &[&'static str] {
            self.emits
        }

        fn bounds_cycles(&self) -> bool {
            self.bounded
        }

        async fn invoke(
            &self,
            _function: &str,
            _ctx: &mut StepContext<&'static str>,
            _state: &mut StepState,
            _payload: Payload,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_build_minimal_process() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node::new("a", &["done"]));
        let b = builder.add_step(Node::new("b", &[]));
        builder.on_input_event("start").send_to(&a);
        builder.on_event(&a, "done").send_to(&b);
        builder.output_step(&b);

        let process = builder.build().unwrap();
        assert_eq!(process.name(), "p");
        assert_eq!(process.entry_step(), &a);
        assert_eq!(process.entry_event(), "start");
        assert_eq!(process.output_step(), Some(&b));
        assert_eq!(process.step_ids(), &[a, b]);
        assert!(process.warnings().is_empty());
    }

    #[test]
    fn test_missing_entry_rejected() {
        let mut builder: ProcessBuilder<&'static str> = ProcessBuilder::new("p");
        builder.add_step(Node::new("a", &[]));
        let err = builder.build().err().unwrap();
        assert!(err.to_string().contains("no input event"));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node::new("a", &[]));
        builder.add_step(Node::new("a", &[]));
        builder.on_input_event("start").send_to(&a);
        let err = builder.build().err().unwrap();
        assert!(err.to_string().contains("registered twice"));
    }

    #[test]
    fn test_invalid_step_name_rejected() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node::new("a/b", &[]));
        builder.on_input_event("start").send_to(&a);
        assert!(matches!(
            builder.build(),
            Err(OrchestratorError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_output_step_rejected() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node::new("a", &[]));
        builder.on_input_event("start").send_to(&a);
        builder.output_step(&StepId::from("publish"));
        let err = builder.build().err().unwrap();
        assert!(err.to_string().contains("output step publish"));
    }

    #[test]
    fn test_unbounded_cycle_warns() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node::new("a", &["ping"]));
        let b = builder.add_step(Node::new("b", &["pong"]));
        builder.on_input_event("start").send_to(&a);
        builder.on_event(&a, "ping").send_to(&b);
        builder.on_event(&b, "pong").send_to(&a);

        let process = builder.build().unwrap();
        assert_eq!(process.warnings().len(), 1);
        assert_eq!(process.warnings()[0].steps, vec![a, b]);
    }

    #[test]
    fn test_bounded_cycle_is_silent() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node {
            name: "a",
            emits: &["ping"],
            bounded: true,
        });
        let b = builder.add_step(Node::new("b", &["pong"]));
        builder.on_input_event("start").send_to(&a);
        builder.on_event(&a, "ping").send_to(&b);
        builder.on_event(&b, "pong").send_to(&a);

        assert!(builder.build().unwrap().warnings().is_empty());
    }

    #[test]
    fn test_self_loop_warns() {
        let mut builder = ProcessBuilder::new("p");
        let a = builder.add_step(Node::new("a", &["again"]));
        builder.on_input_event("start").send_to(&a);
        builder.on_event(&a, "again").send_to(&a);

        let process = builder.build().unwrap();
        assert_eq!(process.warnings()[0].steps, vec![a]);
    }
}
