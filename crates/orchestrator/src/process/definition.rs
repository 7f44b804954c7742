//! Validated, immutable process definitions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{EventKind, Step, StepId};

use super::router::EventRouter;

/// Diagnostic for a routing cycle that nothing is known to bound.
///
/// A cycle is fine as long as some step on it caps the number of trips
/// (see [`Step::bounds_cycles`]). Otherwise a run may only end because the
/// runner's dispatch limit trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonTerminationWarning {
    /// Steps forming the cycle, sorted
    pub steps: Vec<StepId>,
}

impl fmt::Display for NonTerminationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(StepId::as_str).collect();
        write!(
            f,
            "routing cycle through [{}] has no step that bounds it",
            names.join(", ")
        )
    }
}

pub struct ProcessDefinition<E> {
    pub(crate) name: String,
    pub(crate) steps: HashMap<StepId, Arc<dyn Step<E>>>,
    pub(crate) step_order: Vec<StepId>,
    pub(crate) router: EventRouter<E>,
    pub(crate) entry_event: E,
    pub(crate) entry_step: StepId,
    pub(crate) output_step: Option<StepId>,
    pub(crate) warnings: Vec<NonTerminationWarning>,
}

impl<E: EventKind> ProcessDefinition<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self, id: &StepId) -> Option<&Arc<dyn Step<E>>> {
        self.steps.get(id)
    }

    /// Step names in registration order.
    pub fn step_ids(&self) -> &[StepId] {
        &self.step_order
    }

    pub fn router(&self) -> &EventRouter<E> {
        &self.router
    }

    pub fn entry_event(&self) -> E {
        self.entry_event
    }

    pub fn entry_step(&self) -> &StepId {
        &self.entry_step
    }

    /// Step whose received documents form the run's output.
    pub fn output_step(&self) -> Option<&StepId> {
        self.output_step.as_ref()
    }

    pub fn warnings(&self) -> &[NonTerminationWarning] {
        &self.warnings
    }
}

/// Find strongly connected groups of steps that form cycles and carry no
/// bounding step. Uses Tarjan's algorithm over the step-level routing graph.
pub(crate) fn unbounded_cycles<E: EventKind>(
    step_order: &[StepId],
    steps: &HashMap<StepId, Arc<dyn Step<E>>>,
    router: &EventRouter<E>,
) -> Vec<NonTerminationWarning> {
    let successors = router.successors();

    struct Tarjan<'a> {
        successors: &'a HashMap<&'a StepId, Vec<&'a StepId>>,
        index: usize,
        indices: HashMap<&'a StepId, usize>,
        lowlink: HashMap<&'a StepId, usize>,
        stack: Vec<&'a StepId>,
        on_stack: HashMap<&'a StepId, bool>,
        components: Vec<Vec<&'a StepId>>,
    }

    impl<'a> Tarjan<'a> {
        fn visit(&mut self, node: &'a StepId) {
            self.indices.insert(node, self.index);
            self.lowlink.insert(node, self.index);
            self.index += 1;
            self.stack.push(node);
            self.on_stack.insert(node, true);

            let next = self.successors.get(node).cloned().unwrap_or_default();
            for succ in next {
                if !self.indices.contains_key(succ) {
                    self.visit(succ);
                    let low = self.lowlink[succ].min(self.lowlink[node]);
                    self.lowlink.insert(node, low);
                } else if self.on_stack.get(succ).copied().unwrap_or(false) {
                    let low = self.indices[succ].min(self.lowlink[node]);
                    self.lowlink.insert(node, low);
                }
            }

            if self.lowlink[node] == self.indices[node] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.insert(member, false);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    let mut tarjan = Tarjan {
        successors: &successors,
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashMap::new(),
        components: Vec::new(),
    };

    for id in step_order {
        if !tarjan.indices.contains_key(id) {
            tarjan.visit(id);
        }
    }

    tarjan
        .components
        .into_iter()
        .filter(|component| {
            let is_cycle = component.len() > 1
                || successors
                    .get(component[0])
                    .map(|next| next.contains(&component[0]))
                    .unwrap_or(false);
            is_cycle
                && !component
                    .iter()
                    .any(|id| steps.get(*id).map(|s| s.bounds_cycles()).unwrap_or(false))
        })
        .map(|component| {
            let mut members: Vec<StepId> = component.into_iter().cloned().collect();
            members.sort();
            NonTerminationWarning { steps: members }
        })
        .collect()
}
