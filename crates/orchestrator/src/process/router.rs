//! Routing table from `(source step, event)` to handler targets.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::core::{EventKind, Step, StepId};
use crate::error::{OrchestratorError, Result};

/// A routing rule as declared on the process builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEdge<E> {
    pub source: StepId,
    pub event: E,
    pub target: StepId,
    /// Handler to invoke; `None` selects the target's default handler
    pub function: Option<String>,
}

/// A handler an event resolves to, with the default already filled in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedTarget {
    pub step: StepId,
    pub function: String,
}

impl std::fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.step, self.function)
    }
}

pub struct EventRouter<E> {
    routes: HashMap<StepId, HashMap<E, Vec<ResolvedTarget>>>,
    edge_count: usize,
}

impl<E: EventKind> EventRouter<E> {
    /// Build and validate the routing table.
    ///
    /// Rejects edges whose source or target step is unknown, whose event the
    /// source step does not declare, whose handler the target step does not
    /// expose, and edges that repeat an existing
    /// `(source, event, target handler)` combination.
    pub fn new(edges: &[RoutingEdge<E>], steps: &HashMap<StepId, Arc<dyn Step<E>>>) -> Result<Self> {
        let mut routes: HashMap<StepId, HashMap<E, Vec<ResolvedTarget>>> = HashMap::new();
        let mut seen: HashSet<(StepId, E, ResolvedTarget)> = HashSet::new();

        for edge in edges {
            let source = steps.get(&edge.source).ok_or_else(|| {
                OrchestratorError::configuration(format!(
                    "edge on {} references unknown source step {}",
                    edge.event, edge.source
                ))
            })?;

            if !source.emits().contains(&edge.event) {
                return Err(OrchestratorError::configuration(format!(
                    "step {} does not emit {}",
                    edge.source, edge.event
                )));
            }

            let target = steps.get(&edge.target).ok_or_else(|| {
                OrchestratorError::configuration(format!(
                    "edge {}.{} references unknown target step {}",
                    edge.source, edge.event, edge.target
                ))
            })?;

            let function = match &edge.function {
                Some(name) if target.has_function(name) => name.clone(),
                Some(name) => {
                    return Err(OrchestratorError::configuration(format!(
                        "step {} has no handler named {}",
                        edge.target, name
                    )))
                }
                None => target
                    .default_function()
                    .ok_or_else(|| {
                        OrchestratorError::configuration(format!(
                            "step {} exposes no handlers",
                            edge.target
                        ))
                    })?
                    .to_string(),
            };

            let resolved = ResolvedTarget {
                step: edge.target.clone(),
                function,
            };

            if !seen.insert((edge.source.clone(), edge.event, resolved.clone())) {
                return Err(OrchestratorError::configuration(format!(
                    "duplicate edge {}.{} -> {}",
                    edge.source, edge.event, resolved
                )));
            }

            debug!(
                source = %edge.source,
                event = %edge.event,
                target = %resolved,
                "Route registered"
            );

            routes
                .entry(edge.source.clone())
                .or_default()
                .entry(edge.event)
                .or_default()
                .push(resolved);
        }

        Ok(Self {
            routes,
            edge_count: edges.len(),
        })
    }

    /// Targets for an event emitted by `source`, in declaration order.
    ///
    /// An empty slice is not an error: that branch of the run simply ends.
    pub fn resolve(&self, source: &StepId, event: E) -> &[ResolvedTarget] {
        self.routes
            .get(source)
            .and_then(|by_event| by_event.get(&event))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Every `(source, event, target)` triple, sorted for stable output.
    pub fn routes(&self) -> Vec<(&StepId, E, &ResolvedTarget)> {
        let mut all: Vec<_> = self
            .routes
            .iter()
            .flat_map(|(source, by_event)| {
                by_event
                    .iter()
                    .flat_map(move |(event, targets)| targets.iter().map(move |t| (source, *event, t)))
            })
            .collect();
        all.sort_by(|a, b| {
            (a.0, a.1.to_string(), a.2.to_string()).cmp(&(b.0, b.1.to_string(), b.2.to_string()))
        });
        all
    }

    /// Step-level adjacency: which steps each step can hand work to.
    pub(crate) fn successors(&self) -> HashMap<&StepId, Vec<&StepId>> {
        self.routes
            .iter()
            .map(|(source, by_event)| {
                let mut next: Vec<&StepId> = by_event
                    .values()
                    .flat_map(|targets| targets.iter().map(|t| &t.step))
                    .collect();
                next.sort();
                next.dedup();
                (source, next)
            })
            .collect()
    }
}
