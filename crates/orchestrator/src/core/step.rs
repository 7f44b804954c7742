//! Step trait and identifiers.

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;
use docflow_core::{Payload, StepState};
use serde::{Deserialize, Serialize};

use super::context::StepContext;
use crate::error::Result;

/// A closed set of event names a process routes on.
///
/// Processes declare their events as a plain enum; every `Copy` enum with
/// `Display` qualifies. Routing on a closed type means an unknown event name
/// is a compile error, and edges for events a step never emits are rejected
/// when the process is built.
pub trait EventKind: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> EventKind for T where T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Name a step is registered and routed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Step names double as file names in durable state stores.
    pub(crate) fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<&StepId> for StepId {
    fn from(id: &StepId) -> Self {
        id.clone()
    }
}

impl From<String> for StepId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A named unit of work in a process.
///
/// A step exposes one or more handler functions. The first entry of
/// [`functions`](Step::functions) is the default handler, used by routing
/// edges that do not name a function. Collaborators a step needs are injected
/// when the step is constructed; the runner only hands it its own state and a
/// [`StepContext`] to emit through.
#[async_trait]
pub trait Step<E: EventKind>: Send + Sync {
    /// Registration name, unique within a process.
    fn name(&self) -> &str;

    /// Handler functions; the first one is the default.
    fn functions(&self) -> &[&'static str];

    /// Every event this step may emit.
    fn emits(&self) -> &[E];

    /// Whether this step guarantees an exit from any routing cycle it sits on,
    /// e.g. by counting attempts and escalating past a threshold.
    fn bounds_cycles(&self) -> bool {
        false
    }

    /// Called once per run when the step is first dispatched into, after any
    /// persisted state has been loaded.
    async fn activate(&self, _state: &mut StepState) -> Result<()> {
        Ok(())
    }

    /// Run one handler.
    ///
    /// `state` is a private working copy: it replaces the committed state, and
    /// the events emitted through `ctx` are routed, only if this returns `Ok`.
    async fn invoke(
        &self,
        function: &str,
        ctx: &mut StepContext<E>,
        state: &mut StepState,
        payload: Payload,
    ) -> Result<()>;

    fn default_function(&self) -> Option<&'static str> {
        self.functions().first().copied()
    }

    fn has_function(&self, function: &str) -> bool {
        self.functions().iter().any(|f| *f == function)
    }
}
