//! Per-invocation context handed to step handlers.

use docflow_core::Payload;
use uuid::Uuid;

use super::cancel::CancelSignal;
use super::step::{EventKind, StepId};

/// An event a handler asked to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission<E> {
    pub event: E,
    pub payload: Payload,
}

/// What a handler sees of the run it executes in.
///
/// Emitted events are buffered here and only reach the router after the
/// handler returns successfully.
#[derive(Debug)]
pub struct StepContext<E> {
    run_id: Uuid,
    step: StepId,
    function: String,
    emitted: Vec<Emission<E>>,
    cancel: CancelSignal,
}

impl<E: EventKind> StepContext<E> {
    pub fn new(run_id: Uuid, step: StepId, function: impl Into<String>, cancel: CancelSignal) -> Self {
        Self {
            run_id,
            step,
            function: function.into(),
            emitted: Vec::new(),
            cancel,
        }
    }

    pub fn emit(&mut self, event: E, payload: impl Into<Payload>) {
        tracing::debug!(
            run_id = %self.run_id,
            step = %self.step,
            event = %event,
            "Event emitted"
        );
        self.emitted.push(Emission {
            event,
            payload: payload.into(),
        });
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn step(&self) -> &StepId {
        &self.step
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Handlers may poll this between collaborator calls to stop early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn emitted(&self) -> &[Emission<E>] {
        &self.emitted
    }

    pub fn into_emissions(self) -> Vec<Emission<E>> {
        self.emitted
    }
}
