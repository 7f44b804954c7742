//! Event-driven step orchestration.
//!
//! A process is a graph of named [`Step`]s connected by routing edges keyed on
//! `(source step, event)`. The [`ProcessRunner`] injects an entry event, then
//! drains a FIFO queue of emitted events, resolving each through the
//! [`EventRouter`] and invoking the matching handlers. Each step owns a
//! [`StepState`](docflow_core::StepState) that persists across its
//! invocations within a run.
//!
//! The [`documentation`] module wires the engine into a generate, proofread,
//! revise, approve and publish cycle.

pub mod capabilities;
pub mod core;
pub mod documentation;
pub mod error;
pub mod process;
pub mod runner;
pub mod state_machine;
pub mod state_store;

pub use capabilities::{ApprovalGate, ContentGenerator, FixedApproval, Publisher, Reviewer};
pub use crate::core::{CancelSignal, CancellationHandle, Emission, EventKind, Step, StepContext, StepId};
pub use error::{OrchestratorError, Result};
pub use process::{
    EventRouter, NonTerminationWarning, ProcessBuilder, ProcessDefinition, ResolvedTarget,
    RouteTarget, RoutingEdge,
};
pub use runner::{
    InvocationFailure, ProcessRunner, RunHandle, RunOutcome, RunResult, RunnerConfig,
};
pub use state_machine::{RunStateMachine, RunStatus};
pub use state_store::{FileStateStore, InMemoryStateStore, StateStore};
