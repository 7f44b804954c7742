//! Core abstractions for the step execution model.
//!
//! - [`Step`] - Trait every process step implements
//! - [`StepId`] - Name a step is registered and routed under
//! - [`StepContext`] - Per-invocation handle used to emit events
//! - [`EventKind`] - Closed set of event names a process routes on
//! - [`RunEventEmitter`] - Sequenced publisher of run lifecycle events

mod cancel;
mod context;
mod events;
mod step;

pub use cancel::{CancelSignal, CancellationHandle};
pub use context::{Emission, StepContext};
pub use events::RunEventEmitter;
pub use step::{EventKind, Step, StepId};
