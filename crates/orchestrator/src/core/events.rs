//! Sequenced publisher of run lifecycle events.
//!
//! Runs publish to an [`EventBus`] only when the host attached one; the
//! emitter keeps a sequence counter either way so tests can see how many
//! lifecycle events a run produced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use events::{EventBus, RunEvent};

#[derive(Clone, Default)]
pub struct RunEventEmitter {
    bus: Option<EventBus>,
    sequence: Arc<AtomicU64>,
}

impl RunEventEmitter {
    pub fn new(bus: Option<EventBus>) -> Self {
        Self {
            bus,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event with the next sequence number.
    pub fn emit(&self, event: RunEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        if let Some(bus) = &self.bus {
            bus.emit(event);
        }
    }

    /// Number of events emitted so far.
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }
}
