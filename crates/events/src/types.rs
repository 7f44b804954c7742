//! Event types for run observability

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: RunEvent,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: RunEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Everything a run reports while it executes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Bootstrap event injected into the entry step
    #[serde(rename = "run.started")]
    RunStarted {
        run_id: Uuid,
        process: String,
        entry_event: String,
    },

    /// A step instance was activated for the first time in this run
    #[serde(rename = "step.activated")]
    StepActivated {
        run_id: Uuid,
        step: String,
        /// True when state was restored from a state store
        restored: bool,
    },

    /// A handler emitted an event that is now queued for routing
    #[serde(rename = "step.event_emitted")]
    EventEmitted {
        run_id: Uuid,
        source: String,
        event: String,
        targets: usize,
    },

    /// A handler invocation failed; its branch ends here
    #[serde(rename = "step.invocation_failed")]
    InvocationFailed {
        run_id: Uuid,
        step: String,
        function: String,
        error: String,
    },

    /// A document reached the process output step
    #[serde(rename = "run.output_captured")]
    OutputCaptured {
        run_id: Uuid,
        step: String,
        document_id: Uuid,
    },

    /// The queue drained
    #[serde(rename = "run.completed")]
    RunCompleted {
        run_id: Uuid,
        dispatched: usize,
        published: bool,
    },

    /// The run aborted on a process-wide fault
    #[serde(rename = "run.faulted")]
    RunFaulted { run_id: Uuid, reason: String },

    /// The run was cancelled between dispatches
    #[serde(rename = "run.cancelled")]
    RunCancelled { run_id: Uuid },
}

impl RunEvent {
    /// Get the run ID associated with this event
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunStarted { run_id, .. } => *run_id,
            RunEvent::StepActivated { run_id, .. } => *run_id,
            RunEvent::EventEmitted { run_id, .. } => *run_id,
            RunEvent::InvocationFailed { run_id, .. } => *run_id,
            RunEvent::OutputCaptured { run_id, .. } => *run_id,
            RunEvent::RunCompleted { run_id, .. } => *run_id,
            RunEvent::RunFaulted { run_id, .. } => *run_id,
            RunEvent::RunCancelled { run_id } => *run_id,
        }
    }

    /// Whether this event ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::RunCompleted { .. } | RunEvent::RunFaulted { .. } | RunEvent::RunCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_creation() {
        let event = RunEvent::RunCancelled {
            run_id: Uuid::new_v4(),
        };
        let envelope = EventEnvelope::new(event);

        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::InvocationFailed {
            run_id: Uuid::new_v4(),
            step: "proofread".to_string(),
            function: "proofread_documentation".to_string(),
            error: "Review failed: timeout".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("step.invocation_failed"));
        assert!(json.contains("proofread_documentation"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"run.completed","run_id":"550e8400-e29b-41d4-a716-446655440000","dispatched":7,"published":true}"#;
        let event: RunEvent = serde_json::from_str(json).unwrap();

        match event {
            RunEvent::RunCompleted {
                dispatched,
                published,
                ..
            } => {
                assert_eq!(dispatched, 7);
                assert!(published);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_terminal_events() {
        let run_id = Uuid::new_v4();
        assert!(RunEvent::RunCancelled { run_id }.is_terminal());
        assert!(!RunEvent::StepActivated {
            run_id,
            step: "publish".to_string(),
            restored: false,
        }
        .is_terminal());
        assert_eq!(RunEvent::RunCancelled { run_id }.run_id(), run_id);
    }
}
