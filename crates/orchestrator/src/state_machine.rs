use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No pending work: either not started yet or drained
    #[default]
    Idle,
    Dispatching,
    Faulted,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Faulted => "faulted",
            Self::Cancelled => "cancelled",
        }
    }
}

pub struct RunStateMachine;

impl RunStateMachine {
    pub fn validate_transition(from: &RunStatus, to: &RunStatus) -> Result<()> {
        let allowed = Self::allowed_transitions(from);

        if allowed.contains(to) {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &RunStatus) -> Vec<RunStatus> {
        match from {
            // Idle -> Faulted covers a bootstrap that never got to dispatch.
            RunStatus::Idle => vec![RunStatus::Dispatching, RunStatus::Faulted],
            RunStatus::Dispatching => {
                vec![RunStatus::Idle, RunStatus::Faulted, RunStatus::Cancelled]
            }
            RunStatus::Faulted => vec![],
            RunStatus::Cancelled => vec![],
        }
    }

    pub fn can_transition(from: &RunStatus, to: &RunStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    pub fn is_terminal(status: &RunStatus) -> bool {
        Self::allowed_transitions(status).is_empty()
    }
}
