use docflow_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid process definition: {0}")]
    Configuration(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Review failed: {0}")]
    Review(String),

    #[error("Approval failed: {0}")]
    Approval(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Concurrency fault on step {step}: expected state version {expected}, found {found}")]
    ConcurrencyFault {
        step: String,
        expected: u64,
        found: u64,
    },

    #[error("Payload error: {0}")]
    Payload(#[from] CoreError),

    #[error("Step {step} has no handler named {function}")]
    UnknownFunction { step: String, function: String },

    #[error("Invocation of {step}.{function} timed out after {duration_ms}ms")]
    Timeout {
        step: String,
        function: String,
        duration_ms: u64,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run exceeded {limit} dispatches without draining")]
    DispatchLimitExceeded { limit: usize },

    #[error("Entry step {step} failed: {reason}")]
    EntryFailed { step: String, reason: String },

    #[error("Invalid run status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Run task failed: {0}")]
    RunTask(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub fn generation(reason: impl std::fmt::Display) -> Self {
        Self::Generation(reason.to_string())
    }

    pub fn review(reason: impl std::fmt::Display) -> Self {
        Self::Review(reason.to_string())
    }

    pub fn unknown_function(step: impl Into<String>, function: impl Into<String>) -> Self {
        Self::UnknownFunction {
            step: step.into(),
            function: function.into(),
        }
    }

    /// Whether this error aborts the whole run rather than a single branch.
    ///
    /// Collaborator failures, payload mismatches and timeouts stay local to
    /// the invocation that raised them.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::ConcurrencyFault { .. }
                | Self::DispatchLimitExceeded { .. }
                | Self::EntryFailed { .. }
                | Self::InvalidTransition { .. }
                | Self::StateStore(_)
                | Self::RunTask(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
