mod document;
mod payload;
mod state;
mod verdict;

pub use document::Document;
pub use payload::Payload;
pub use state::{ContextLog, ContextMessage, Role, StepState};
pub use verdict::ReviewVerdict;
