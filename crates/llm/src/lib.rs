//! Chat-completion backed collaborators for the documentation cycle.

pub mod client;
pub mod error;
pub mod generator;
pub mod reviewer;
pub mod types;

pub use client::{ChatClient, ChatClientConfig};
pub use error::{LlmError, LlmResult};
pub use generator::LlmGenerator;
pub use reviewer::{parse_verdict, LlmReviewer};
