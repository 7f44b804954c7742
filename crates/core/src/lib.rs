//! Data model shared by the docflow engine and its adapters.
//!
//! Everything that travels between steps (documents, review verdicts, event
//! payloads) and everything a step persists between dispatches lives here.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, CoreResult};
