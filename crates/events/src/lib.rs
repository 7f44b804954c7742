//! Run-lifecycle events for docflow
//!
//! This crate provides the event bus and event types that let a host observe
//! process runs as they dispatch, fail, and complete.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
