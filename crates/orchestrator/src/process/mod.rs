//! Process graphs: steps, routing edges and their validation.
//!
//! - [`ProcessBuilder`] - Fluent registration of steps and edges
//! - [`ProcessDefinition`] - Validated, immutable result shared by runs
//! - [`EventRouter`] - `(source step, event)` to handler lookup

mod builder;
mod definition;
mod router;

pub use builder::{EdgeBinding, EntryBinding, ProcessBuilder, RouteTarget};
pub use definition::{NonTerminationWarning, ProcessDefinition};
pub use router::{EventRouter, ResolvedTarget, RoutingEdge};
