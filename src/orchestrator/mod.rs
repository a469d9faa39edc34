//! Lifecycle orchestration.
//!
//! Bridges process discovery and session phase events into preclient
//! injection and the resolve/compile pipeline over the loaded
//! modifications.

pub mod lifecycle;
pub mod pipeline;
pub mod reporter;

pub use lifecycle::{LifecycleEvent, LifecycleOrchestrator, OrchestratorDeps};
