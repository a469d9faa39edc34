#![forbid(unsafe_code)]

//! Process discovery and phase-driven orchestration for a game client.
//!
//! [`watcher::ProcessWatcherService`] turns process launches into
//! subscriber callbacks, [`session::ProcessSessionService`] derives game
//! sessions from those launches, and
//! [`orchestrator::LifecycleOrchestrator`] injects the preclient module and
//! runs the resolve/compile pipeline when a session starts.

pub mod adapters;
pub mod chain;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod watcher;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
