//! Concrete collaborators used by the daemon.
//!
//! Each adapter implements one of the contracts in [`crate::services`]
//! on top of the configuration in [`crate::config`].

pub mod command_chain;
pub mod injection;
pub mod repository;
pub mod streaming;

pub use command_chain::CommandChainService;
pub use injection::{CommandInjector, ConfiguredPreclientFactory, Injector, RetryingInjectionService};
pub use repository::DirectoryModificationRepository;
pub use streaming::StreamingGate;
