//! Collaborator contracts consumed by the lifecycle orchestrator.
//!
//! The orchestrator never depends on concrete implementations; the daemon
//! wires the adapters from [`crate::adapters`] and the process-derived
//! session service, tests wire recording fakes.

use std::sync::Arc;

use crate::chain::{CompilationTask, ResolutionTask};
use crate::models::injection::InjectionConfiguration;
use crate::models::modification::{Modification, ModificationTargetType};
use crate::models::phase::{Phase, PhaseChangedArgs};
use crate::Result;

/// Injects a runtime module into a running process.
pub trait InjectionService: Send + Sync {
    /// Inject the configured module into `process_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Injection` if the process is gone, access is
    /// denied, or the injection itself fails.
    fn inject_to_process(&self, process_id: u32, configuration: &InjectionConfiguration)
        -> Result<()>;
}

/// Pure lookup of injection configurations.
pub trait ConfigurationFactory: Send + Sync {
    /// Configuration used when injecting into the preclient.
    fn preclient_configuration(&self) -> InjectionConfiguration;
}

/// Source of the currently loaded modifications.
pub trait ModificationRepository: Send + Sync {
    /// Snapshot of the loaded modifications, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Repository` if the modifications cannot be listed.
    fn enumerate_modifications(&self) -> Result<Vec<Modification>>;
}

/// Starts dependency resolution chains.
pub trait ResolutionService: Send + Sync {
    /// Start resolving `modification` for `target`. Does not block.
    fn start_modification_resolution(
        &self,
        modification: &Modification,
        target: ModificationTargetType,
    ) -> ResolutionTask;
}

/// Starts object compilation chains.
pub trait CompilerService: Send + Sync {
    /// Start compiling `modification`'s objects for `target`. Does not block.
    fn compile_objects(
        &self,
        modification: &Modification,
        target: ModificationTargetType,
    ) -> CompilationTask;
}

/// Suspend/resume control for game asset streaming.
pub trait ResourceStreaming: Send + Sync {
    /// Stop streaming assets.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Streaming` if streaming could not be quiesced.
    fn suspend(&self) -> Result<()>;

    /// Restart streaming after a suspend.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Streaming` if streaming could not be restarted.
    fn resume(&self) -> Result<()>;
}

/// Handler invoked when a session changes phase.
pub type PhaseChangedHandler = Arc<dyn Fn(PhaseChangedArgs) + Send + Sync>;

/// Handler invoked when a new session is created.
pub type SessionCreatedHandler = Arc<dyn Fn(Arc<dyn GameSession>) + Send + Sync>;

/// An active game session.
pub trait GameSession: Send + Sync {
    /// Unique session identifier.
    fn id(&self) -> &str;

    /// Current phase.
    fn phase(&self) -> Phase;

    /// Register a handler for this session's phase transitions.
    ///
    /// Handlers run synchronously on the context raising the transition.
    fn subscribe_phase_changed(&self, handler: PhaseChangedHandler);
}

/// Raises session-created events.
pub trait SessionService: Send + Sync {
    /// Register a handler for newly created sessions.
    fn subscribe_session_created(&self, handler: SessionCreatedHandler);
}
