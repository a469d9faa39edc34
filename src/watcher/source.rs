//! Process source abstraction: the OS-level enumeration primitive.

use std::sync::Arc;

use crate::models::process::{ProcessFound, RunningProcess};
use crate::Result;

/// Handler a process source calls for every newly started process.
///
/// An `Err` return means one or more subscribers failed; the source
/// reports it and keeps delivering.
pub type DiscoveryHandler = Arc<dyn Fn(&ProcessFound) -> Result<()> + Send + Sync>;

/// OS process enumeration and new-process notification.
pub trait ProcessSource: Send + Sync {
    /// Start delivering new-process events to `handler` on the source's
    /// own delivery context.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Discovery` if the source cannot start or was
    /// already started.
    fn start(&self, handler: DiscoveryHandler) -> Result<()>;

    /// Currently running processes accepted by `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Discovery` if the process table cannot be read.
    fn find_processes(
        &self,
        predicate: &dyn Fn(&RunningProcess) -> bool,
    ) -> Result<Vec<RunningProcess>>;

    /// Parent of `process_id`; `Ok(None)` if the process is no longer
    /// running, `Some(0)` if it has no known parent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Discovery` if the lookup itself fails.
    fn parent_process_id(&self, process_id: u32) -> Result<Option<u32>>;

    /// Stop delivering events.
    fn stop(&self) {}
}
