//! Process discovery descriptors.

use serde::{Deserialize, Serialize};

/// A process observed by the watcher, delivered to every matching subscriber.
///
/// Immutable once constructed; subscribers receive it by reference and
/// clone it if they need to keep it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessDescriptor {
    name: String,
    process_id: u32,
    parent_process_id: u32,
}

impl ProcessDescriptor {
    /// Construct a descriptor for a discovered process.
    #[must_use]
    pub fn new(name: impl Into<String>, process_id: u32, parent_process_id: u32) -> Self {
        Self {
            name: name.into(),
            process_id,
            parent_process_id,
        }
    }

    /// Executable name as reported by the OS.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process identifier.
    #[must_use]
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Identifier of the process that launched this one; `0` when unknown.
    #[must_use]
    pub fn parent_process_id(&self) -> u32 {
        self.parent_process_id
    }
}

/// A currently running process returned by a process source query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    /// Executable name.
    pub name: String,
    /// Process identifier.
    pub process_id: u32,
}

/// Raw push event from a process source: a process that just started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFound {
    /// Executable name.
    pub name: String,
    /// Process identifier.
    pub process_id: u32,
    /// Parent process identifier; `0` when unknown.
    pub parent_process_id: u32,
}
