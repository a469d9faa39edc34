//! Loaded modification units.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What a modification is being prepared for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModificationTargetType {
    /// Overrides consumed by the game client.
    Client,
    /// Overrides consumed by the in-game executable.
    Game,
}

impl std::fmt::Display for ModificationTargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Game => f.write_str("game"),
        }
    }
}

#[derive(Debug)]
struct ModificationInner {
    name: String,
    root: PathBuf,
}

/// Handle to a modification owned by the repository.
///
/// Cloning shares the same unit. Equality is identity: two handles are
/// equal only if they refer to the same loaded unit, even when another
/// unit has the same name and root.
#[derive(Debug, Clone)]
pub struct Modification {
    inner: Arc<ModificationInner>,
}

impl Modification {
    /// Create a new modification unit.
    #[must_use]
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ModificationInner {
                name: name.into(),
                root: root.into(),
            }),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Root directory of the modification's content.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }
}

impl PartialEq for Modification {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Modification {}
