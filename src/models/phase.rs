//! Game session phases.

use serde::{Deserialize, Serialize};

/// Discrete stage of an active game session's lifecycle.
///
/// Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Session exists but nothing has launched yet.
    Uninitialized,
    /// The launcher (preclient) is running.
    Preclient,
    /// The full game client is running.
    Client,
    /// An in-game executable is running.
    Game,
}

impl Phase {
    /// Sessions only move forward through the lifecycle.
    #[must_use]
    pub fn can_transition_to(self, next: Phase) -> bool {
        next > self
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Preclient => "preclient",
            Self::Client => "client",
            Self::Game => "game",
        };
        f.write_str(label)
    }
}

/// Arguments of a session phase-changed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChangedArgs {
    /// Phase the session left.
    pub old_phase: Phase,
    /// Phase the session entered.
    pub new_phase: Phase,
}

impl PhaseChangedArgs {
    /// Construct transition arguments.
    #[must_use]
    pub fn new(old_phase: Phase, new_phase: Phase) -> Self {
        Self {
            old_phase,
            new_phase,
        }
    }
}
