//! Plugin lifecycle state machine

use serde::{Deserialize, Serialize};

/// State byte reported for a handle that does not name a live instance
pub const STATE_SENTINEL: u8 = 255;

/// Plugin lifecycle states
///
/// State transitions:
/// ```text
/// Installed → Starting → Active → Stopping → Stopped
///     │           │         │         │
///     └───────────┴─────────┴─────────┴──→ Failed
/// ```
///
/// Transitions only move forward. `Stopped` and `Failed` are terminal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created by the plugin factory, not yet initialized
    #[default]
    Installed = 0,
    /// Init in progress
    Starting = 1,
    /// Accepting transport calls
    Active = 2,
    /// Shutdown in progress
    Stopping = 3,
    /// Shutdown complete
    Stopped = 4,
    /// Absorbing error state
    Failed = 5,
}

impl LifecycleState {
    /// Decode a state byte; returns `None` for the sentinel or any other value
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LifecycleState::Installed),
            1 => Some(LifecycleState::Starting),
            2 => Some(LifecycleState::Active),
            3 => Some(LifecycleState::Stopping),
            4 => Some(LifecycleState::Stopped),
            5 => Some(LifecycleState::Failed),
            _ => None,
        }
    }

    /// State byte as exposed by `plugin_get_state`
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Check if this state can transition to the target state
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            (Installed, Starting)
                | (Starting, Active)
                | (Active, Stopping)
                | (Stopping, Stopped)
                | (Installed, Failed)
                | (Starting, Failed)
                | (Active, Failed)
                | (Stopping, Failed)
        )
    }

    /// Check if the plugin can handle transport calls in this state
    pub fn can_handle_requests(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    /// Check if the plugin is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Installed => write!(f, "Installed"),
            LifecycleState::Starting => write!(f, "Starting"),
            LifecycleState::Active => write!(f, "Active"),
            LifecycleState::Stopping => write!(f, "Stopping"),
            LifecycleState::Stopped => write!(f, "Stopped"),
            LifecycleState::Failed => write!(f, "Failed"),
        }
    }
}
