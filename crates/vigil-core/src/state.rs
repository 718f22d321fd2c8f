//! Capture session state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Constructed, never started
    Idle,
    /// Waiting for the backend to confirm the stream
    Starting,
    /// Stream confirmed and delivering
    Running,
    /// Teardown in progress
    Stopping,
    /// Torn down, either on request or after a terminal failure
    Stopped,
    /// A restart cycle is scheduled or in flight
    Restarting,
}

impl SessionState {
    /// States in which the session owns (or is acquiring) a live stream
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Running | SessionState::Restarting
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Restarting => "restarting",
        };
        f.write_str(name)
    }
}
