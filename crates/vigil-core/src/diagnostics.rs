//! Diagnostic snapshots of a capture session
//!
//! A [`DiagnosticReport`] is a plain copy of session, health and restart
//! policy state. Rendering it is deterministic so reports can be diffed
//! between log lines.

use crate::ports::capture::SourceId;
use crate::state::SessionState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Point-in-time view of a session for operational inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub source: SourceId,
    pub state: SessionState,
    pub is_healthy: bool,
    pub frame_count: u64,
    pub restart_count: u32,
    /// Milliseconds since the last frame, `None` if no frame ever arrived
    pub since_last_frame_ms: Option<u64>,
    pub staleness_threshold_ms: u64,
    pub consecutive_failures: u32,
    pub restarts_in_window: u32,
    pub max_restarts: u32,
    pub restart_window_ms: u64,
    /// Delay the next automatic restart would wait for
    pub next_backoff_ms: u64,
    /// A backoff timer or restart attempt is outstanding
    pub restart_pending: bool,
    pub exit_on_stream_failure: bool,
}

impl DiagnosticReport {
    /// Serializes the report as a single JSON line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Converts a duration to whole milliseconds, saturating
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn format_ms(ms: u64) -> String {
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last_frame = match self.since_last_frame_ms {
            Some(ms) => format!("{} ago", format_ms(ms)),
            None => "never".to_string(),
        };
        let escalation = if self.exit_on_stream_failure {
            "terminate process"
        } else {
            "stop session"
        };

        writeln!(f, "capture session {}", self.source)?;
        writeln!(f, "  state:                {}", self.state)?;
        writeln!(f, "  healthy:              {}", yes_no(self.is_healthy))?;
        writeln!(f, "  frames:               {}", self.frame_count)?;
        writeln!(f, "  restarts:             {}", self.restart_count)?;
        writeln!(
            f,
            "  last frame:           {} (stale after {})",
            last_frame,
            format_ms(self.staleness_threshold_ms)
        )?;
        writeln!(f, "  consecutive failures: {}", self.consecutive_failures)?;
        writeln!(
            f,
            "  restart budget:       {}/{} in {} window",
            self.restarts_in_window,
            self.max_restarts,
            format_ms(self.restart_window_ms)
        )?;
        writeln!(f, "  next backoff:         {}", format_ms(self.next_backoff_ms))?;
        writeln!(f, "  restart pending:      {}", yes_no(self.restart_pending))?;
        write!(f, "  on exhaustion:        {}", escalation)
    }
}
