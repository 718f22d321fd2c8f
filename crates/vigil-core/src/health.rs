//! Stream liveness bookkeeping
//!
//! `HealthMonitor` only records timestamps and counters. Whether the stream
//! counts as healthy is derived on demand from the last frame time, the
//! current time and whether the session is running.

use std::time::Duration;
use tokio::time::Instant;

/// Default maximum gap between frames before a stream is considered stale
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(5);

/// Read-only copy of the health counters at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Arrival time of the most recent frame, `None` if no frame ever arrived
    pub last_frame_time: Option<Instant>,
    /// Frames received over the session lifetime
    pub frame_count: u64,
    /// Restarts performed over the session lifetime
    pub restart_count: u32,
    /// Derived liveness flag
    pub is_healthy: bool,
}

impl HealthSnapshot {
    /// Time elapsed between the last frame and `now`
    pub fn time_since_last_frame(&self, now: Instant) -> Option<Duration> {
        self.last_frame_time
            .map(|last| now.saturating_duration_since(last))
    }
}

/// Returns true when a frame arrived no more than `threshold` before `now`
pub fn is_fresh(last_frame_time: Option<Instant>, now: Instant, threshold: Duration) -> bool {
    match last_frame_time {
        Some(last) => now.saturating_duration_since(last) <= threshold,
        None => false,
    }
}

/// Frame and restart counters for one session
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    staleness_threshold: Duration,
    last_frame_time: Option<Instant>,
    frame_count: u64,
    restart_count: u32,
}

impl HealthMonitor {
    pub fn new(staleness_threshold: Duration) -> Self {
        Self {
            staleness_threshold,
            last_frame_time: None,
            frame_count: 0,
            restart_count: 0,
        }
    }

    pub fn staleness_threshold(&self) -> Duration {
        self.staleness_threshold
    }

    /// Records a frame arrival
    ///
    /// `last_frame_time` never moves backwards, even if a backend reports
    /// an older timestamp.
    pub fn record_frame(&mut self, timestamp: Instant) {
        self.frame_count = self.frame_count.saturating_add(1);
        self.last_frame_time = Some(match self.last_frame_time {
            Some(last) if last > timestamp => last,
            _ => timestamp,
        });
    }

    /// Records one restart cycle
    pub fn record_restart(&mut self) {
        self.restart_count = self.restart_count.saturating_add(1);
    }

    pub fn last_frame_time(&self) -> Option<Instant> {
        self.last_frame_time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Builds a snapshot; never healthy unless `running` is set
    pub fn snapshot(&self, now: Instant, running: bool) -> HealthSnapshot {
        HealthSnapshot {
            last_frame_time: self.last_frame_time,
            frame_count: self.frame_count,
            restart_count: self.restart_count,
            is_healthy: running
                && is_fresh(self.last_frame_time, now, self.staleness_threshold),
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS_THRESHOLD)
    }
}
