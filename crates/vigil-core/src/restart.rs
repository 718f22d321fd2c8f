//! Restart policy
//!
//! Decides what happens after a stream failure: restart right away, restart
//! after an exponential backoff, or escalate once the restart budget is spent.
//!
//! The budget is spent by either `max_restarts` restarts inside the rolling
//! window, or a streak of `max_restarts` restarts with no frame in between.
//! The streak bound matters once backoff spaces restarts further apart than
//! the window, where the window alone would never fill.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of automatic restarts allowed per window
pub const DEFAULT_MAX_RESTARTS: u32 = 5;

/// Default rolling window for the restart budget
pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(60);

/// Default delay before the second consecutive restart
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Default upper bound for the backoff delay
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Tunable restart budget and backoff parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartConfig {
    /// Automatic restarts allowed inside `window`
    pub max_restarts: u32,
    /// Length of the rolling window
    pub window: Duration,
    /// Delay applied to the second consecutive failure, doubled afterwards
    pub initial_backoff: Duration,
    /// Cap for the backoff delay
    pub max_backoff: Duration,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
            window: DEFAULT_RESTART_WINDOW,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

/// What to do once the restart budget is spent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationAction {
    /// Hand over to the process terminator
    TerminateProcess,
    /// Stop the session and report a terminal error
    StopSession,
}

/// Outcome of evaluating a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart with no delay
    Immediate,
    /// Restart after the given delay
    Backoff(Duration),
    /// Budget exhausted
    Escalate(EscalationAction),
}

impl RestartDecision {
    /// Delay before the restart, or `None` when escalating
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RestartDecision::Immediate => Some(Duration::ZERO),
            RestartDecision::Backoff(delay) => Some(*delay),
            RestartDecision::Escalate(_) => None,
        }
    }
}

/// Sliding-window restart budget with exponential backoff
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    config: RestartConfig,
    exit_on_stream_failure: bool,
    /// Times of automatic restarts still inside the window
    recent: VecDeque<Instant>,
    consecutive_failures: u32,
}

impl RestartPolicy {
    pub fn new(config: RestartConfig, exit_on_stream_failure: bool) -> Self {
        Self {
            config,
            exit_on_stream_failure,
            recent: VecDeque::new(),
            consecutive_failures: 0,
        }
    }

    pub fn config(&self) -> &RestartConfig {
        &self.config
    }

    pub fn exit_on_stream_failure(&self) -> bool {
        self.exit_on_stream_failure
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Evaluates a failure observed at `now`
    ///
    /// Allowed restarts are charged against the budget immediately.
    pub fn on_failure(&mut self, now: Instant) -> RestartDecision {
        self.prune(now);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let window_spent = self.recent.len() as u64 >= u64::from(self.config.max_restarts);
        let streak_spent = self.consecutive_failures > self.config.max_restarts;
        if window_spent || streak_spent {
            return RestartDecision::Escalate(self.escalation_action());
        }

        self.recent.push_back(now);
        let delay = self.backoff_for(self.consecutive_failures);
        if delay.is_zero() {
            RestartDecision::Immediate
        } else {
            RestartDecision::Backoff(delay)
        }
    }

    /// Notes a frame arrival; returns true if it ended a failure streak
    pub fn on_frame(&mut self) -> bool {
        if self.consecutive_failures == 0 {
            return false;
        }
        self.consecutive_failures = 0;
        true
    }

    /// Clears the budget and streak for a fresh start
    pub fn reset(&mut self) {
        self.recent.clear();
        self.consecutive_failures = 0;
    }

    /// Automatic restarts charged inside the window ending at `now`
    pub fn restarts_in_window(&self, now: Instant) -> u32 {
        let count = self
            .recent
            .iter()
            .filter(|at| now.saturating_duration_since(**at) <= self.config.window)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Restarts that count toward escalation at `now`
    ///
    /// The larger of the in-window count and the restarts of the current
    /// failure streak.
    pub fn restarts_spent(&self, now: Instant) -> u32 {
        self.restarts_in_window(now)
            .max(self.consecutive_failures.saturating_sub(1))
            .min(self.config.max_restarts)
    }

    /// Delay the next failure would wait for, if it is allowed to restart
    pub fn next_backoff(&self) -> Duration {
        self.backoff_for(self.consecutive_failures.saturating_add(1))
    }

    pub fn escalation_action(&self) -> EscalationAction {
        if self.exit_on_stream_failure {
            EscalationAction::TerminateProcess
        } else {
            EscalationAction::StopSession
        }
    }

    /// Backoff for the `nth` consecutive failure (1-based)
    fn backoff_for(&self, nth: u32) -> Duration {
        if nth <= 1 {
            return Duration::ZERO;
        }
        let exponent = (nth - 2).min(16);
        self.config
            .initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_backoff)
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.recent.front() {
            if now.saturating_duration_since(*oldest) > self.config.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}
