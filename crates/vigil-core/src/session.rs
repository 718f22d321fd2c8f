//! Capture session lifecycle
//!
//! `CaptureSession` is the single authority over a capture stream. It opens
//! and closes streams through its [`CaptureSource`], routes backend frames and
//! failures into the health monitor and the consumer callbacks, and drives
//! automatic restarts through the [`RestartPolicy`].
//!
//! Locking:
//! - `core` guards state, health counters and the restart policy. It is never
//!   held across an await point or while a consumer callback runs.
//! - `delivery` is held while a consumer callback runs, so `stop_capture` can
//!   wait out a callback already in progress.
//! - `source` (async) serializes structural transitions: open, close, restart.
//!
//! Every stream is tagged with an epoch. The epoch is advanced under `core`
//! whenever the current stream is superseded (restart, stop, fresh start);
//! events and callbacks carrying an older epoch are dropped.

use crate::diagnostics::{duration_ms, DiagnosticReport};
use crate::error::SessionError;
use crate::health::{HealthMonitor, HealthSnapshot, DEFAULT_STALENESS_THRESHOLD};
use crate::logging::session_span;
use crate::ports::capture::{
    CaptureBackend, FailureEvent, FailureKind, FrameSample, SourceId, StreamEvents,
};
use crate::ports::diagnostics::{DiagnosticSink, TracingDiagnosticSink};
use crate::ports::terminator::{ProcessTerminator, ESCALATION_EXIT_CODE};
use crate::restart::{EscalationAction, RestartConfig, RestartDecision, RestartPolicy};
use crate::source::CaptureSource;
use crate::state::SessionState;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn, Instrument};

/// Default bound on waiting for the backend to confirm a stream start
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on waiting for the backend to tear a stream down
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumer callback receiving every frame
pub type FrameCallback = Arc<dyn Fn(FrameSample) + Send + Sync>;

/// Consumer callback receiving every failure
pub type ErrorCallback = Arc<dyn Fn(SessionError) + Send + Sync>;

/// Timing and restart parameters for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum gap since the last frame before the stream counts as unhealthy
    pub staleness_threshold: Duration,
    /// Bound on waiting for a start confirmation; expiry counts as a failure
    pub start_timeout: Duration,
    /// Bound on waiting for teardown
    pub stop_timeout: Duration,
    /// Restart budget and backoff
    pub restart: RestartConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            start_timeout: DEFAULT_START_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            restart: RestartConfig::default(),
        }
    }
}

/// Builder for [`CaptureSession`]
pub struct CaptureSessionBuilder {
    source: SourceId,
    backend: Arc<dyn CaptureBackend>,
    on_frame: FrameCallback,
    on_error: ErrorCallback,
    exit_on_stream_failure: bool,
    config: SessionConfig,
    terminator: Option<Arc<dyn ProcessTerminator>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl CaptureSessionBuilder {
    /// Sets the frame callback
    pub fn on_frame<F>(mut self, callback: F) -> Self
    where
        F: Fn(FrameSample) + Send + Sync + 'static,
    {
        self.on_frame = Arc::new(callback);
        self
    }

    /// Sets the error callback
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(SessionError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(callback);
        self
    }

    /// Terminate the process instead of stopping once the restart budget is spent
    pub fn exit_on_stream_failure(mut self, enabled: bool) -> Self {
        self.exit_on_stream_failure = enabled;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs the collaborator used when escalation terminates the process
    ///
    /// Without one, an escalating session stops instead and logs why.
    pub fn terminator(mut self, terminator: Arc<dyn ProcessTerminator>) -> Self {
        self.terminator = Some(terminator);
        self
    }

    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn build(self) -> CaptureSession {
        let core = Core {
            state: SessionState::Idle,
            health: HealthMonitor::new(self.config.staleness_threshold),
            policy: RestartPolicy::new(self.config.restart.clone(), self.exit_on_stream_failure),
            pending_restart: None,
            runtime: None,
        };

        CaptureSession {
            shared: Arc::new(Shared {
                source_id: self.source,
                config: self.config,
                core: Mutex::new(core),
                delivery: Mutex::new(()),
                epoch: AtomicU64::new(0),
                cancel: Notify::new(),
                source: AsyncMutex::new(CaptureSource::new(self.source, self.backend)),
                on_frame: self.on_frame,
                on_error: self.on_error,
                terminator: self.terminator,
                diagnostics: self.diagnostics,
            }),
        }
    }
}

/// Supervised capture of a single source
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct CaptureSession {
    shared: Arc<Shared>,
}

impl CaptureSession {
    /// Creates a session with default configuration
    pub fn new<F, E>(
        source: SourceId,
        backend: Arc<dyn CaptureBackend>,
        on_frame: F,
        on_error: E,
        exit_on_stream_failure: bool,
    ) -> Self
    where
        F: Fn(FrameSample) + Send + Sync + 'static,
        E: Fn(SessionError) + Send + Sync + 'static,
    {
        Self::builder(source, backend)
            .on_frame(on_frame)
            .on_error(on_error)
            .exit_on_stream_failure(exit_on_stream_failure)
            .build()
    }

    pub fn builder(source: SourceId, backend: Arc<dyn CaptureBackend>) -> CaptureSessionBuilder {
        CaptureSessionBuilder {
            source,
            backend,
            on_frame: Arc::new(|_| {}),
            on_error: Arc::new(|_| {}),
            exit_on_stream_failure: false,
            config: SessionConfig::default(),
            terminator: None,
            diagnostics: Arc::new(TracingDiagnosticSink),
        }
    }

    pub fn source(&self) -> SourceId {
        self.shared.source_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state
    }

    /// Starts capturing
    ///
    /// No-op while the session is already active. Returns once the backend
    /// confirmed the stream, the start failed, or it was cancelled by
    /// `stop_capture`. Failures are reported through the error callback.
    pub async fn start_capture(&self) {
        let epoch = {
            let mut core = self.shared.core.lock();
            match core.state {
                SessionState::Starting | SessionState::Running | SessionState::Restarting => {
                    debug!(
                        source = %self.shared.source_id,
                        state = %core.state,
                        "Start ignored, session already active"
                    );
                    return;
                }
                SessionState::Stopping => {
                    warn!(source = %self.shared.source_id, "Start ignored, session is stopping");
                    return;
                }
                SessionState::Idle | SessionState::Stopped => {}
            }
            core.state = SessionState::Starting;
            core.runtime = Some(Handle::current());
            core.policy.reset();
            self.shared.advance_epoch()
        };

        info!(source = %self.shared.source_id, "Starting capture");
        self.shared.establish(epoch).await;
    }

    /// Stops capturing
    ///
    /// Safe from any state and idempotent. Cancels a pending restart and any
    /// in-flight start. Once this returns no further frame or error callback
    /// fires until the session is started again.
    pub async fn stop_capture(&self) {
        let previous = {
            let mut core = self.shared.core.lock();
            let previous = core.state;
            if let Some(pending) = core.pending_restart.take() {
                pending.abort();
            }
            if previous != SessionState::Stopped {
                core.state = SessionState::Stopping;
            }
            self.shared.advance_epoch();
            previous
        };
        self.shared.cancel.notify_waiters();

        // A callback that passed its epoch check before the bump may still be
        // running. Wait it out on a blocking thread, not on this worker.
        if self.shared.delivery.try_lock().is_none() {
            let shared = Arc::clone(&self.shared);
            if let Err(e) = tokio::task::spawn_blocking(move || drop(shared.delivery.lock())).await {
                warn!(source = %self.shared.source_id, "Waiting for callback failed: {}", e);
            }
        }

        {
            let mut source = self.shared.source.lock().await;
            source.close(self.shared.config.stop_timeout).await;
        }

        {
            let mut core = self.shared.core.lock();
            if core.state == SessionState::Stopping {
                core.state = SessionState::Stopped;
            }
        }

        if previous != SessionState::Stopped {
            info!(source = %self.shared.source_id, "Capture stopped (was {})", previous);
        }
    }

    /// Restarts the stream on request
    ///
    /// Only a running session restarts. A request arriving while a start or
    /// restart is already underway is coalesced into it.
    pub async fn restart_capture(&self) {
        let epoch = {
            let mut core = self.shared.core.lock();
            match core.state {
                SessionState::Running => {}
                SessionState::Starting | SessionState::Restarting => {
                    debug!(
                        source = %self.shared.source_id,
                        "Restart already in progress, request coalesced"
                    );
                    return;
                }
                state => {
                    warn!(
                        source = %self.shared.source_id,
                        %state,
                        "Restart ignored, session is not active"
                    );
                    return;
                }
            }
            core.state = SessionState::Restarting;
            core.health.record_restart();
            self.shared.advance_epoch()
        };

        info!(source = %self.shared.source_id, "Restarting capture on request");
        self.shared.establish(epoch).await;
    }

    /// Health snapshot as of now
    pub fn health(&self) -> HealthSnapshot {
        self.health_at(Instant::now())
    }

    /// Health snapshot evaluated at `now`
    pub fn health_at(&self, now: Instant) -> HealthSnapshot {
        let core = self.shared.core.lock();
        core.health.snapshot(now, core.state == SessionState::Running)
    }

    pub fn last_frame_time(&self) -> Option<Instant> {
        self.shared.core.lock().health.last_frame_time()
    }

    pub fn frame_count(&self) -> u64 {
        self.shared.core.lock().health.frame_count()
    }

    pub fn restart_count(&self) -> u32 {
        self.shared.core.lock().health.restart_count()
    }

    pub fn is_healthy(&self) -> bool {
        self.health().is_healthy
    }

    /// Copies session, health and restart state into a report
    pub fn diagnostic_report(&self) -> DiagnosticReport {
        let now = Instant::now();
        let core = self.shared.core.lock();
        let snapshot = core.health.snapshot(now, core.state == SessionState::Running);
        let policy = &core.policy;
        let timer_pending = core
            .pending_restart
            .as_ref()
            .map_or(false, |task| !task.is_finished());

        DiagnosticReport {
            source: self.shared.source_id,
            state: core.state,
            is_healthy: snapshot.is_healthy,
            frame_count: snapshot.frame_count,
            restart_count: snapshot.restart_count,
            since_last_frame_ms: snapshot.time_since_last_frame(now).map(duration_ms),
            staleness_threshold_ms: duration_ms(core.health.staleness_threshold()),
            consecutive_failures: policy.consecutive_failures(),
            restarts_in_window: policy.restarts_in_window(now),
            max_restarts: policy.config().max_restarts,
            restart_window_ms: duration_ms(policy.config().window),
            next_backoff_ms: duration_ms(policy.next_backoff()),
            restart_pending: core.state == SessionState::Restarting || timer_pending,
            exit_on_stream_failure: policy.exit_on_stream_failure(),
        }
    }

    /// Emits a diagnostic report to the configured sink
    pub fn log_diagnostic_state(&self) {
        let report = self.diagnostic_report();
        self.shared.diagnostics.emit(&report);
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("source", &self.shared.source_id)
            .field("state", &self.state())
            .finish()
    }
}

struct Core {
    state: SessionState,
    health: HealthMonitor,
    policy: RestartPolicy,
    /// Backoff timer or automatic restart in flight
    pending_restart: Option<JoinHandle<()>>,
    /// Runtime the session was started on; backend threads schedule work here
    runtime: Option<Handle>,
}

struct Shared {
    source_id: SourceId,
    config: SessionConfig,
    core: Mutex<Core>,
    delivery: Mutex<()>,
    epoch: AtomicU64,
    cancel: Notify,
    source: AsyncMutex<CaptureSource>,
    on_frame: FrameCallback,
    on_error: ErrorCallback,
    terminator: Option<Arc<dyn ProcessTerminator>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl Shared {
    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Supersedes the current stream. Callers hold `core`.
    fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Opens a fresh stream for `epoch`, replacing any previous one
    async fn establish(self: &Arc<Self>, epoch: u64) {
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);

        let mut source = self.source.lock().await;
        if self.current_epoch() != epoch {
            return;
        }
        source.close(self.config.stop_timeout).await;
        if self.current_epoch() != epoch {
            return;
        }

        let events: Arc<dyn StreamEvents> = Arc::new(SessionEvents {
            shared: Arc::downgrade(self),
            epoch,
        });
        let opened = tokio::select! {
            result = source.open(events, self.config.start_timeout) => Some(result),
            _ = &mut cancelled => None,
        };

        match opened {
            None => debug!(source = %self.source_id, "Stream start cancelled"),
            Some(Ok(handle)) => {
                let confirmed = {
                    let mut core = self.core.lock();
                    let current = self.current_epoch() == epoch
                        && matches!(
                            core.state,
                            SessionState::Starting | SessionState::Restarting
                        );
                    if current {
                        core.state = SessionState::Running;
                    }
                    current
                };

                if confirmed {
                    info!(source = %self.source_id, stream = %handle, "Capture stream running");
                } else {
                    debug!(source = %self.source_id, stream = %handle, "Discarding superseded stream");
                    source.close(self.config.stop_timeout).await;
                }
            }
            Some(Err(err)) => {
                drop(source);
                if err.is_terminal() {
                    self.fail_terminal(
                        epoch,
                        SessionError::SourceUnavailable {
                            target: self.source_id,
                            reason: err.to_string(),
                        },
                    );
                } else {
                    warn!(source = %self.source_id, "Capture stream failed to start: {}", err);
                    self.handle_failure(epoch, FailureEvent::interrupted(err.to_string()));
                }
            }
        }
    }

    fn accept_frame(&self, epoch: u64, frame: FrameSample) {
        {
            let mut core = self.core.lock();
            if self.current_epoch() != epoch || !core.state.is_active() {
                trace!(source = %self.source_id, "Dropping frame from inactive stream");
                return;
            }
            core.health.record_frame(frame.captured_at);
            if core.policy.on_frame() {
                debug!(source = %self.source_id, "Frames flowing again, failure streak reset");
            }
        }
        self.deliver_frame(epoch, frame);
    }

    fn handle_failure(self: &Arc<Self>, epoch: u64, event: FailureEvent) {
        if event.kind == FailureKind::SourceLost {
            self.fail_terminal(
                epoch,
                SessionError::SourceUnavailable {
                    target: self.source_id,
                    reason: event.reason,
                },
            );
            return;
        }

        let (decision, delivery_epoch, restarts, window) = {
            let mut core = self.core.lock();
            if self.current_epoch() != epoch || !core.state.is_active() {
                debug!(
                    source = %self.source_id,
                    "Ignoring failure from inactive stream: {}",
                    event.reason
                );
                return;
            }

            let decision = core.policy.on_failure(event.timestamp);
            let delivery_epoch = match decision {
                RestartDecision::Escalate(_) => {
                    core.state = SessionState::Stopped;
                    epoch
                }
                RestartDecision::Immediate | RestartDecision::Backoff(_) => {
                    core.state = SessionState::Restarting;
                    core.health.record_restart();
                    self.advance_epoch()
                }
            };
            (
                decision,
                delivery_epoch,
                core.policy.restarts_spent(event.timestamp),
                core.policy.config().window,
            )
        };

        warn!(
            source = %self.source_id,
            ?decision,
            "Capture stream interrupted: {}",
            event.reason
        );
        self.deliver_error(
            delivery_epoch,
            SessionError::StreamInterrupted {
                reason: event.reason,
            },
        );

        match decision {
            RestartDecision::Escalate(action) => self.escalate(epoch, action, restarts, window),
            RestartDecision::Immediate => self.schedule_restart(delivery_epoch, Duration::ZERO),
            RestartDecision::Backoff(delay) => self.schedule_restart(delivery_epoch, delay),
        }
    }

    fn schedule_restart(self: &Arc<Self>, epoch: u64, delay: Duration) {
        let mut core = self.core.lock();
        if self.current_epoch() != epoch || core.state != SessionState::Restarting {
            return;
        }
        let Some(runtime) = core.runtime.clone() else {
            error!(source = %self.source_id, "No runtime to schedule restart on");
            return;
        };

        let shared = Arc::clone(self);
        let task = runtime.spawn(async move {
            if !delay.is_zero() {
                debug!(source = %shared.source_id, "Restarting capture in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
            shared.establish(epoch).await;
        }
        .instrument(session_span(self.source_id)));
        core.pending_restart = Some(task);
    }

    fn escalate(
        self: &Arc<Self>,
        epoch: u64,
        action: EscalationAction,
        restarts: u32,
        window: Duration,
    ) {
        error!(
            source = %self.source_id,
            "Restart budget exhausted ({} restarts within {:?})",
            restarts,
            window
        );
        self.deliver_error(epoch, SessionError::RestartExhausted { restarts, window });
        self.spawn_teardown(epoch);

        if action == EscalationAction::TerminateProcess {
            match &self.terminator {
                Some(terminator) => {
                    error!(
                        source = %self.source_id,
                        "Terminating process with exit code {}",
                        ESCALATION_EXIT_CODE
                    );
                    terminator.terminate(ESCALATION_EXIT_CODE);
                }
                None => warn!(
                    source = %self.source_id,
                    "Exit on stream failure requested but no process terminator installed; session stopped"
                ),
            }
        }
    }

    /// Stops the session for a failure that must not be retried
    fn fail_terminal(self: &Arc<Self>, epoch: u64, err: SessionError) {
        {
            let mut core = self.core.lock();
            if self.current_epoch() != epoch || !core.state.is_active() {
                return;
            }
            core.state = SessionState::Stopped;
        }

        error!(source = %self.source_id, "{}", err);
        self.deliver_error(epoch, err);
        self.spawn_teardown(epoch);
    }

    /// Closes the stream of `epoch` in the background
    fn spawn_teardown(self: &Arc<Self>, epoch: u64) {
        let runtime = self.core.lock().runtime.clone();
        let Some(runtime) = runtime else {
            return;
        };

        let shared = Arc::clone(self);
        runtime.spawn(async move {
            let mut source = shared.source.lock().await;
            if shared.current_epoch() == epoch {
                source.close(shared.config.stop_timeout).await;
            }
        }
        .instrument(session_span(self.source_id)));
    }

    fn deliver_frame(&self, epoch: u64, frame: FrameSample) {
        let _delivery = self.delivery.lock();
        if self.current_epoch() != epoch {
            return;
        }
        let callback = &self.on_frame;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(frame))) {
            let fault = SessionError::CallbackFault {
                reason: panic_message(payload.as_ref()),
            };
            error!(source = %self.source_id, "Frame callback failed: {}", fault);
        }
    }

    fn deliver_error(&self, epoch: u64, err: SessionError) {
        let _delivery = self.delivery.lock();
        if self.current_epoch() != epoch {
            debug!(source = %self.source_id, "Suppressing error after stop: {}", err);
            return;
        }
        let callback = &self.on_error;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(err))) {
            let fault = SessionError::CallbackFault {
                reason: panic_message(payload.as_ref()),
            };
            error!(source = %self.source_id, "Error callback failed: {}", fault);
        }
    }
}

/// Event sink handed to the backend for one stream
struct SessionEvents {
    shared: Weak<Shared>,
    epoch: u64,
}

impl StreamEvents for SessionEvents {
    fn on_frame(&self, frame: FrameSample) {
        if let Some(shared) = self.shared.upgrade() {
            shared.accept_frame(self.epoch, frame);
        }
    }

    fn on_failure(&self, event: FailureEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_failure(self.epoch, event);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::capture::{BackendError, StreamHandle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::OnceLock;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum OpenMode {
        Accept,
        FailAfterStart,
        RejectUnavailable,
        RejectTransient,
        Hang,
    }

    // Backend driven by the test: frames and failures are pushed by hand
    struct ScriptedBackend {
        mode: Mutex<OpenMode>,
        open_delay: Mutex<Duration>,
        opens: AtomicUsize,
        closes: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        next_handle: AtomicU64,
        events: Mutex<Option<Arc<dyn StreamEvents>>>,
    }

    impl ScriptedBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                mode: Mutex::new(OpenMode::Accept),
                open_delay: Mutex::new(Duration::ZERO),
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                next_handle: AtomicU64::new(1),
                events: Mutex::new(None),
            })
        }

        fn set_mode(&self, mode: OpenMode) {
            *self.mode.lock() = mode;
        }

        fn set_open_delay(&self, delay: Duration) {
            *self.open_delay.lock() = delay;
        }

        fn events(&self) -> Arc<dyn StreamEvents> {
            self.events.lock().clone().expect("no stream opened yet")
        }

        fn emit_frame(&self) {
            self.events().on_frame(FrameSample::new(vec![0u8; 16], 2, 2));
        }

        fn emit_failure(&self, reason: &str) {
            self.events().on_failure(FailureEvent::interrupted(reason));
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CaptureBackend for ScriptedBackend {
        async fn open(
            &self,
            _source: SourceId,
            events: Arc<dyn StreamEvents>,
        ) -> Result<StreamHandle, BackendError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

            let delay = *self.open_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mode = *self.mode.lock();
            match mode {
                OpenMode::Hang => std::future::pending().await,
                OpenMode::RejectUnavailable => Err(BackendError::SourceUnavailable(
                    "no such window".to_string(),
                )),
                OpenMode::RejectTransient => {
                    Err(BackendError::StartFailed("device busy".to_string()))
                }
                OpenMode::Accept | OpenMode::FailAfterStart => {
                    let handle = StreamHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
                    *self.events.lock() = Some(Arc::clone(&events));
                    if mode == OpenMode::FailAfterStart {
                        events.on_failure(FailureEvent::interrupted("stream died on start"));
                    }
                    Ok(handle)
                }
            }
        }

        async fn close(&self, _handle: StreamHandle) -> Result<(), BackendError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: AtomicUsize,
        errors: Mutex<Vec<SessionError>>,
    }

    impl Recorder {
        fn frames(&self) -> usize {
            self.frames.load(Ordering::SeqCst)
        }

        fn errors(&self) -> Vec<SessionError> {
            self.errors.lock().clone()
        }

        fn exhausted_count(&self) -> usize {
            self.errors()
                .iter()
                .filter(|e| matches!(e, SessionError::RestartExhausted { .. }))
                .count()
        }

        fn interrupted_count(&self) -> usize {
            self.errors()
                .iter()
                .filter(|e| matches!(e, SessionError::StreamInterrupted { .. }))
                .count()
        }
    }

    #[derive(Default)]
    struct MockTerminator {
        codes: Mutex<Vec<i32>>,
    }

    impl ProcessTerminator for MockTerminator {
        fn terminate(&self, exit_code: i32) {
            self.codes.lock().push(exit_code);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<DiagnosticReport>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, report: &DiagnosticReport) {
            self.reports.lock().push(report.clone());
        }
    }

    fn config_with_budget(max_restarts: u32) -> SessionConfig {
        SessionConfig {
            restart: RestartConfig {
                max_restarts,
                ..RestartConfig::default()
            },
            ..SessionConfig::default()
        }
    }

    fn build_session(
        backend: &Arc<ScriptedBackend>,
        recorder: &Arc<Recorder>,
        exit_on_stream_failure: bool,
        config: SessionConfig,
    ) -> (CaptureSession, Arc<MockTerminator>) {
        let terminator = Arc::new(MockTerminator::default());
        let frames = Arc::clone(recorder);
        let errors = Arc::clone(recorder);

        let session = CaptureSession::builder(SourceId::Window(7), Arc::clone(backend) as Arc<dyn CaptureBackend>)
            .on_frame(move |_frame| {
                frames.frames.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |err| errors.errors.lock().push(err))
            .exit_on_stream_failure(exit_on_stream_failure)
            .terminator(Arc::clone(&terminator) as Arc<dyn ProcessTerminator>)
            .config(config)
            .build();

        (session, terminator)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..2_000 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached");
    }

    // === Construction and start ===

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let backend = ScriptedBackend::new();
        let session = CaptureSession::new(
            SourceId::Display(1),
            backend,
            |_frame| {},
            |_err| {},
            false,
        );

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.source(), SourceId::Display(1));
        assert_eq!(session.frame_count(), 0);
        assert_eq!(session.restart_count(), 0);
        assert!(session.last_frame_time().is_none());
        assert!(!session.is_healthy());
    }

    #[tokio::test]
    async fn test_start_reaches_running_and_is_idempotent() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        assert_eq!(session.state(), SessionState::Running);

        session.start_capture().await;
        assert_eq!(backend.opens(), 1);
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_running_without_frames_is_unhealthy() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        assert!(!session.is_healthy());
    }

    // === Frame delivery ===

    #[tokio::test]
    async fn test_frame_count_updated_before_callback() {
        let backend = ScriptedBackend::new();
        let handle: Arc<OnceLock<CaptureSession>> = Arc::new(OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let session = {
            let handle = Arc::clone(&handle);
            let seen = Arc::clone(&seen);
            CaptureSession::builder(SourceId::Window(3), Arc::clone(&backend) as Arc<dyn CaptureBackend>)
                .on_frame(move |_frame| {
                    if let Some(session) = handle.get() {
                        seen.lock().push(session.frame_count());
                    }
                })
                .build()
        };
        let _ = handle.set(session.clone());

        session.start_capture().await;
        backend.emit_frame();
        backend.emit_frame();
        backend.emit_frame();

        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_callback_panic_is_isolated() {
        let backend = ScriptedBackend::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let session = {
            let calls = Arc::clone(&calls);
            CaptureSession::builder(SourceId::Window(3), Arc::clone(&backend) as Arc<dyn CaptureBackend>)
                .on_frame(move |_frame| {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("consumer exploded");
                    }
                })
                .build()
        };

        session.start_capture().await;
        backend.emit_frame();
        backend.emit_frame();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.frame_count(), 2);
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.restart_count(), 0);
    }

    // === Health scenario ===

    #[tokio::test(start_paused = true)]
    async fn test_health_through_interruption_and_recovery() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let config = SessionConfig {
            staleness_threshold: Duration::from_secs(5),
            ..SessionConfig::default()
        };
        let (session, _) = build_session(&backend, &recorder, false, config);

        // t = 0
        session.start_capture().await;
        assert_eq!(session.state(), SessionState::Running);

        // t = 1
        tokio::time::advance(Duration::from_secs(1)).await;
        backend.emit_frame();
        assert_eq!(session.frame_count(), 1);
        assert!(session.is_healthy());

        // t = 7, no frame for six seconds
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!session.is_healthy());

        backend.emit_failure("stream interrupted");
        assert_eq!(recorder.interrupted_count(), 1);
        assert_eq!(session.restart_count(), 1);
        assert_eq!(session.state(), SessionState::Restarting);

        // t = 7.2
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(session.state(), SessionState::Running);

        // t = 7.5
        tokio::time::advance(Duration::from_millis(300)).await;
        backend.emit_frame();
        assert!(session.is_healthy());
        assert_eq!(session.frame_count(), 2);
        assert_eq!(recorder.frames(), 2);
        assert_eq!(recorder.errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_at_is_deterministic() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        backend.emit_frame();
        let at = Instant::now() + Duration::from_secs(3);

        assert_eq!(session.health_at(at), session.health_at(at));
        assert!(session.health_at(at).is_healthy);
        assert!(!session.health_at(at + Duration::from_secs(3)).is_healthy);
    }

    // === Stop ===

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_stop_waits_for_running_callback_without_stalling_worker() {
        let backend = ScriptedBackend::new();
        let entered = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let session = {
            let entered = Arc::clone(&entered);
            let finished = Arc::clone(&finished);
            CaptureSession::builder(SourceId::Window(2), Arc::clone(&backend) as Arc<dyn CaptureBackend>)
                .on_frame(move |_frame| {
                    entered.store(true, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(300));
                    finished.store(true, Ordering::SeqCst);
                })
                .build()
        };
        session.start_capture().await;

        let emitter = {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || backend.emit_frame())
        };
        while !entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        let stopper = {
            let session = session.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                session.stop_capture().await;
                finished.load(Ordering::SeqCst)
            })
        };

        assert!(stopper.await.unwrap(), "stop returned while the callback was running");
        ticker.abort();
        emitter.join().unwrap();

        // The only worker kept running other tasks while stop waited
        assert!(ticks.load(Ordering::SeqCst) >= 3);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.frame_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_silences_callbacks() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        backend.emit_frame();
        let stale = backend.events();

        session.stop_capture().await;
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop_capture().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(backend.closes(), 1);

        stale.on_frame(FrameSample::new(vec![1], 1, 1));
        stale.on_failure(FailureEvent::interrupted("late"));
        settle().await;

        assert_eq!(recorder.frames(), 1);
        assert_eq!(session.frame_count(), 1);
        assert!(recorder.errors().is_empty());
        assert_eq!(session.restart_count(), 0);
        assert!(!session.is_healthy());
    }

    #[tokio::test]
    async fn test_stop_from_idle() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.stop_capture().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(backend.closes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_backoff() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        backend.emit_failure("first");
        settle().await;
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(backend.opens(), 2);

        // Second consecutive failure waits out a backoff
        backend.emit_failure("second");
        assert_eq!(session.state(), SessionState::Restarting);
        assert!(session.diagnostic_report().restart_pending);

        session.stop_capture().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(backend.opens(), 2);
        assert_eq!(session.restart_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_in_flight_start() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::Hang);
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        let starter = {
            let session = session.clone();
            tokio::spawn(async move { session.start_capture().await })
        };
        settle().await;
        assert_eq!(session.state(), SessionState::Starting);

        session.stop_capture().await;
        starter.await.unwrap();

        assert_eq!(session.state(), SessionState::Stopped);
        assert!(recorder.errors().is_empty());
        assert_eq!(session.restart_count(), 0);
    }

    #[tokio::test]
    async fn test_session_can_start_again_after_stop() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        backend.emit_frame();
        session.stop_capture().await;
        session.start_capture().await;
        backend.emit_frame();

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.frame_count(), 2);
        assert_eq!(backend.opens(), 2);
    }

    // === Restart ===

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_restart_requests_are_coalesced() {
        let backend = ScriptedBackend::new();
        backend.set_open_delay(Duration::from_secs(1));
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        assert_eq!(session.state(), SessionState::Running);

        tokio::join!(session.restart_capture(), session.restart_capture());

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.restart_count(), 1);
        assert_eq!(backend.opens(), 2);
        assert_eq!(backend.closes(), 1);
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_ignored_when_not_running() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.restart_capture().await;
        assert_eq!(session.state(), SessionState::Idle);

        session.start_capture().await;
        session.stop_capture().await;
        session.restart_capture().await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.restart_count(), 0);
        assert_eq!(backend.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_restart_does_not_consume_budget() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, config_with_budget(1));

        session.start_capture().await;
        session.restart_capture().await;
        session.restart_capture().await;
        assert_eq!(session.restart_count(), 2);
        assert_eq!(session.diagnostic_report().restarts_in_window, 0);

        // The single automatic restart is still available
        backend.emit_failure("blip");
        settle().await;
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(recorder.exhausted_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_after_restart_resets_failure_streak() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        backend.emit_failure("blip");
        settle().await;
        assert_eq!(session.diagnostic_report().consecutive_failures, 1);

        backend.emit_frame();
        let report = session.diagnostic_report();
        assert_eq!(report.consecutive_failures, 0);
        assert_eq!(report.restart_count, 1);
        assert_eq!(report.next_backoff_ms, 0);
    }

    #[tokio::test]
    async fn test_transient_start_failure_is_retried() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::RejectTransient);
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        assert_eq!(session.state(), SessionState::Restarting);
        assert_eq!(recorder.interrupted_count(), 1);

        backend.set_mode(OpenMode::Accept);
        settle().await;

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.restart_count(), 1);
        assert_eq!(backend.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_timeout_counts_as_failure() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::Hang);
        let recorder = Arc::new(Recorder::default());
        let config = SessionConfig {
            start_timeout: Duration::from_secs(1),
            ..config_with_budget(1)
        };
        let (session, _) = build_session(&backend, &recorder, false, config);

        session.start_capture().await;
        wait_until(|| session.state() == SessionState::Stopped).await;

        let errors = recorder.errors();
        assert_eq!(recorder.interrupted_count(), 2);
        assert!(errors[0].to_string().contains("did not confirm"));
        assert_eq!(recorder.exhausted_count(), 1);
        assert_eq!(session.restart_count(), 1);
    }

    // === Terminal failures and escalation ===

    #[tokio::test]
    async fn test_unavailable_source_is_terminal() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::RejectUnavailable);
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        settle().await;

        assert_eq!(session.state(), SessionState::Stopped);
        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            SessionError::SourceUnavailable { target: SourceId::Window(7), .. }
        ));
        assert_eq!(session.restart_count(), 0);
        assert_eq!(backend.opens(), 1);
    }

    #[tokio::test]
    async fn test_source_lost_is_terminal() {
        let backend = ScriptedBackend::new();
        let recorder = Arc::new(Recorder::default());
        let (session, _) = build_session(&backend, &recorder, false, SessionConfig::default());

        session.start_capture().await;
        backend
            .events()
            .on_failure(FailureEvent::source_lost("window closed"));
        backend.emit_failure("after the fact");
        settle().await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(recorder.errors().len(), 1);
        assert!(recorder.errors()[0].is_terminal());
        assert_eq!(backend.closes(), 1);
        assert_eq!(session.restart_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_stops_session() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::FailAfterStart);
        let recorder = Arc::new(Recorder::default());
        let (session, terminator) = build_session(&backend, &recorder, false, config_with_budget(3));

        session.start_capture().await;
        wait_until(|| session.state() == SessionState::Stopped).await;
        settle().await;

        assert_eq!(session.restart_count(), 3);
        assert_eq!(backend.opens(), 4);
        assert_eq!(recorder.interrupted_count(), 4);
        assert_eq!(recorder.exhausted_count(), 1);
        assert!(matches!(
            recorder.errors().last(),
            Some(SessionError::RestartExhausted { restarts: 3, .. })
        ));
        assert!(terminator.codes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_terminates_process_when_enabled() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::FailAfterStart);
        let recorder = Arc::new(Recorder::default());
        let (session, terminator) = build_session(&backend, &recorder, true, config_with_budget(3));

        session.start_capture().await;
        wait_until(|| !terminator.codes.lock().is_empty()).await;
        settle().await;

        assert_eq!(*terminator.codes.lock(), vec![ESCALATION_EXIT_CODE]);
        assert_eq!(session.restart_count(), 3);
        assert_eq!(backend.opens(), 4);
        assert_eq!(recorder.exhausted_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalation_without_terminator_stops() {
        let backend = ScriptedBackend::new();
        backend.set_mode(OpenMode::FailAfterStart);
        let session = CaptureSession::builder(SourceId::Window(1), Arc::clone(&backend) as Arc<dyn CaptureBackend>)
            .exit_on_stream_failure(true)
            .config(config_with_budget(1))
            .build();

        session.start_capture().await;
        wait_until(|| session.state() == SessionState::Stopped).await;
        assert_eq!(session.restart_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalation_threshold_under_varied_budgets_and_timing() {
        let timings = [
            (Duration::from_millis(500), Duration::from_secs(30), Duration::from_secs(60)),
            (Duration::from_millis(100), Duration::from_secs(1), Duration::from_secs(5)),
            (Duration::from_secs(2), Duration::from_secs(10), Duration::from_secs(10)),
        ];

        for max_restarts in [1u32, 3, 8, 12] {
            for (initial_backoff, max_backoff, window) in timings {
                let backend = ScriptedBackend::new();
                backend.set_mode(OpenMode::FailAfterStart);
                let recorder = Arc::new(Recorder::default());
                let config = SessionConfig {
                    restart: RestartConfig {
                        max_restarts,
                        window,
                        initial_backoff,
                        max_backoff,
                    },
                    ..SessionConfig::default()
                };
                let (session, terminator) = build_session(&backend, &recorder, true, config);
                let label = format!(
                    "budget {} backoff {:?}..{:?} window {:?}",
                    max_restarts, initial_backoff, max_backoff, window
                );

                session.start_capture().await;
                for _ in 0..3_600 {
                    if !terminator.codes.lock().is_empty() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                settle().await;

                assert_eq!(*terminator.codes.lock(), vec![ESCALATION_EXIT_CODE], "{}", label);
                assert_eq!(session.state(), SessionState::Stopped, "{}", label);
                assert_eq!(session.restart_count(), max_restarts, "{}", label);
                assert_eq!(backend.opens(), max_restarts as usize + 1, "{}", label);
                assert_eq!(recorder.exhausted_count(), 1, "{}", label);
                assert!(
                    matches!(
                        recorder.errors().last(),
                        Some(SessionError::RestartExhausted { restarts, .. }) if *restarts == max_restarts
                    ),
                    "{}",
                    label
                );
            }
        }
    }

    // === Diagnostics ===

    #[tokio::test]
    async fn test_log_diagnostic_state_emits_without_mutating() {
        let backend = ScriptedBackend::new();
        let sink = Arc::new(RecordingSink::default());
        let session = CaptureSession::builder(SourceId::Window(9), Arc::clone(&backend) as Arc<dyn CaptureBackend>)
            .diagnostics(Arc::clone(&sink) as Arc<dyn DiagnosticSink>)
            .build();

        session.start_capture().await;
        backend.emit_frame();
        let before = session.diagnostic_report();

        session.log_diagnostic_state();
        session.log_diagnostic_state();

        let reports = sink.reports.lock().clone();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].source, SourceId::Window(9));
        assert_eq!(reports[0].state, SessionState::Running);
        assert_eq!(reports[0].frame_count, 1);
        assert_eq!(session.frame_count(), before.frame_count);
        assert_eq!(session.state(), before.state);
    }

    #[tokio::test]
    async fn test_diagnostic_report_before_start() {
        let backend = ScriptedBackend::new();
        let session = CaptureSession::builder(SourceId::Display(2), backend).build();

        let report = session.diagnostic_report();
        assert_eq!(report.state, SessionState::Idle);
        assert!(report.since_last_frame_ms.is_none());
        assert!(!report.restart_pending);
        assert_eq!(report.max_restarts, 5);
        assert!(report.to_string().contains("last frame:           never"));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic payload");
    }
}
