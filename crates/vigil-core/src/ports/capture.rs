//! Capture backend port definition
//!
//! The backend is the opaque producer of frames for a window or display.
//! The core opens and closes streams through [`CaptureBackend`] and receives
//! frames and failures through the [`StreamEvents`] sink it hands over on open.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// Identifies the on-screen source a session captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    /// A single window, by platform window id
    Window(u32),
    /// A whole display, by platform display id
    Display(u32),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Window(id) => write!(f, "window:{}", id),
            SourceId::Display(id) => write!(f, "display:{}", id),
        }
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid source '{}': expected window:<id> or display:<id>", s))?;
        let id: u32 = id
            .trim()
            .parse()
            .map_err(|e| format!("Invalid source id '{}': {}", id, e))?;

        match kind.trim().to_lowercase().as_str() {
            "window" => Ok(SourceId::Window(id)),
            "display" => Ok(SourceId::Display(id)),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque handle to an open backend stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// A single captured frame
///
/// The core never inspects `data`; it is passed through to the consumer
/// and not retained afterwards.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Raw frame buffer
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Arrival time of the frame
    pub captured_at: Instant,
}

impl FrameSample {
    /// Creates a frame stamped with the current time
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }
}

/// Kind of failure reported by a running stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient stream failure; the stream can be reopened
    Interrupted,
    /// The captured source went away (window closed, display unplugged)
    SourceLost,
}

/// Failure surfaced by the backend for a running stream
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub kind: FailureKind,
    pub reason: String,
    pub timestamp: Instant,
}

impl FailureEvent {
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Interrupted,
            reason: reason.into(),
            timestamp: Instant::now(),
        }
    }

    pub fn source_lost(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::SourceLost,
            reason: reason.into(),
            timestamp: Instant::now(),
        }
    }
}

/// Errors returned by backend open/close calls
#[derive(Debug, Error)]
pub enum BackendError {
    /// The source id does not name anything capturable
    #[error("Capture source unavailable: {0}")]
    SourceUnavailable(String),

    /// Screen recording permission was denied
    #[error("Screen recording permission denied")]
    PermissionDenied,

    /// The stream could not be started
    #[error("Stream failed to start: {0}")]
    StartFailed(String),

    /// The stream could not be torn down cleanly
    #[error("Stream failed to close: {0}")]
    CloseFailed(String),
}

impl BackendError {
    /// Whether retrying the same source can never succeed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackendError::SourceUnavailable(_) | BackendError::PermissionDenied
        )
    }
}

/// Event sink implemented by the core, fed by the backend
///
/// Backends may call these from any thread. Calls must be made in arrival
/// order for a given stream.
pub trait StreamEvents: Send + Sync {
    fn on_frame(&self, frame: FrameSample);
    fn on_failure(&self, event: FailureEvent);
}

/// Port for a platform capture mechanism
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Opens a stream for `source`, delivering into `events`
    ///
    /// Resolving `Ok` confirms the stream has started. The future may be
    /// dropped before it resolves when the session is stopped or the start
    /// times out; the backend must then release anything it began setting up.
    async fn open(
        &self,
        source: SourceId,
        events: Arc<dyn StreamEvents>,
    ) -> Result<StreamHandle, BackendError>;

    /// Tears down a stream; no events may be delivered for it afterwards
    async fn close(&self, handle: StreamHandle) -> Result<(), BackendError>;
}
