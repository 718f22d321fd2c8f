//! Port definitions for Hexagonal Architecture
//!
//! These traits define the boundaries between the capture session and the
//! collaborators it drives: the platform capture backend, the process
//! terminator used for escalation, and the diagnostics logger.

pub mod capture;
pub mod diagnostics;
pub mod terminator;

pub use capture::{
    BackendError, CaptureBackend, FailureEvent, FailureKind, FrameSample, SourceId, StreamEvents,
    StreamHandle,
};
pub use diagnostics::{DiagnosticSink, TracingDiagnosticSink};
pub use terminator::{ProcessTerminator, ESCALATION_EXIT_CODE};
