//! Vigil Core - capture session supervision
//!
//! Owns the lifecycle of a screen capture stream: starting and stopping it,
//! tracking its health, restarting it within a bounded budget and escalating
//! when the budget runs out. Platform capture mechanisms plug in through the
//! ports in [`ports`].

pub mod config;
pub mod diagnostics;
pub mod directory;
pub mod error;
pub mod health;
pub mod logging;
pub mod ports;
pub mod restart;
pub mod session;
pub mod source;
pub mod state;

// Re-export primary types for convenient access
pub use config::{
    get_default_config_path, load_config, load_config_from_path, Config, HealthConfig,
    LoggingConfig, RestartSettings, SessionSettings, StorageConfig,
};
pub use diagnostics::DiagnosticReport;
pub use directory::DirectoryManager;
pub use error::{ConfigError, SessionError, VigilError};
pub use health::{HealthMonitor, HealthSnapshot, DEFAULT_STALENESS_THRESHOLD};
pub use logging::{
    init_logger, session_span, validate_directives, LogLevel, LoggerConfig, LoggerError,
    LoggerGuard,
};
pub use ports::{
    BackendError, CaptureBackend, DiagnosticSink, FailureEvent, FailureKind, FrameSample,
    ProcessTerminator, SourceId, StreamEvents, StreamHandle, TracingDiagnosticSink,
    ESCALATION_EXIT_CODE,
};
pub use restart::{EscalationAction, RestartConfig, RestartDecision, RestartPolicy};
pub use session::{
    CaptureSession, CaptureSessionBuilder, ErrorCallback, FrameCallback, SessionConfig,
    DEFAULT_START_TIMEOUT, DEFAULT_STOP_TIMEOUT,
};
pub use source::CaptureSource;
pub use state::SessionState;
