//! Logging setup for Vigil
//!
//! One subscriber per process: a daily-rolling file in the data directory,
//! optionally mirrored to stdout. The filter is built from the `[logging]`
//! config section unless `RUST_LOG` is set.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::ports::capture::SourceId;

/// Log file name inside the logs directory
pub const DEFAULT_LOG_FILE: &str = "vigil.log";

/// Crates covered by the configured level
const LOG_TARGETS: &[&str] = &["vigil", "vigil_core", "vigil_adapters"];

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(String),

    #[error("Invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Failed to initialize logger: {0}")]
    InitializationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Verbosity applied to the Vigil crates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Everything `init_logger` needs, resolved from config and CLI flags
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub level: LogLevel,
    pub log_to_stdout: bool,
    /// Extra `EnvFilter` directives, e.g. `vigil_core::session=trace`
    pub directives: Vec<String>,
}

impl LoggerConfig {
    pub fn new(log_dir: PathBuf) -> Self {
        Self {
            log_dir,
            level: LogLevel::default(),
            log_to_stdout: false,
            directives: Vec::new(),
        }
    }

    /// Takes level, stdout mirroring and directives from `[logging]`
    pub fn from_settings(log_dir: PathBuf, settings: &LoggingConfig) -> Self {
        Self {
            log_dir,
            level: settings.level,
            log_to_stdout: settings.stdout,
            directives: settings.directives.clone(),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join(DEFAULT_LOG_FILE)
    }

    /// Filter directives: the level for every Vigil crate, then the extras
    ///
    /// Later directives for the same target win, so extras can narrow or
    /// widen a single module.
    pub fn filter_directives(&self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .chain(self.directives.iter().cloned())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Builds the filter from config, ignoring `RUST_LOG`
    pub fn build_filter(&self) -> Result<EnvFilter, LoggerError> {
        validate_directives(&self.directives)?;
        EnvFilter::try_new(self.filter_directives())
            .map_err(|e| LoggerError::InitializationFailed(e.to_string()))
    }
}

/// Checks each directive on its own so errors name the offending entry
pub fn validate_directives(directives: &[String]) -> Result<(), LoggerError> {
    for directive in directives {
        EnvFilter::try_new(directive).map_err(|e| LoggerError::InvalidDirective {
            directive: directive.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Keeps the non-blocking writer alive; buffered lines flush on drop
pub struct LoggerGuard {
    log_file: PathBuf,
    _worker: tracing_appender::non_blocking::WorkerGuard,
}

impl LoggerGuard {
    /// Base path of the rolling log file (the date is appended per day)
    pub fn log_file(&self) -> &PathBuf {
        &self.log_file
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` replaces the configured filter when set.
///
/// # Errors
/// Fails on an invalid directive, when the log directory cannot be created,
/// or when a global subscriber is already installed.
pub fn init_logger(config: LoggerConfig) -> Result<LoggerGuard, LoggerError> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.build_filter()?,
    };

    fs::create_dir_all(&config.log_dir).map_err(|e| {
        LoggerError::DirectoryCreationFailed(format!("{}: {}", config.log_dir.display(), e))
    })?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, DEFAULT_LOG_FILE);
    let (writer, worker) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true);
    let stdout_layer = config
        .log_to_stdout
        .then(|| fmt::layer().with_writer(std::io::stdout).compact());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| LoggerError::InitializationFailed(e.to_string()))?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        filter = %config.filter_directives(),
        "Logger initialized"
    );

    Ok(LoggerGuard {
        log_file: config.log_file_path(),
        _worker: worker,
    })
}

/// Span that tags every event of one supervised session with its source
pub fn session_span(source: SourceId) -> tracing::Span {
    tracing::info_span!("capture_session", %source)
}

#[cfg(test)]
pub(crate) fn init_test_logger(level: LogLevel) {
    let filter = LoggerConfig::new(PathBuf::new())
        .with_level(level)
        .filter_directives();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}
