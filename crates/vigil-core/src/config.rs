//! Configuration management for Vigil
//!
//! Handles loading and validation of TOML configuration files.

use crate::error::ConfigError;
use crate::restart::{
    RestartConfig, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RESTARTS,
    DEFAULT_RESTART_WINDOW,
};
use crate::session::{SessionConfig, DEFAULT_START_TIMEOUT, DEFAULT_STOP_TIMEOUT};
use crate::health::DEFAULT_STALENESS_THRESHOLD;
use crate::logging::{validate_directives, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Vigil
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Stream health settings
    #[serde(default)]
    pub health: HealthConfig,

    /// Automatic restart settings
    #[serde(default)]
    pub restart: RestartSettings,

    /// Stream start/stop settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Storage-related settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Health configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Gap since the last frame after which the stream is unhealthy (default: 5000)
    #[serde(default = "default_staleness_threshold_ms")]
    pub staleness_threshold_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_ms: default_staleness_threshold_ms(),
        }
    }
}

/// Restart configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestartSettings {
    /// Automatic restarts allowed per window (default: 5)
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Rolling window length in seconds (default: 60)
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Backoff before the second consecutive restart (default: 500)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap (default: 30000)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Terminate the process once the budget is spent (default: false)
    #[serde(default)]
    pub exit_on_stream_failure: bool,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            window_seconds: default_window_seconds(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            exit_on_stream_failure: false,
        }
    }
}

/// Session timing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Bound on waiting for the backend to confirm a start (default: 5000)
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,

    /// Bound on waiting for teardown (default: 5000)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            start_timeout_ms: default_start_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base data directory (default: ~/.vigil/)
    #[serde(
        default = "default_data_dir",
        deserialize_with = "deserialize_data_dir"
    )]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Level for all Vigil crates (default: info)
    #[serde(default)]
    pub level: LogLevel,

    /// Mirror log lines to stdout (default: false)
    #[serde(default)]
    pub stdout: bool,

    /// Extra filter directives such as `vigil_core::session=trace`
    #[serde(default)]
    pub directives: Vec<String>,
}

// Default value functions
fn default_staleness_threshold_ms() -> u64 {
    DEFAULT_STALENESS_THRESHOLD.as_millis() as u64
}

fn default_max_restarts() -> u32 {
    DEFAULT_MAX_RESTARTS
}

fn default_window_seconds() -> u64 {
    DEFAULT_RESTART_WINDOW.as_secs()
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF.as_millis() as u64
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF.as_millis() as u64
}

fn default_start_timeout_ms() -> u64 {
    DEFAULT_START_TIMEOUT.as_millis() as u64
}

fn default_stop_timeout_ms() -> u64 {
    DEFAULT_STOP_TIMEOUT.as_millis() as u64
}

fn default_data_dir() -> PathBuf {
    home_dir().join(".vigil")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Expands a leading tilde (~) to the home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Custom deserializer for data_dir that expands tilde
fn deserialize_data_dir<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path_str = String::deserialize(deserializer)?;
    Ok(expand_tilde(&PathBuf::from(path_str)))
}

impl Config {
    /// Validates the configuration values
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if:
    /// - any threshold, window or timeout is 0
    /// - `restart.max_restarts` is 0
    /// - `restart.initial_backoff_ms` exceeds `restart.max_backoff_ms`
    /// - a `logging.directives` entry is not a valid filter directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("staleness_threshold_ms", self.health.staleness_threshold_ms),
            ("window_seconds", self.restart.window_seconds),
            ("start_timeout_ms", self.session.start_timeout_ms),
            ("stop_timeout_ms", self.session.stop_timeout_ms),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!("{} must be > 0", name)));
            }
        }

        if self.restart.max_restarts == 0 {
            return Err(ConfigError::InvalidValue(
                "max_restarts must be > 0".to_string(),
            ));
        }

        if self.restart.initial_backoff_ms > self.restart.max_backoff_ms {
            return Err(ConfigError::InvalidValue(
                "initial_backoff_ms must not exceed max_backoff_ms".to_string(),
            ));
        }

        validate_directives(&self.logging.directives)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(())
    }

    /// Restart budget and backoff as used by the restart policy
    pub fn restart_config(&self) -> RestartConfig {
        RestartConfig {
            max_restarts: self.restart.max_restarts,
            window: Duration::from_secs(self.restart.window_seconds),
            initial_backoff: Duration::from_millis(self.restart.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.restart.max_backoff_ms),
        }
    }

    /// Full session configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            staleness_threshold: Duration::from_millis(self.health.staleness_threshold_ms),
            start_timeout: Duration::from_millis(self.session.start_timeout_ms),
            stop_timeout: Duration::from_millis(self.session.stop_timeout_ms),
            restart: self.restart_config(),
        }
    }
}

/// Returns the default configuration file path (`~/.vigil/config.toml`)
pub fn get_default_config_path() -> PathBuf {
    home_dir().join(".vigil").join("config.toml")
}

/// Loads configuration from the specified path
///
/// If the file doesn't exist, creates a default configuration file.
/// If the file is invalid or contains invalid values, returns default configuration.
///
/// # Errors
/// Only IO errors while reading or creating the file are returned.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let default_config = Config::default();
        let toml_str = toml::to_string_pretty(&default_config)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, &toml_str)?;

        tracing::info!("Created default configuration file at {:?}", path);
        return Ok(default_config);
    }

    let content = fs::read_to_string(path)?;

    let config: Config = match toml::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(
                "Failed to parse configuration file {:?}: {}. Using default configuration.",
                path,
                e
            );
            return Ok(Config::default());
        }
    };

    if let Err(e) = config.validate() {
        tracing::warn!(
            "Invalid configuration in {:?}: {}. Using default configuration.",
            path,
            e
        );
        return Ok(Config::default());
    }

    Ok(config)
}

/// Loads configuration from the default path (`~/.vigil/config.toml`)
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from_path(&get_default_config_path())
}
