//! Application initialization
//!
//! Loads configuration, prepares the data directory, installs the logger and
//! a panic hook that points the user at the log file.

use anyhow::{Context, Result};
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use vigil_core::{
    init_logger, load_config, Config, DirectoryManager, LogLevel, LoggerConfig, LoggerGuard,
};

/// Application context holding initialized components
pub struct AppContext {
    config: Arc<Config>,
    directories: DirectoryManager,
    #[allow(dead_code)]
    logger_guard: Option<LoggerGuard>,
}

impl AppContext {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn directories(&self) -> &DirectoryManager {
        &self.directories
    }
}

/// Application initialization options
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Whether to initialize the logger
    pub init_logger: bool,
    /// Whether to create the directory structure
    pub create_directories: bool,
    /// Log level override; the `[logging]` config section applies otherwise
    pub log_level: Option<LogLevel>,
}

impl InitOptions {
    /// Full initialization for a long-running watch
    pub fn watch(log_level: Option<LogLevel>) -> Self {
        Self {
            init_logger: true,
            create_directories: true,
            log_level,
        }
    }

    /// Minimal initialization for one-shot commands
    pub fn command() -> Self {
        Self {
            init_logger: false,
            create_directories: false,
            log_level: None,
        }
    }
}

/// Initializes the application from `~/.vigil/config.toml`
pub fn initialize(options: InitOptions) -> Result<AppContext> {
    let config = load_config().context("Failed to load configuration")?;
    initialize_with_config(config, options)
}

/// Initializes the application from an already loaded configuration
///
/// Order matters: directories first so the logger has somewhere to write,
/// then the logger, then the panic hook that refers to the log file.
pub fn initialize_with_config(config: Config, options: InitOptions) -> Result<AppContext> {
    let config = Arc::new(config);
    let directories = DirectoryManager::new(config.storage.data_dir.clone());

    if options.create_directories {
        directories
            .initialize()
            .context("Failed to create directory structure")?;
    }

    let logger_guard = if options.init_logger {
        let level = options.log_level.unwrap_or(config.logging.level);
        let logger_config =
            LoggerConfig::from_settings(directories.logs_dir(), &config.logging).with_level(level);
        let log_file = logger_config.log_file_path();

        let guard = init_logger(logger_config).context("Failed to initialize logger")?;
        setup_panic_hook(log_file);
        Some(guard)
    } else {
        None
    };

    Ok(AppContext {
        config,
        directories,
        logger_guard,
    })
}

/// Logs panics before handing over to the default hook
fn setup_panic_hook(log_file: PathBuf) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        error!("FATAL ERROR at {}: {}", location, message);

        eprintln!();
        eprintln!("vigil hit an internal error at {}: {}", location, message);
        eprintln!("Details are in {}", log_file.display());
        eprintln!();

        default_hook(panic_info);
    }));
}
