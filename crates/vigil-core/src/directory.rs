//! Data directory layout
//!
//! `~/.vigil/` holds the config file, rolling logs and the latest diagnostic
//! snapshot written by `vigil watch`.

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::error::ConfigError;

const SUBDIRECTORIES: &[&str] = &["logs", "diagnostics"];

/// File name of the most recent diagnostic snapshot
pub const DIAGNOSTICS_SNAPSHOT_FILE: &str = "latest.json";

/// Directory permission mode (owner read/write/execute only)
#[cfg(unix)]
const DIR_PERMISSION_MODE: u32 = 0o700;

/// Resolves and creates the Vigil data directory
#[derive(Debug, Clone)]
pub struct DirectoryManager {
    data_dir: PathBuf,
}

impl DirectoryManager {
    /// Creates a new DirectoryManager with the specified data directory
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Uses `~/.vigil/`
    pub fn with_default_dir() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vigil");
        Self::new(data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.data_dir.join("diagnostics")
    }

    /// Where the latest diagnostic report is written as JSON
    pub fn diagnostics_snapshot_path(&self) -> PathBuf {
        self.diagnostics_dir().join(DIAGNOSTICS_SNAPSHOT_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// Creates the data directory and its subdirectories, owner-only on Unix
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if directory creation fails
    pub fn initialize(&self) -> Result<(), ConfigError> {
        self.create_directory_with_permissions(&self.data_dir)?;
        for subdir in SUBDIRECTORIES {
            let path = self.data_dir.join(subdir);
            self.create_directory_with_permissions(&path)?;
        }

        tracing::debug!("Data directory ready at {:?}", self.data_dir);
        Ok(())
    }

    fn create_directory_with_permissions(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            fs::create_dir_all(path)?;
            tracing::debug!("Created directory: {:?}", path);
        }

        #[cfg(unix)]
        self.set_unix_permissions(path)?;
        Ok(())
    }

    #[cfg(unix)]
    fn set_unix_permissions(&self, path: &Path) -> Result<(), ConfigError> {
        let permissions = fs::Permissions::from_mode(DIR_PERMISSION_MODE);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir.exists()
            && SUBDIRECTORIES
                .iter()
                .all(|subdir| self.data_dir.join(subdir).exists())
    }

    /// Writes `contents` to the diagnostic snapshot file, replacing it atomically
    pub fn write_diagnostics_snapshot(&self, contents: &str) -> Result<PathBuf, ConfigError> {
        let path = self.diagnostics_snapshot_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}
