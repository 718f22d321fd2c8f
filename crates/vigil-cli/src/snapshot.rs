//! Diagnostic snapshots persisted between commands
//!
//! `vigil watch` writes the latest report to the data directory so that
//! `vigil status` can show it from another terminal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vigil_core::{DiagnosticReport, DirectoryManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// RFC 3339 time the snapshot was taken
    pub written_at: String,
    pub report: DiagnosticReport,
}

impl Snapshot {
    pub fn new(report: DiagnosticReport) -> Self {
        Self {
            written_at: Utc::now().to_rfc3339(),
            report,
        }
    }

    /// Parsed `written_at`, `None` if the file was edited by hand
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.written_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

pub fn write(directories: &DirectoryManager, report: DiagnosticReport) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(&Snapshot::new(report))
        .context("Failed to serialize diagnostic snapshot")?;
    directories
        .write_diagnostics_snapshot(&json)
        .context("Failed to write diagnostic snapshot")
}

/// Reads a snapshot, `Ok(None)` if none was written yet
pub fn read(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Malformed diagnostic snapshot {}", path.display()))?;
    Ok(Some(snapshot))
}
