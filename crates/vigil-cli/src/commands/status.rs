//! Status command
//!
//! Handles `vigil status`: shows the last diagnostic snapshot written by a
//! running or finished `vigil watch`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::app::{self, InitOptions};
use crate::snapshot::{self, Snapshot};

/// Show the latest diagnostic snapshot
pub fn run() -> Result<()> {
    let ctx = app::initialize(InitOptions::command())?;
    let path = ctx.directories().diagnostics_snapshot_path();

    println!("Vigil Status");
    println!("============");
    println!();

    match snapshot::read(&path)? {
        Some(snapshot) => {
            println!("{}", snapshot.report);
            println!();
            println!("Snapshot: {}", describe_age(&snapshot, Utc::now()));
        }
        None => {
            println!("No diagnostic snapshot at {}", path.display());
            println!("  Run 'vigil watch' to start a supervised capture session.");
        }
    }

    println!();
    println!("Configuration");
    println!("-------------");
    let config = ctx.config();
    println!("  Data directory: {}", config.storage.data_dir.display());
    println!(
        "  Restart budget: {} per {} seconds",
        config.restart.max_restarts, config.restart.window_seconds
    );
    println!(
        "  Staleness threshold: {} ms",
        config.health.staleness_threshold_ms
    );

    Ok(())
}

fn describe_age(snapshot: &Snapshot, now: DateTime<Utc>) -> String {
    match snapshot.written_at() {
        Some(written_at) => {
            let age = now.signed_duration_since(written_at).num_seconds().max(0);
            format!(
                "written {} ({} seconds ago)",
                written_at.format("%Y-%m-%d %H:%M:%S UTC"),
                age
            )
        }
        None => format!("written at unparseable time {:?}", snapshot.written_at),
    }
}
