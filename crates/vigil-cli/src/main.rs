//! Vigil CLI - supervised screen capture sessions
//!
//! Main entry point for the `vigil` binary.

mod app;
mod commands;
mod snapshot;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::watch::WatchArgs;

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Supervised screen capture sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a supervised capture session in the foreground
    Watch(WatchArgs),
    /// Show the latest diagnostic snapshot
    Status,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch(args) => commands::watch::run(args).await,
        Commands::Status => {
            commands::status::run()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            commands::config::run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
