//! Watch command
//!
//! Handles `vigil watch`: runs a supervised capture session against the
//! synthetic backend until interrupted, the optional duration elapses, or
//! the session gives up.

use anyhow::Result;
use clap::{ArgGroup, Args};
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use vigil_adapters::{ShutdownTerminator, SyntheticBackend, SyntheticConfig};
use tracing::Instrument;
use vigil_core::{session_span, CaptureBackend, CaptureSession, LogLevel, SessionError, SourceId};

use crate::app::{self, InitOptions};
use crate::snapshot;

/// Exit status when the session stopped on its own after a terminal error
const SESSION_FAILED_EXIT_CODE: u8 = 2;

#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["window", "display"])))]
pub struct WatchArgs {
    /// Capture the window with this id
    #[arg(long)]
    pub window: Option<u32>,

    /// Capture the display with this id
    #[arg(long)]
    pub display: Option<u32>,

    /// Synthetic frame rate
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Inject a stream failure after every N frames
    #[arg(long, value_name = "N")]
    pub fail_every: Option<u64>,

    /// Terminate the process once the restart budget is spent
    #[arg(long)]
    pub exit_on_failure: bool,

    /// Seconds between diagnostic snapshots
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub diagnostics_every: u64,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<LogLevel>,
}

impl WatchArgs {
    pub fn source(&self) -> Option<SourceId> {
        match (self.window, self.display) {
            (Some(id), _) => Some(SourceId::Window(id)),
            (None, Some(id)) => Some(SourceId::Display(id)),
            (None, None) => None,
        }
    }

    fn backend_config(&self) -> SyntheticConfig {
        SyntheticConfig::default()
            .with_fps(self.fps)
            .with_fail_every(self.fail_every)
    }
}

/// Why the watch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Interrupted,
    DurationElapsed,
    SessionFailed,
    ExitRequested(i32),
}

impl Outcome {
    fn status(self) -> u8 {
        match self {
            Outcome::Interrupted | Outcome::DurationElapsed => 0,
            Outcome::SessionFailed => SESSION_FAILED_EXIT_CODE,
            Outcome::ExitRequested(code) => u8::try_from(code).unwrap_or(1),
        }
    }
}

/// Run a supervised capture session in the foreground
pub async fn run(args: WatchArgs) -> Result<ExitCode> {
    let source = match args.source() {
        Some(source) => source,
        None => anyhow::bail!("Either --window or --display is required"),
    };
    let ctx = app::initialize(InitOptions::watch(args.log_level))?;
    let config = ctx.config();

    let backend: Arc<dyn CaptureBackend> = Arc::new(SyntheticBackend::new(args.backend_config()));
    let (terminator, mut exit_rx) = ShutdownTerminator::new();
    let exit_on_failure = args.exit_on_failure || config.restart.exit_on_stream_failure;

    let frames = Arc::new(AtomicU64::new(0));
    let frame_counter = Arc::clone(&frames);
    let failed = Arc::new(Notify::new());
    let failed_signal = Arc::clone(&failed);

    let session = CaptureSession::builder(source, backend)
        .on_frame(move |_frame| {
            frame_counter.fetch_add(1, Ordering::Relaxed);
        })
        .on_error(move |err| {
            eprintln!("capture error: {}", err);
            // An exhausted budget with exit enabled is reported through the terminator
            let escalates = exit_on_failure && matches!(err, SessionError::RestartExhausted { .. });
            if err.is_terminal() && !escalates {
                failed_signal.notify_one();
            }
        })
        .exit_on_stream_failure(exit_on_failure)
        .terminator(Arc::new(terminator))
        .config(config.session_config())
        .build();

    println!("Watching {} at {} fps", source, args.fps);
    println!("Data directory: {}", config.storage.data_dir.display());
    println!("Press Ctrl+C to stop");
    tracing::info!(%source, fps = args.fps, exit_on_failure, "Starting watch");

    session.start_capture().instrument(session_span(source)).await;

    let mut ticker =
        tokio::time::interval(Duration::from_secs(args.diagnostics_every.max(1)));
    ticker.tick().await;

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("\nReceived Ctrl+C, shutting down...");
                tracing::info!("Received Ctrl+C signal");
                break Outcome::Interrupted;
            }
            _ = &mut deadline => {
                tracing::info!("Watch duration elapsed");
                break Outcome::DurationElapsed;
            }
            changed = exit_rx.changed() => {
                let code = match changed {
                    Ok(()) => (*exit_rx.borrow()).unwrap_or(1),
                    Err(_) => 1,
                };
                tracing::error!(code, "Session requested process exit");
                break Outcome::ExitRequested(code);
            }
            _ = failed.notified() => {
                tracing::warn!("Session stopped after a terminal error");
                break Outcome::SessionFailed;
            }
            _ = ticker.tick() => {
                session.log_diagnostic_state();
                if let Err(e) = snapshot::write(ctx.directories(), session.diagnostic_report()) {
                    tracing::warn!("Failed to write diagnostic snapshot: {:#}", e);
                }
            }
        }
    };

    session.stop_capture().instrument(session_span(source)).await;

    let report = session.diagnostic_report();
    if let Err(e) = snapshot::write(ctx.directories(), report.clone()) {
        tracing::warn!("Failed to write final diagnostic snapshot: {:#}", e);
    }

    println!();
    println!("{}", report);
    println!();
    println!("Frames delivered: {}", frames.load(Ordering::Relaxed));
    tracing::info!(?outcome, frames = report.frame_count, "Watch finished");

    Ok(ExitCode::from(outcome.status()))
}
