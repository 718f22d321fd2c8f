//! Process terminators used when a session escalates

use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;
use vigil_core::ports::terminator::ProcessTerminator;

/// Exits the process immediately
///
/// Destructors do not run, so buffered log lines may be lost. Prefer
/// [`ShutdownTerminator`] when a main loop can perform an orderly exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExitTerminator;

impl ProcessTerminator for ProcessExitTerminator {
    fn terminate(&self, exit_code: i32) {
        error!("Exiting process with code {}", exit_code);
        std::process::exit(exit_code);
    }
}

/// Receiver side of a [`ShutdownTerminator`]; yields the requested exit code
pub type ExitCodeReceiver = watch::Receiver<Option<i32>>;

/// Requests an orderly exit from the owner of the matching receiver
#[derive(Debug, Clone)]
pub struct ShutdownTerminator {
    tx: Arc<watch::Sender<Option<i32>>>,
}

impl ShutdownTerminator {
    pub fn new() -> (Self, ExitCodeReceiver) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, rx)
    }
}

impl ProcessTerminator for ShutdownTerminator {
    fn terminate(&self, exit_code: i32) {
        error!("Requesting process exit with code {}", exit_code);
        // The first request wins
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(exit_code);
            true
        });
    }
}
