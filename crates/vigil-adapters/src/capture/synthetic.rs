//! Synthetic capture backend
//!
//! Produces generated frames at a fixed rate on a tokio task per stream.
//! Faults can be injected per stream so restart and escalation paths can be
//! exercised without a real display.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vigil_core::ports::capture::{
    BackendError, CaptureBackend, FailureEvent, FrameSample, SourceId, StreamEvents, StreamHandle,
};

/// Behaviour of the synthetic backend
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub frame_interval: Duration,
    /// Interrupt each stream after this many frames
    pub fail_every: Option<u64>,
    /// Interrupt each stream right after it starts
    pub fail_on_start: bool,
    /// Sources that reject `open` as unavailable
    pub unavailable: Vec<SourceId>,
    /// Delay before `open` confirms the stream
    pub start_delay: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            frame_interval: Duration::from_millis(33),
            fail_every: None,
            fail_on_start: false,
            unavailable: Vec::new(),
            start_delay: Duration::ZERO,
        }
    }
}

impl SyntheticConfig {
    /// Frame interval for the given rate; zero is treated as one frame per second
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.frame_interval = Duration::from_secs(1) / fps.max(1);
        self
    }

    pub fn with_fail_every(mut self, frames: Option<u64>) -> Self {
        self.fail_every = frames.filter(|n| *n > 0);
        self
    }
}

struct StreamWorker {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Capture backend generating frames in-process
pub struct SyntheticBackend {
    config: SyntheticConfig,
    next_handle: AtomicU64,
    streams: Mutex<HashMap<StreamHandle, StreamWorker>>,
    opened: AtomicU64,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            next_handle: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
            opened: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Streams opened since creation
    pub fn streams_opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams currently open
    pub fn active_streams(&self) -> usize {
        self.streams.lock().len()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn open(
        &self,
        source: SourceId,
        events: Arc<dyn StreamEvents>,
    ) -> Result<StreamHandle, BackendError> {
        if self.config.unavailable.contains(&source) {
            return Err(BackendError::SourceUnavailable(format!(
                "{} is not available",
                source
            )));
        }

        if !self.config.start_delay.is_zero() {
            tokio::time::sleep(self.config.start_delay).await;
        }

        let handle = StreamHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run_stream(
            handle,
            self.config.clone(),
            events,
            Arc::clone(&running),
        ));

        self.streams.lock().insert(handle, StreamWorker { running, task });
        self.opened.fetch_add(1, Ordering::SeqCst);

        info!(
            %source,
            stream = %handle,
            "Synthetic stream started ({}x{} every {:?})",
            self.config.width,
            self.config.height,
            self.config.frame_interval
        );
        Ok(handle)
    }

    async fn close(&self, handle: StreamHandle) -> Result<(), BackendError> {
        let worker = self
            .streams
            .lock()
            .remove(&handle)
            .ok_or_else(|| BackendError::CloseFailed(format!("unknown {}", handle)))?;

        worker.running.store(false, Ordering::SeqCst);
        worker.task.abort();
        // Returns once the task can no longer deliver events
        let _ = worker.task.await;

        debug!(stream = %handle, "Synthetic stream closed");
        Ok(())
    }
}

impl Drop for SyntheticBackend {
    fn drop(&mut self) {
        for (_, worker) in self.streams.lock().drain() {
            worker.running.store(false, Ordering::SeqCst);
            worker.task.abort();
        }
    }
}

async fn run_stream(
    handle: StreamHandle,
    config: SyntheticConfig,
    events: Arc<dyn StreamEvents>,
    running: Arc<AtomicBool>,
) {
    if config.fail_on_start {
        events.on_failure(FailureEvent::interrupted(format!(
            "synthetic fault on start of {}",
            handle
        )));
        return;
    }

    let mut ticker = tokio::time::interval(config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    let mut sequence: u64 = 0;
    loop {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        sequence += 1;
        events.on_frame(FrameSample::new(
            render_frame(sequence, config.width, config.height),
            config.width,
            config.height,
        ));

        if config.fail_every.map_or(false, |n| sequence % n == 0) {
            events.on_failure(FailureEvent::interrupted(format!(
                "synthetic fault after {} frames",
                sequence
            )));
            break;
        }
    }

    debug!(stream = %handle, frames = sequence, "Synthetic stream loop ended");
}

/// RGBA frame whose intensity follows the sequence number
fn render_frame(sequence: u64, width: u32, height: u32) -> Vec<u8> {
    let shade = (sequence % 256) as u8;
    let pixels = width as usize * height as usize;
    let mut data = Vec::with_capacity(pixels * 4);
    for _ in 0..pixels {
        data.extend_from_slice(&[shade, shade / 2, 255 - shade, 255]);
    }
    data
}
