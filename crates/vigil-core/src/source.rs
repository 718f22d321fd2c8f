//! Capture source
//!
//! Binds a source id to the backend that captures it and tracks the stream
//! currently open for it. Only the session touches this.

use crate::ports::capture::{BackendError, CaptureBackend, SourceId, StreamEvents, StreamHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct CaptureSource {
    id: SourceId,
    backend: Arc<dyn CaptureBackend>,
    stream: Option<StreamHandle>,
}

impl CaptureSource {
    pub fn new(id: SourceId, backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            id,
            backend,
            stream: None,
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn stream(&self) -> Option<StreamHandle> {
        self.stream
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens a stream, waiting at most `timeout` for the backend to confirm it
    ///
    /// A backend that does not answer in time is reported as
    /// `BackendError::StartFailed`.
    pub async fn open(
        &mut self,
        events: Arc<dyn StreamEvents>,
        timeout: Duration,
    ) -> Result<StreamHandle, BackendError> {
        let handle = match tokio::time::timeout(timeout, self.backend.open(self.id, events)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BackendError::StartFailed(format!(
                    "backend did not confirm start within {:?}",
                    timeout
                )))
            }
        };

        debug!(source = %self.id, stream = %handle, "Stream opened");
        self.stream = Some(handle);
        Ok(handle)
    }

    /// Closes the current stream, if any
    ///
    /// Close errors and timeouts are logged; the handle is forgotten either way.
    /// Returns whether a stream was open.
    pub async fn close(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.stream.take() else {
            return false;
        };

        match tokio::time::timeout(timeout, self.backend.close(handle)).await {
            Ok(Ok(())) => debug!(source = %self.id, stream = %handle, "Stream closed"),
            Ok(Err(e)) => warn!(source = %self.id, stream = %handle, "Stream close failed: {}", e),
            Err(_) => warn!(
                source = %self.id,
                stream = %handle,
                "Stream close did not complete within {:?}",
                timeout
            ),
        }
        true
    }
}

impl std::fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSource")
            .field("id", &self.id)
            .field("stream", &self.stream)
            .finish()
    }
}
