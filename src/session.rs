//! Monitoring session management.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::MonitorError;
use crate::pipeline::FlushRequest;
use crate::sink::MetricsSink;
use crate::source::CaptureStream;

/// Statistics about a monitoring session.
#[derive(Debug, Clone, Default)]
pub struct MonitorStats {
    /// Capture blocks turned into records.
    pub blocks_processed: u64,
    /// Records appended to the batch buffer.
    pub records_buffered: u64,
    /// Records durably persisted.
    pub records_flushed: u64,
    /// Records dropped by failed flushes.
    pub records_lost: u64,
    /// Number of failed flushes.
    pub flush_failures: u64,
}

/// State shared between the session handle and its background tasks.
pub struct MonitorState {
    /// Cleared first during shutdown; tasks observe it and wind down.
    pub running: AtomicBool,
    /// Capture blocks turned into records.
    pub blocks_processed: AtomicU64,
    /// Records appended to the batch buffer.
    pub records_buffered: AtomicU64,
    /// Records durably persisted.
    pub records_flushed: AtomicU64,
    /// Records dropped by failed flushes.
    pub records_lost: AtomicU64,
    /// Number of failed flushes.
    pub flush_failures: AtomicU64,
}

impl MonitorState {
    /// Creates a running state with zeroed counters.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            blocks_processed: AtomicU64::new(0),
            records_buffered: AtomicU64::new(0),
            records_flushed: AtomicU64::new(0),
            records_lost: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running monitoring session.
///
/// Returned by [`MonitorBuilder::start()`]; capture and persistence run in
/// background tasks until [`stop()`](MonitorSession::stop) is called or the
/// session is dropped.
///
/// [`MonitorBuilder::start()`]: crate::MonitorBuilder::start
pub struct MonitorSession {
    state: Arc<MonitorState>,
    flush_tx: mpsc::Sender<FlushRequest>,
    capture_handle: Option<JoinHandle<()>>,
    flusher_handle: Option<JoinHandle<()>>,
    sink: Arc<dyn MetricsSink>,
    // Keep the capture stream alive - dropping it releases the device.
    capture_stream: Option<CaptureStream>,
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession").finish_non_exhaustive()
    }
}

impl MonitorSession {
    pub(crate) fn new(
        state: Arc<MonitorState>,
        flush_tx: mpsc::Sender<FlushRequest>,
        capture_handle: JoinHandle<()>,
        flusher_handle: JoinHandle<()>,
        sink: Arc<dyn MetricsSink>,
        capture_stream: Option<CaptureStream>,
    ) -> Self {
        Self {
            state,
            flush_tx,
            capture_handle: Some(capture_handle),
            flusher_handle: Some(flusher_handle),
            sink,
            capture_stream,
        }
    }

    /// Returns `true` if the session is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            blocks_processed: self.state.blocks_processed.load(Ordering::SeqCst),
            records_buffered: self.state.records_buffered.load(Ordering::SeqCst),
            records_flushed: self.state.records_flushed.load(Ordering::SeqCst),
            records_lost: self.state.records_lost.load(Ordering::SeqCst),
            flush_failures: self.state.flush_failures.load(Ordering::SeqCst),
        }
    }

    /// Gracefully stops the session.
    ///
    /// Shutdown order:
    /// 1. Stop accepting new audio blocks
    /// 2. Cancel the periodic flush trigger
    /// 3. Perform one final flush of residual records
    /// 4. Close the store connection
    /// 5. Release the audio device
    ///
    /// Idempotent: calling stop on an already-stopped session is a no-op.
    pub async fn stop(mut self) -> Result<(), MonitorError> {
        self.stop_internal().await;
        Ok(())
    }

    async fn stop_internal(&mut self) {
        if !self.state.running.swap(false, Ordering::SeqCst) {
            // Already stopped
            return;
        }

        // Capture bridge sees the cleared flag, drains remaining complete
        // blocks into the batch buffer, and exits.
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.await;
        }

        // Stop cancels the periodic trigger and performs the final flush.
        let _ = self.flush_tx.send(FlushRequest::Stop).await;
        if let Some(handle) = self.flusher_handle.take() {
            let _ = handle.await;
        }

        if let Err(error) = self.sink.close().await {
            tracing::warn!(%error, sink = self.sink.name(), "error closing sink");
        }

        // Release the audio device last; its callback was already cut off
        // from the pipeline when the bridge exited.
        self.capture_stream = None;

        let stats = self.stats();
        tracing::info!(
            flushed = stats.records_flushed,
            lost = stats.records_lost,
            "monitoring stopped"
        );
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        if self.state.running.load(Ordering::SeqCst) {
            // Dropped without explicit stop() - trigger best-effort cleanup.
            self.state.running.store(false, Ordering::SeqCst);
            let _ = self.flush_tx.try_send(FlushRequest::Stop);
        }
    }
}
