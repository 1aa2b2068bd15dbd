//! The flush worker: a single task that serializes all flush executions.
//!
//! Two independent triggers converge here - a periodic interval and
//! size-threshold requests from the capture path. Because one task owns the
//! sink, flush executions can never overlap, and the union of flushed
//! batches preserves capture order.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::buffer::BatchBuffer;
use crate::event::{EventCallback, MonitorEvent};
use crate::session::MonitorState;
use crate::sink::MetricsSink;

/// Request sent to the flush worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushRequest {
    /// The batch buffer reached its size threshold.
    Threshold,
    /// Cancel the periodic trigger, perform one final flush, and exit.
    Stop,
}

/// Drains the batch buffer and hands batches to the sink.
///
/// A flush on an empty buffer is a no-op. A failed flush is logged, counted,
/// and its batch dropped - re-queueing would let the buffer grow without
/// bound during a sustained store outage.
pub struct FlushWorker {
    buffer: Arc<BatchBuffer>,
    sink: Arc<dyn MetricsSink>,
    interval: Duration,
    request_rx: mpsc::Receiver<FlushRequest>,
    state: Arc<MonitorState>,
    event_callback: Option<EventCallback>,
}

impl FlushWorker {
    /// Creates a flush worker.
    pub fn new(
        buffer: Arc<BatchBuffer>,
        sink: Arc<dyn MetricsSink>,
        interval: Duration,
        request_rx: mpsc::Receiver<FlushRequest>,
        state: Arc<MonitorState>,
        event_callback: Option<EventCallback>,
    ) -> Self {
        Self {
            buffer,
            sink,
            interval,
            request_rx,
            state,
            event_callback,
        }
    }

    /// Runs until a [`FlushRequest::Stop`] arrives or the request channel
    /// closes, then performs exactly one final flush.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the periodic
        // trigger actually waits one interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                request = self.request_rx.recv() => match request {
                    Some(FlushRequest::Threshold) => {
                        self.flush_once().await;
                    }
                    Some(FlushRequest::Stop) | None => break,
                },
            }
        }

        // Final drain of residual records before resources are released.
        self.flush_once().await;
        tracing::debug!("flush worker stopped");
    }

    /// Drains the buffer and flushes the batch, containing any sink error.
    async fn flush_once(&self) {
        let batch = self.buffer.drain_all();
        if batch.is_empty() {
            return;
        }

        match self.sink.flush(&batch).await {
            Ok(inserted) => {
                self.state
                    .records_flushed
                    .fetch_add(inserted as u64, Ordering::SeqCst);
                tracing::info!(records = inserted, sink = self.sink.name(), "flushed batch");
                self.emit_event(MonitorEvent::FlushCompleted { records: inserted });
            }
            Err(error) => {
                self.state
                    .records_lost
                    .fetch_add(batch.len() as u64, Ordering::SeqCst);
                self.state.flush_failures.fetch_add(1, Ordering::SeqCst);
                tracing::error!(
                    %error,
                    records = batch.len(),
                    sink = self.sink.name(),
                    "flush failed, dropping batch"
                );
                self.emit_event(MonitorEvent::FlushFailed {
                    error: error.to_string(),
                    records: batch.len(),
                });
            }
        }
    }

    fn emit_event(&self, event: MonitorEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

/// Spawns the flush worker as a background task.
pub fn spawn_flush_worker(
    buffer: Arc<BatchBuffer>,
    sink: Arc<dyn MetricsSink>,
    interval: Duration,
    request_rx: mpsc::Receiver<FlushRequest>,
    state: Arc<MonitorState>,
    event_callback: Option<EventCallback>,
) -> JoinHandle<()> {
    let worker = FlushWorker::new(buffer, sink, interval, request_rx, state, event_callback);
    tokio::spawn(worker.run())
}
