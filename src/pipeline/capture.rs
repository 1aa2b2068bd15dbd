//! Capture bridge task - assembles blocks from the ring buffer, extracts
//! features, and appends records to the batch buffer.
//!
//! The bridge sits between two timing domains: the audio callback pushes raw
//! samples at driver cadence, and this task polls at half the block period.
//! When an append raises the size threshold, the bridge requests a flush
//! over the worker's channel with `try_send`, so the capture path never
//! blocks on database I/O.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::buffer::BatchBuffer;
use crate::config::MonitorConfig;
use crate::event::{EventCallback, MonitorEvent};
use crate::features::FeatureExtractor;
use crate::pipeline::block::BlockBuffer;
use crate::pipeline::FlushRequest;
use crate::record::FeatureRecord;
use crate::session::MonitorState;

/// Shared wiring handed to the capture bridge.
pub struct CaptureContext {
    /// Pipeline configuration.
    pub config: MonitorConfig,
    /// The batch buffer shared with the flush worker.
    pub buffer: Arc<BatchBuffer>,
    /// Request channel into the flush worker.
    pub flush_tx: mpsc::Sender<FlushRequest>,
    /// Shared session state and counters.
    pub state: Arc<MonitorState>,
    /// Optional callback for runtime events.
    pub event_callback: Option<EventCallback>,
}

/// Reads blocks from the capture ring buffer and turns them into records.
pub struct CaptureBridge {
    blocks: BlockBuffer,
    extractor: FeatureExtractor,
    ctx: CaptureContext,
    poll_interval: Duration,
}

impl CaptureBridge {
    /// Creates a capture bridge over a ring buffer consumer.
    pub fn new(consumer: ringbuf::HeapCons<i16>, ctx: CaptureContext) -> Self {
        let block_size = ctx.config.block_size();
        tracing::info!(
            sensor_id = %ctx.config.sensor_id,
            location_id = %ctx.config.location_id,
            sample_rate = ctx.config.sample_rate,
            block_size,
            "capture bridge starting"
        );

        // Poll at half the block duration for responsiveness.
        let poll_interval = ctx.config.block_duration / 2;

        Self {
            blocks: BlockBuffer::new(consumer, block_size),
            extractor: FeatureExtractor::new(ctx.config.sample_rate, block_size),
            ctx,
            poll_interval,
        }
    }

    /// Runs the bridge until the session stops, then drains remaining
    /// complete blocks.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.poll_interval);

        while self.ctx.state.running.load(Ordering::SeqCst) {
            interval.tick().await;

            while let Some(block) = self.blocks.try_read_block() {
                self.process_block(&block);
            }
        }

        for block in self.blocks.drain() {
            self.process_block(&block);
        }
        tracing::debug!("capture bridge stopped");
    }

    /// Extracts features from one block and appends the record.
    ///
    /// A bad block is skipped and logged; a single block must never
    /// terminate the capture loop.
    fn process_block(&mut self, block: &[i16]) {
        if block.is_empty() {
            tracing::warn!("skipping empty capture block");
            self.emit_event(MonitorEvent::BlockSkipped {
                reason: "empty block".to_string(),
            });
            return;
        }

        let features = self.extractor.extract(block);
        let record = FeatureRecord::new(
            self.ctx.config.sensor_id.clone(),
            self.ctx.config.location_id.clone(),
            features.decibel_level,
            features.bands,
        );

        let threshold_reached = self.ctx.buffer.append(record);
        self.ctx.state.blocks_processed.fetch_add(1, Ordering::SeqCst);
        self.ctx.state.records_buffered.fetch_add(1, Ordering::SeqCst);

        if threshold_reached {
            // A full channel means a flush is already pending; dropping the
            // request keeps the capture path non-blocking.
            let _ = self.ctx.flush_tx.try_send(FlushRequest::Threshold);
        }
    }

    fn emit_event(&self, event: MonitorEvent) {
        if let Some(ref callback) = self.ctx.event_callback {
            callback(event);
        }
    }
}

/// Spawns the capture bridge as a background task.
pub fn spawn_capture_bridge(
    consumer: ringbuf::HeapCons<i16>,
    ctx: CaptureContext,
) -> JoinHandle<()> {
    let bridge = CaptureBridge::new(consumer, ctx);
    tokio::spawn(bridge.run())
}
