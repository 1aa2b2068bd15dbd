//! In-memory sink for testing the pipeline without a database.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SinkError;
use crate::record::FeatureRecord;
use crate::sink::MetricsSink;

/// A sink that records every flushed batch in process memory.
///
/// This allows testing the full pipeline (batching, flush triggers, shutdown
/// drain) without a running database. A failure can be injected to exercise
/// the flush-failure containment path.
///
/// # Example
///
/// ```
/// use soundscape_monitor::MemorySink;
///
/// let sink = MemorySink::new();
/// assert!(sink.batches().is_empty());
///
/// sink.set_failing(true); // next flushes will error
/// ```
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<FeatureRecord>>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every subsequent flush fails and stores nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a copy of every batch flushed so far, in flush order.
    pub fn batches(&self) -> Vec<Vec<FeatureRecord>> {
        self.batches.lock().clone()
    }

    /// Returns all persisted records in flush order, flattened.
    pub fn records(&self) -> Vec<FeatureRecord> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Total number of persisted records.
    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    /// Returns `true` if `close()` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn flush(&self, records: &[FeatureRecord]) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }
        if self.failing.load(Ordering::SeqCst) {
            // All-or-nothing: a failed flush stores none of the batch.
            return Err(SinkError::custom("injected failure"));
        }

        self.batches.lock().push(records.to_vec());
        Ok(records.len())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
