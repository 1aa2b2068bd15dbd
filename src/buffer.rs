//! The shared batch buffer between the capture path and the flush worker.

use parking_lot::Mutex;

use crate::record::FeatureRecord;

/// A mutex-protected ordered sequence of pending records.
///
/// This is the single point of contention between the capture path and the
/// flush worker. The lock is held only for the duration of an append or a
/// drain, never across I/O, so the capture path may briefly suspend for the
/// mutex but for nothing else.
///
/// Records drain in the exact order they were appended, and a drain is
/// atomic: it takes the full current contents, leaving the buffer empty. Two
/// racing drains cannot see the same record.
pub struct BatchBuffer {
    records: Mutex<Vec<FeatureRecord>>,
    batch_size: usize,
}

impl BatchBuffer {
    /// Creates a buffer with the given flush threshold.
    pub fn new(batch_size: usize) -> Self {
        Self {
            records: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size: batch_size.max(1),
        }
    }

    /// Appends a record, returning `true` if the buffer occupancy reached or
    /// exceeded the batch-size threshold after insertion.
    ///
    /// The return value is a hint for the caller to request an asynchronous
    /// flush; the append itself never flushes or blocks on I/O.
    pub fn append(&self, record: FeatureRecord) -> bool {
        let mut records = self.records.lock();
        records.push(record);
        records.len() >= self.batch_size
    }

    /// Atomically takes all pending records, leaving the buffer empty.
    pub fn drain_all(&self) -> Vec<FeatureRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if no records are pending.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// The configured flush threshold.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
