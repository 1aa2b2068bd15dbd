//! Fixed-size block assembly over the capture ring buffer.

use ringbuf::traits::{Consumer, Observer, Split};
use ringbuf::HeapRb;

/// Assembles fixed-size PCM blocks from a ring buffer consumer.
///
/// The audio callback pushes raw samples into the producer side; this wraps
/// the consumer side and hands out complete blocks suitable for the feature
/// extractor. The FFT plan is fixed to the block size, so a trailing partial
/// block at shutdown is discarded rather than zero-padded into a skewed
/// spectrum.
pub struct BlockBuffer {
    consumer: ringbuf::HeapCons<i16>,
    block_size: usize,
}

impl BlockBuffer {
    /// Creates a block buffer over a ring buffer consumer.
    pub fn new(consumer: ringbuf::HeapCons<i16>, block_size: usize) -> Self {
        Self {
            consumer,
            block_size: block_size.max(1),
        }
    }

    /// Number of samples currently buffered.
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Returns `true` if a complete block can be read.
    pub fn has_block(&self) -> bool {
        self.available() >= self.block_size
    }

    /// Reads one complete block, or `None` if not enough samples are buffered.
    pub fn try_read_block(&mut self) -> Option<Vec<i16>> {
        if !self.has_block() {
            return None;
        }

        let mut samples = Vec::with_capacity(self.block_size);
        for _ in 0..self.block_size {
            match self.consumer.try_pop() {
                Some(sample) => samples.push(sample),
                None => break,
            }
        }

        if samples.len() < self.block_size {
            // Lost a race with a producer-side reset; too short to analyze.
            return None;
        }
        Some(samples)
    }

    /// Drains all remaining complete blocks at shutdown.
    ///
    /// Any trailing samples short of a full block are discarded.
    pub fn drain(&mut self) -> Vec<Vec<i16>> {
        let mut blocks = Vec::new();
        while let Some(block) = self.try_read_block() {
            blocks.push(block);
        }

        let leftover = self.consumer.pop_iter().count();
        if leftover > 0 {
            tracing::debug!(leftover, "discarding trailing partial block");
        }

        blocks
    }
}

/// Creates a ring buffer pair sized in whole blocks.
///
/// Returns the producer (for the audio callback) and a [`BlockBuffer`] (for
/// the capture bridge).
pub fn create_block_pipe(
    block_size: usize,
    capacity_blocks: usize,
) -> (ringbuf::HeapProd<i16>, BlockBuffer) {
    let capacity = block_size.max(1) * capacity_blocks.max(1);
    let (producer, consumer) = HeapRb::<i16>::new(capacity).split();
    (producer, BlockBuffer::new(consumer, block_size))
}
