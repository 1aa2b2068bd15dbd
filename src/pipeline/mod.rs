//! Pipeline internals: block assembly, the capture bridge, and the flush
//! worker.

mod block;
mod capture;
mod flusher;

pub use block::{create_block_pipe, BlockBuffer};
pub use capture::{spawn_capture_bridge, CaptureBridge, CaptureContext};
pub use flusher::{spawn_flush_worker, FlushRequest, FlushWorker};
