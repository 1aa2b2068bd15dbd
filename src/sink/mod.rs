//! Sink trait and implementations for record persistence.
//!
//! A [`MetricsSink`] is any destination that can durably store a batch of
//! feature records. The crate provides two built-in sinks:
//!
//! - [`TimescaleSink`]: One transactional multi-row insert per batch into a
//!   TimescaleDB hypertable
//! - [`MemorySink`]: Records batches in process memory, for tests
//!
//! Implement the trait for custom destinations like message queues or files.

mod memory;
mod timescale;

pub use memory::MemorySink;
pub use timescale::{connect_pool, TimescaleSink};

use async_trait::async_trait;

use crate::error::SinkError;
use crate::record::FeatureRecord;

/// A destination for batches of feature records.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability if needed
/// - `flush` receives a whole batch and must store it atomically: either
///   every record is persisted or none is. Partial persistence and
///   per-record retry are both forbidden
/// - `flush` on an empty batch must succeed without touching the store
/// - The flush worker serializes calls; implementations are never invoked
///   concurrently with themselves by this crate, but must still be `Sync`
/// - Errors are recoverable: the worker logs them and drops the batch
///
/// # Example
///
/// ```
/// use soundscape_monitor::{FeatureRecord, MetricsSink, SinkError};
/// use async_trait::async_trait;
///
/// struct PrintSink;
///
/// #[async_trait]
/// impl MetricsSink for PrintSink {
///     fn name(&self) -> &str {
///         "print"
///     }
///
///     async fn flush(&self, records: &[FeatureRecord]) -> Result<usize, SinkError> {
///         println!("would persist {} records", records.len());
///         Ok(records.len())
///     }
/// }
/// ```
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Durably stores one batch, returning the number of records inserted.
    ///
    /// Must return `Ok(0)` for an empty batch without performing any store
    /// operation.
    async fn flush(&self, records: &[FeatureRecord]) -> Result<usize, SinkError>;

    /// Called once during shutdown, after the final flush.
    ///
    /// Use this to close connections. Default implementation does nothing.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
