//! # soundscape-monitor
//!
//! Real-time acoustic monitoring: continuous audio capture, per-block feature
//! extraction (decibel level + 7 frequency bands), and batched persistence to
//! a TimescaleDB hypertable.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use soundscape_monitor::{MonitorBuilder, MonitorConfig, TimescaleSink};
//!
//! let config = MonitorConfig::new("street-corner-7");
//! let sink = Arc::new(TimescaleSink::new(pool, config.db_timeout));
//!
//! let session = MonitorBuilder::new(config)
//!     .sink(sink)
//!     .start()?;
//!
//! // Capture runs in background tasks until stopped.
//! session.stop().await?;
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **CPAL Thread**: High-priority audio callback that never blocks; it only
//!   pushes samples into a lock-free ring buffer
//! - **Capture Bridge**: Tokio task that assembles fixed-size blocks, extracts
//!   features, and appends records to the batch buffer
//! - **Flush Worker**: A single tokio task that drains the batch buffer on a
//!   periodic timer or on a size-threshold request and writes one
//!   transactional multi-row insert per batch
//!
//! A single flush worker means flush executions are serialized by
//! construction, so batches reach the store in capture order. A failed flush
//! is logged and dropped rather than re-queued; the batch buffer stays
//! bounded even under a sustained store outage.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

mod buffer;
mod builder;
mod config;
mod error;
mod event;
mod features;
mod pipeline;
mod record;
mod registry;
mod schema;
mod session;
mod sink;
pub mod source;

pub use buffer::BatchBuffer;
pub use builder::MonitorBuilder;
pub use config::{DbConfig, MonitorConfig};
pub use error::{MonitorError, SinkError};
pub use event::{event_callback, EventCallback, MonitorEvent};
pub use features::{BlockFeatures, FeatureExtractor, SILENCE_FLOOR_DB};
pub use pipeline::{
    create_block_pipe, spawn_capture_bridge, spawn_flush_worker, BlockBuffer, CaptureBridge,
    CaptureContext, FlushRequest, FlushWorker,
};
pub use record::{FeatureRecord, FrequencyBands, SensorInfo, BAND_NAMES};
pub use registry::SensorRegistry;
pub use schema::ensure_schema;
pub use session::{MonitorSession, MonitorState, MonitorStats};
pub use sink::{connect_pool, MemorySink, MetricsSink, TimescaleSink};
