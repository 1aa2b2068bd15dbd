//! Builder that wires the capture pipeline together.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::buffer::BatchBuffer;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::event::{event_callback, EventCallback, MonitorEvent};
use crate::pipeline::{spawn_capture_bridge, spawn_flush_worker, CaptureContext};
use crate::session::{MonitorSession, MonitorState};
use crate::sink::MetricsSink;
use crate::source::{AudioDevice, CaptureStream};

/// Capacity of the flush request channel.
///
/// One pending threshold request plus the stop request is all that is ever
/// useful; further threshold requests while the channel is full are
/// redundant and dropped by the capture side.
const FLUSH_CHANNEL_CAPACITY: usize = 2;

/// Builds and starts a [`MonitorSession`].
///
/// # Example
///
/// ```rust,ignore
/// let session = MonitorBuilder::new(MonitorConfig::new("plaza"))
///     .sink(Arc::new(TimescaleSink::new(pool, timeout)))
///     .on_event(|e| tracing::warn!(?e, "monitor event"))
///     .start()?;
/// ```
pub struct MonitorBuilder {
    config: MonitorConfig,
    sink: Option<Arc<dyn MetricsSink>>,
    event_callback: Option<EventCallback>,
    device_name: Option<String>,
}

impl MonitorBuilder {
    /// Creates a builder for the given configuration.
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            sink: None,
            event_callback: None,
            device_name: None,
        }
    }

    /// Sets the persistence sink. Required.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Registers a callback for runtime events.
    #[must_use]
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(MonitorEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(f));
        self
    }

    /// Captures from a specific input device instead of the default.
    #[must_use]
    pub fn device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Opens the audio device and starts the pipeline.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, no sink was set, or
    /// the device cannot be opened.
    pub fn start(self) -> Result<MonitorSession, MonitorError> {
        self.validate()?;

        let device = match self.device_name {
            Some(ref name) => AudioDevice::open_by_name(name)?,
            None => AudioDevice::open_default()?,
        };
        tracing::info!(device = %device.name(), "opening audio input");

        let ring_capacity = self.config.block_size() * self.config.ring_capacity_blocks;
        let (stream, consumer) = device.start_capture(
            self.config.sample_rate,
            ring_capacity,
            self.event_callback.clone(),
        )?;

        self.start_with_consumer(consumer, Some(stream))
    }

    /// Starts the pipeline over an externally supplied sample stream.
    ///
    /// This is the seam used by tests: feed samples through a ring buffer
    /// producer (e.g. from [`MockSource`](crate::source::MockSource)) instead
    /// of a live device. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no sink was set.
    pub fn start_with_consumer(
        self,
        consumer: ringbuf::HeapCons<i16>,
        capture_stream: Option<CaptureStream>,
    ) -> Result<MonitorSession, MonitorError> {
        self.validate()?;
        let sink = self.sink.ok_or(MonitorError::NoSinkConfigured)?;

        let state = Arc::new(MonitorState::new());
        let buffer = Arc::new(BatchBuffer::new(self.config.batch_size));
        let (flush_tx, flush_rx) = mpsc::channel(FLUSH_CHANNEL_CAPACITY);

        let flusher_handle = spawn_flush_worker(
            buffer.clone(),
            sink.clone(),
            self.config.flush_interval,
            flush_rx,
            state.clone(),
            self.event_callback.clone(),
        );

        let capture_handle = spawn_capture_bridge(
            consumer,
            CaptureContext {
                config: self.config,
                buffer,
                flush_tx: flush_tx.clone(),
                state: state.clone(),
                event_callback: self.event_callback,
            },
        );

        Ok(MonitorSession::new(
            state,
            flush_tx,
            capture_handle,
            flusher_handle,
            sink,
            capture_stream,
        ))
    }

    fn validate(&self) -> Result<(), MonitorError> {
        if self.sink.is_none() {
            return Err(MonitorError::NoSinkConfigured);
        }
        if self.config.sample_rate == 0 {
            return Err(MonitorError::InvalidConfig {
                reason: "sample rate must be positive".to_string(),
            });
        }
        if self.config.block_size() == 0 {
            return Err(MonitorError::InvalidConfig {
                reason: "block duration too short for sample rate".to_string(),
            });
        }
        if self.config.batch_size == 0 {
            return Err(MonitorError::InvalidConfig {
                reason: "batch size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn test_start_without_sink_fails() {
        let builder = MonitorBuilder::new(MonitorConfig::new("loc"));
        let err = builder.start().unwrap_err();
        assert!(matches!(err, MonitorError::NoSinkConfigured));
    }

    #[tokio::test]
    async fn test_invalid_sample_rate_rejected() {
        let mut config = MonitorConfig::new("loc");
        config.sample_rate = 0;

        let builder = MonitorBuilder::new(config).sink(Arc::new(MemorySink::new()));
        let err = builder.start().unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_start_with_consumer_runs_and_stops() {
        use crate::source::MockSource;

        let mut config = MonitorConfig::new("loc").with_sensor_id("test01");
        config.sample_rate = 8000;
        config.batch_size = 100;

        let mut mock = MockSource::new(8000);
        mock.generate_silence(300); // 3 blocks at 100ms

        let sink = Arc::new(MemorySink::new());
        let session = MonitorBuilder::new(config)
            .sink(sink.clone())
            .start_with_consumer(mock.into_ring_buffer(), None)
            .unwrap();

        assert!(session.is_running());
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        session.stop().await.unwrap();

        // All three blocks flushed by the final shutdown flush at the latest.
        assert_eq!(sink.record_count(), 3);
        assert!(sink.is_closed());
    }
}
