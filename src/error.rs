//! Error types for soundscape-monitor.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`MonitorError`]): Prevent the monitor from starting
//! - **Recoverable errors** ([`SinkError`]): Contained at the flush or
//!   registration boundary; the pipeline keeps running after them

use std::time::Duration;

/// Fatal errors that prevent the monitor from starting.
///
/// These errors are surfaced to the operator and the process exits without
/// starting capture. Runtime issues (a failed flush, a device anomaly) are
/// contained locally and reported via logs and [`MonitorEvent`] instead.
///
/// [`MonitorEvent`]: crate::MonitorEvent
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The requested audio input device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultDevice,

    /// The requested sample format is not supported by the device.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),

    /// The store was unreachable or rejected a query at startup.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Sensor registration failed at startup.
    #[error("sensor registration failed: {0}")]
    Registration(#[source] SinkError),

    /// No persistence sink was configured before starting.
    #[error("no sink configured - call sink() before start()")]
    NoSinkConfigured,

    /// A configuration value is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: String,
    },
}

/// Errors that can occur within a [`MetricsSink`](crate::MetricsSink) or the
/// sensor registry.
///
/// Sink errors are recoverable - the flush worker logs them, drops the batch,
/// and continues. Nothing raised at the flush boundary is allowed to crash
/// the process.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A query failed; the surrounding transaction was rolled back.
    #[error("query failed: {source}")]
    Query {
        /// The underlying database error.
        #[from]
        source: sqlx::Error,
    },

    /// A store operation exceeded the configured timeout.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// The timeout that elapsed.
        elapsed: Duration,
    },

    /// The band payload could not be serialized for the JSONB column.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink was used after close().
    #[error("sink closed")]
    Closed,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a timeout error for the given operation.
    pub fn timeout(operation: &'static str, elapsed: Duration) -> Self {
        Self::Timeout { operation, elapsed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_error_display() {
        let err = MonitorError::DeviceNotFound {
            name: "USB Mic".to_string(),
        };
        assert_eq!(err.to_string(), "device not found: USB Mic");
    }

    #[test]
    fn test_sink_error_custom() {
        let err = SinkError::custom("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[test]
    fn test_sink_error_timeout() {
        let err = SinkError::timeout("flush", Duration::from_secs(5));
        assert!(err.to_string().contains("flush timed out"));
    }
}
