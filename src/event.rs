//! Runtime events for monitoring pipeline health.
//!
//! Events are non-fatal notifications about pipeline behavior. The monitor
//! continues running after events are emitted - they're for logging/metrics
//! and test observation, not error handling.

use std::sync::Arc;

/// Runtime events emitted during capture and persistence.
///
/// These are informational events, not errors. The pipeline continues
/// running after any event is emitted.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// The audio device reported a status anomaly (overrun, underrun,
    /// stream error). Logged as a warning, never fatal.
    DeviceAnomaly {
        /// Description of the anomaly as reported by the backend.
        message: String,
    },

    /// A batch was durably persisted.
    FlushCompleted {
        /// Number of records inserted.
        records: usize,
    },

    /// A flush failed; the batch was rolled back and dropped.
    FlushFailed {
        /// Description of the failure.
        error: String,
        /// Number of records lost.
        records: usize,
    },

    /// One capture block was skipped and its record not produced.
    BlockSkipped {
        /// Why the block was skipped.
        reason: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`MonitorBuilder::on_event()`] to receive
/// notifications about device anomalies and flush outcomes.
///
/// [`MonitorBuilder::on_event()`]: crate::MonitorBuilder::on_event
pub type EventCallback = Arc<dyn Fn(MonitorEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use soundscape_monitor::{event_callback, MonitorEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(MonitorEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_event_debug() {
        let event = MonitorEvent::FlushCompleted { records: 10 };
        let debug = format!("{:?}", event);
        assert!(debug.contains("FlushCompleted"));
        assert!(debug.contains("10"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(MonitorEvent::DeviceAnomaly {
            message: "input overflow".to_string(),
        });
        assert!(called.load(Ordering::SeqCst));
    }
}
