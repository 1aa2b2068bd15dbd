//! CPAL device wrapper for audio capture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::error::MonitorError;
use crate::event::{EventCallback, MonitorEvent};

/// Scale factor for f32 to i16 sample conversion.
const I16_SCALE: f32 = i16::MAX as f32;

/// Wrapper around a CPAL audio input device.
///
/// Capture is single-channel at the configured sample rate. The audio
/// callback only pushes samples into a lock-free ring buffer: no I/O, no
/// allocation, no database access. If the ring is full, samples are dropped
/// rather than blocking the callback.
#[must_use]
pub struct AudioDevice {
    device: Device,
}

impl AudioDevice {
    /// Opens the default input device.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultDevice` if no default input device is configured.
    pub fn open_default() -> Result<Self, MonitorError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(MonitorError::NoDefaultDevice)?;
        Ok(Self { device })
    }

    /// Opens a specific input device by name.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` if no device with the given name exists.
    pub fn open_by_name(name: &str) -> Result<Self, MonitorError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| MonitorError::BackendError(e.to_string()))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name == name {
                    return Ok(Self { device });
                }
            }
        }

        Err(MonitorError::DeviceNotFound {
            name: name.to_string(),
        })
    }

    /// Returns the device name.
    pub fn name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }

    /// Starts capturing mono audio at `sample_rate`.
    ///
    /// The returned `CaptureStream` must be kept alive for capture to
    /// continue; dropping it releases the device. Device-level anomalies
    /// (overruns, stream errors) are logged and reported through the event
    /// callback, never treated as fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be built or started.
    pub fn start_capture(
        &self,
        sample_rate: u32,
        ring_capacity: usize,
        event_callback: Option<EventCallback>,
    ) -> Result<(CaptureStream, ringbuf::HeapCons<i16>), MonitorError> {
        let (producer, consumer) = HeapRb::<i16>::new(ring_capacity.max(1)).split();

        let supported = self
            .device
            .default_input_config()
            .map_err(|e| MonitorError::BackendError(e.to_string()))?;
        let sample_format = supported.sample_format();

        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let stream = match sample_format {
            SampleFormat::I16 => self.build_i16_stream(&config, producer, event_callback)?,
            SampleFormat::F32 => self.build_f32_stream(&config, producer, event_callback)?,
            format => {
                return Err(MonitorError::UnsupportedFormat {
                    format: format!("{format:?}"),
                });
            }
        };

        stream
            .play()
            .map_err(|e| MonitorError::BackendError(e.to_string()))?;

        Ok((CaptureStream { _stream: stream }, consumer))
    }

    fn build_i16_stream(
        &self,
        config: &StreamConfig,
        mut producer: ringbuf::HeapProd<i16>,
        event_callback: Option<EventCallback>,
    ) -> Result<Stream, MonitorError> {
        let stream = self
            .device
            .build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // Non-blocking push - drops samples if the ring is full.
                    let _ = producer.push_slice(data);
                },
                move |err| report_anomaly(&err, event_callback.as_ref()),
                None,
            )
            .map_err(|e| MonitorError::BackendError(e.to_string()))?;

        Ok(stream)
    }

    fn build_f32_stream(
        &self,
        config: &StreamConfig,
        mut producer: ringbuf::HeapProd<i16>,
        event_callback: Option<EventCallback>,
    ) -> Result<Stream, MonitorError> {
        let stream = self
            .device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Inline conversion to keep the audio callback cheap.
                    for &sample in data {
                        let converted = (sample * I16_SCALE).clamp(-I16_SCALE, I16_SCALE) as i16;
                        let _ = producer.try_push(converted);
                    }
                },
                move |err| report_anomaly(&err, event_callback.as_ref()),
                None,
            )
            .map_err(|e| MonitorError::BackendError(e.to_string()))?;

        Ok(stream)
    }
}

/// Logs a device anomaly and forwards it to the event callback.
fn report_anomaly(err: &cpal::StreamError, callback: Option<&EventCallback>) {
    tracing::warn!("audio device anomaly: {err}");
    if let Some(callback) = callback {
        callback(MonitorEvent::DeviceAnomaly {
            message: err.to_string(),
        });
    }
}

/// Lists the names of all available input devices.
pub fn list_input_devices() -> Result<Vec<String>, MonitorError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| MonitorError::BackendError(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// A running audio capture stream.
///
/// Audio capture continues while this struct is held. When dropped, the CPAL
/// stream is stopped and the device is released.
pub struct CaptureStream {
    /// The underlying CPAL stream. Dropping this stops capture.
    _stream: Stream,
}
