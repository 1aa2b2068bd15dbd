//! Mock audio source for testing without hardware.

use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

/// A mock audio source that generates synthetic PCM blocks for testing.
///
/// This allows testing the full pipeline without actual audio hardware,
/// making it suitable for CI environments.
///
/// # Example
///
/// ```
/// use soundscape_monitor::source::MockSource;
///
/// let mut mock = MockSource::new(44100);
///
/// // One 100ms block of a 1 kHz tone, then one of silence
/// mock.generate_sine(1000.0, 100);
/// mock.generate_silence(100);
///
/// let samples = mock.take_samples();
/// assert_eq!(samples.len(), 8820);
/// ```
pub struct MockSource {
    sample_rate: u32,
    samples: Vec<i16>,
}

impl MockSource {
    /// Creates a new mono mock source at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
        }
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Generates silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let num_samples = self.samples_for_duration(duration_ms);
        self.samples
            .extend(std::iter::repeat(0i16).take(num_samples));
    }

    /// Generates a sine wave at the given frequency for the given duration.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let num_samples = self.samples_for_duration(duration_ms);
        let sample_rate = f64::from(self.sample_rate);

        let offset = self.samples.len();
        for i in 0..num_samples {
            let t = (offset + i) as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
            self.samples.push((value * 32767.0 * 0.8) as i16);
        }
    }

    /// Generates deterministic white noise for the given duration.
    pub fn generate_noise(&mut self, duration_ms: u64, amplitude: f64) {
        let num_samples = self.samples_for_duration(duration_ms);
        let amplitude = (amplitude * 32767.0) as i16;

        // Simple LCG for deterministic "random" noise
        let mut seed: u32 = 12345;
        for _ in 0..num_samples {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let random = ((seed >> 16) as i32 - 32768) as i16;
            self.samples
                .push((i32::from(random) * i32::from(amplitude) / 32767) as i16);
        }
    }

    /// Adds raw samples directly.
    pub fn add_samples(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    /// Takes all accumulated samples, clearing the internal buffer.
    pub fn take_samples(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }

    /// Returns a reference to the accumulated samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Creates a ring buffer consumer pre-filled with the accumulated
    /// samples, for feeding the pipeline in tests.
    pub fn into_ring_buffer(self) -> ringbuf::HeapCons<i16> {
        let capacity = self.samples.len().max(1024);
        let (mut producer, consumer) = HeapRb::<i16>::new(capacity).split();

        for sample in self.samples {
            let _ = producer.try_push(sample);
        }

        consumer
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }
}
