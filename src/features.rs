//! Per-block acoustic feature extraction: RMS decibel level and mean
//! spectral magnitude over the 7 canonical frequency bands.
//!
//! Extraction is pure and deterministic: identical input blocks produce
//! identical features. The FFT plan and taper window are built once per
//! extractor so the per-block cost stays within one block period.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::record::FrequencyBands;

/// Decibel level reported for a block whose RMS amplitude is exactly zero.
pub const SILENCE_FLOOR_DB: f64 = -96.0;

/// Full-scale normalization divisor for 16-bit samples.
const I16_FULL_SCALE: f64 = 32768.0;

/// Half-open frequency ranges of the canonical bands, in Hz, matching
/// [`BAND_NAMES`](crate::BAND_NAMES) order.
const BAND_EDGES: [(f64, f64); 7] = [
    (20.0, 60.0),      // sub_bass
    (60.0, 250.0),     // bass
    (250.0, 500.0),    // low_mid
    (500.0, 2000.0),   // mid
    (2000.0, 4000.0),  // upper_mid
    (4000.0, 6000.0),  // presence
    (6000.0, 20000.0), // brilliance
];

/// Features computed from one capture block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockFeatures {
    /// RMS loudness in dB relative to full scale.
    pub decibel_level: f64,
    /// Mean spectral magnitude per canonical band.
    pub bands: FrequencyBands,
}

/// Extracts features from fixed-size PCM blocks.
///
/// # Example
///
/// ```
/// use soundscape_monitor::{FeatureExtractor, SILENCE_FLOOR_DB};
///
/// let extractor = FeatureExtractor::new(44100, 4410);
/// let features = extractor.extract(&vec![0i16; 4410]);
/// assert_eq!(features.decibel_level, SILENCE_FLOOR_DB);
/// ```
pub struct FeatureExtractor {
    sample_rate: u32,
    block_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl FeatureExtractor {
    /// Creates an extractor for the given sample rate and block size.
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(block_size);

        Self {
            sample_rate,
            block_size,
            fft,
            window: hann_window(block_size),
        }
    }

    /// Returns the block size this extractor was planned for.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Extracts the decibel level and band magnitudes for one block.
    ///
    /// Blocks shorter than the planned size are zero-padded for the spectral
    /// analysis; longer blocks are truncated. The decibel level is always
    /// computed over the samples actually provided.
    #[must_use]
    pub fn extract(&self, samples: &[i16]) -> BlockFeatures {
        BlockFeatures {
            decibel_level: decibel_level(samples),
            bands: self.band_magnitudes(samples),
        }
    }

    /// Averages the magnitude spectrum within each canonical band.
    ///
    /// A bin belongs to the band whose half-open range contains its center
    /// frequency `i * sample_rate / n`. Bands with no bins yield `0.0`.
    fn band_magnitudes(&self, samples: &[i16]) -> FrequencyBands {
        let n = self.block_size;

        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(n);
        for (i, &s) in samples.iter().take(n).enumerate() {
            buffer.push(Complex::new(f32::from(s) * self.window[i], 0.0));
        }
        buffer.resize(n, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let mut sums = [0.0f64; 7];
        let mut counts = [0u32; 7];

        // Real input: only the non-negative half of the spectrum is distinct.
        let bin_hz = f64::from(self.sample_rate) / n as f64;
        for (i, value) in buffer.iter().take(n / 2 + 1).enumerate() {
            let freq = i as f64 * bin_hz;
            if let Some(band) = band_index(freq) {
                sums[band] += f64::from(value.norm());
                counts[band] += 1;
            }
        }

        let mut means = [0.0f64; 7];
        for i in 0..7 {
            if counts[i] > 0 {
                means[i] = sums[i] / f64::from(counts[i]);
            }
        }

        FrequencyBands {
            sub_bass: means[0],
            bass: means[1],
            low_mid: means[2],
            mid: means[3],
            upper_mid: means[4],
            presence: means[5],
            brilliance: means[6],
        }
    }
}

/// RMS loudness of a block in dB relative to full scale.
///
/// Returns [`SILENCE_FLOOR_DB`] for all-zero (or empty) blocks instead of
/// negative infinity.
fn decibel_level(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = f64::from(s) / I16_FULL_SCALE;
            normalized * normalized
        })
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();

    if rms > 0.0 {
        20.0 * rms.log10()
    } else {
        SILENCE_FLOOR_DB
    }
}

/// Index of the band whose half-open range contains `freq`, if any.
fn band_index(freq: f64) -> Option<usize> {
    BAND_EDGES
        .iter()
        .position(|&(lo, hi)| freq >= lo && freq < hi)
}

/// Symmetric Hann taper of length `n`.
fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64;
            (0.5 * (1.0 - phase.cos())) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_block(freq: f64, sample_rate: u32, len: usize, amplitude: f64) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f64 / f64::from(sample_rate);
                ((2.0 * std::f64::consts::PI * freq * t).sin() * amplitude * 32767.0) as i16
            })
            .collect()
    }

    #[test]
    fn test_silence_hits_floor_with_zero_bands() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let features = extractor.extract(&vec![0i16; 4410]);

        assert_eq!(features.decibel_level, SILENCE_FLOOR_DB);
        assert_eq!(features.bands.values(), [0.0; 7]);
    }

    #[test]
    fn test_full_scale_is_near_zero_db() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let block = vec![i16::MAX; 4410];
        let features = extractor.extract(&block);

        // Constant full-scale signal: RMS ~= 1.0, so ~0 dB.
        assert!(features.decibel_level.abs() < 0.1);
    }

    #[test]
    fn test_bands_always_finite() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let blocks = [
            vec![0i16; 4410],
            vec![i16::MAX; 4410],
            vec![i16::MIN; 4410],
            sine_block(1000.0, 44100, 4410, 0.5),
        ];

        for block in &blocks {
            let features = extractor.extract(block);
            assert!(features.decibel_level.is_finite());
            for value in features.bands.values() {
                assert!(value.is_finite());
                assert!(value >= 0.0);
            }
        }
    }

    #[test]
    fn test_pure_tone_lands_in_its_band() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let block = sine_block(1000.0, 44100, 4410, 0.8);
        let features = extractor.extract(&block);

        // 1 kHz is inside mid (500-2000 Hz).
        assert_eq!(features.bands.dominant(), "mid");
    }

    #[test]
    fn test_low_tone_lands_in_bass() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let block = sine_block(100.0, 44100, 4410, 0.8);
        let features = extractor.extract(&block);

        assert_eq!(features.bands.dominant(), "bass");
    }

    #[test]
    fn test_low_sample_rate_leaves_high_bands_zero() {
        // Nyquist at 6 kHz is 3 kHz: no bin reaches the presence or
        // brilliance ranges, so both must be exactly 0.
        let extractor = FeatureExtractor::new(6000, 600);
        let block = sine_block(1000.0, 6000, 600, 0.5);
        let features = extractor.extract(&block);

        assert_eq!(features.bands.presence, 0.0);
        assert_eq!(features.bands.brilliance, 0.0);
        assert!(features.bands.mid > 0.0);
    }

    #[test]
    fn test_tiny_block_yields_defined_bands() {
        // 32 bins at 44100 Hz: bin spacing ~1378 Hz, so the three lowest
        // bands contain no bins and must be exactly 0.
        let extractor = FeatureExtractor::new(44100, 32);
        let features = extractor.extract(&vec![1000i16; 32]);

        assert_eq!(features.bands.sub_bass, 0.0);
        assert_eq!(features.bands.bass, 0.0);
        assert_eq!(features.bands.low_mid, 0.0);
        for value in features.bands.values() {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let block = sine_block(440.0, 44100, 4410, 0.3);

        let a = extractor.extract(&block);
        let b = extractor.extract(&block);
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_block_is_padded() {
        let extractor = FeatureExtractor::new(44100, 4410);
        let features = extractor.extract(&vec![500i16; 100]);

        for value in features.bands.values() {
            assert!(value.is_finite());
        }
    }
}
