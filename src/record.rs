//! Feature records and the persisted sensor entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the 7 canonical frequency bands, in ascending frequency order.
pub const BAND_NAMES: [&str; 7] = [
    "sub_bass",
    "bass",
    "low_mid",
    "mid",
    "upper_mid",
    "presence",
    "brilliance",
];

/// Mean spectral magnitude in each of the 7 canonical frequency bands.
///
/// The band set is fixed at compile time, so this is a fixed-shape struct
/// rather than an open map; it is serialized to the store's JSONB column
/// only at the persistence boundary. Every field is always present and
/// finite - a band whose frequency range contains no FFT bins is `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrequencyBands {
    /// 20-60 Hz.
    pub sub_bass: f64,
    /// 60-250 Hz.
    pub bass: f64,
    /// 250-500 Hz.
    pub low_mid: f64,
    /// 500-2000 Hz.
    pub mid: f64,
    /// 2000-4000 Hz.
    pub upper_mid: f64,
    /// 4000-6000 Hz.
    pub presence: f64,
    /// 6000-20000 Hz.
    pub brilliance: f64,
}

impl FrequencyBands {
    /// Returns the band values in ascending frequency order,
    /// matching [`BAND_NAMES`].
    #[must_use]
    pub fn values(&self) -> [f64; 7] {
        [
            self.sub_bass,
            self.bass,
            self.low_mid,
            self.mid,
            self.upper_mid,
            self.presence,
            self.brilliance,
        ]
    }

    /// Returns the name of the band with the highest mean magnitude.
    #[must_use]
    pub fn dominant(&self) -> &'static str {
        let values = self.values();
        let mut best = 0;
        for (i, v) in values.iter().enumerate() {
            if *v > values[best] {
                best = i;
            }
        }
        BAND_NAMES[best]
    }
}

/// One sample of the acoustic environment at one instant.
///
/// Created by the feature extractor, owned by the batch buffer until handed
/// wholesale to the sink, and immutable throughout.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRecord {
    /// Wall-clock instant assigned at feature-extraction time. Strictly
    /// non-decreasing in emission order from a single capture loop.
    pub time: DateTime<Utc>,

    /// Identifier of the running instance, fixed for the process lifetime.
    pub sensor_id: String,

    /// Identifier of the monitored location, fixed at startup.
    pub location_id: String,

    /// Loudness estimate in dB relative to full scale.
    /// [`SILENCE_FLOOR_DB`](crate::SILENCE_FLOOR_DB) for silent blocks.
    pub decibel_level: f64,

    /// Mean spectral magnitude per canonical band.
    pub frequency_bands: FrequencyBands,
}

impl FeatureRecord {
    /// Creates a record stamped with the current wall-clock time.
    pub fn new(
        sensor_id: impl Into<String>,
        location_id: impl Into<String>,
        decibel_level: f64,
        frequency_bands: FrequencyBands,
    ) -> Self {
        Self {
            time: Utc::now(),
            sensor_id: sensor_id.into(),
            location_id: location_id.into(),
            decibel_level,
            frequency_bands,
        }
    }
}

/// A persisted sensor row.
///
/// Created at most once per sensor id by the registry; never mutated or
/// deleted by this crate.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SensorInfo {
    /// Unique sensor identifier.
    pub sensor_id: String,
    /// Location the sensor monitors.
    pub location_id: String,
    /// Free-text description generated at registration.
    pub description: Option<String>,
    /// When the sensor row was created.
    pub installation_time: Option<DateTime<Utc>>,
}
