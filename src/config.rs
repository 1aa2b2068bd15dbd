//! Configuration types for the monitor pipeline.

use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Configuration for the capture and persistence pipeline.
///
/// All values are supplied at startup and immutable thereafter. The sensor id
/// is part of the configuration (not process-global state) so tests can pin
/// it to a fixed value.
///
/// # Example
///
/// ```
/// use soundscape_monitor::MonitorConfig;
/// use std::time::Duration;
///
/// let config = MonitorConfig {
///     block_duration: Duration::from_millis(50),
///     ..MonitorConfig::new("rooftop-3")
/// };
/// assert_eq!(config.block_size(), 2205);
/// ```
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Identifier of this running instance. Random 8-hex-char id by default.
    pub sensor_id: String,

    /// Identifier of the monitored location.
    pub location_id: String,

    /// Audio sample rate in Hz. Default: 44100
    pub sample_rate: u32,

    /// Duration of one capture block. Default: 100ms
    pub block_duration: Duration,

    /// Number of buffered records that triggers a flush. Default: 10
    pub batch_size: usize,

    /// Interval of the periodic flush trigger. Default: 1s
    pub flush_interval: Duration,

    /// Upper bound on any single store operation. Default: 5s
    pub db_timeout: Duration,

    /// Capacity of the capture ring buffer, in blocks.
    ///
    /// Absorbs pressure when the bridge task is briefly delayed. If it fills,
    /// the audio callback drops samples rather than blocking. Default: 32
    pub ring_capacity_blocks: usize,
}

impl MonitorConfig {
    /// Creates a configuration for the given location with a fresh sensor id.
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            sensor_id: generate_sensor_id(),
            location_id: location_id.into(),
            sample_rate: 44100,
            block_duration: Duration::from_millis(100),
            batch_size: 10,
            flush_interval: Duration::from_secs(1),
            db_timeout: Duration::from_secs(5),
            ring_capacity_blocks: 32,
        }
    }

    /// Returns the configuration with a fixed sensor id.
    #[must_use]
    pub fn with_sensor_id(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = sensor_id.into();
        self
    }

    /// Number of samples in one capture block.
    #[must_use]
    pub fn block_size(&self) -> usize {
        (f64::from(self.sample_rate) * self.block_duration.as_secs_f64()) as usize
    }
}

/// Generates a short random sensor id (8 hex chars of a v4 UUID).
fn generate_sensor_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Connection parameters for the time-series store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
}

impl DbConfig {
    /// Builds sqlx connection options from these parameters.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
    }
}
