//! One-time schema provisioning for the time-series store.

use sqlx::PgPool;

use crate::error::MonitorError;

/// Creates the TimescaleDB extension, tables, and hypertable if missing.
///
/// Idempotent: safe to run on every startup. The pipeline itself assumes the
/// schema exists, so a failure here is fatal and the process exits without
/// starting capture.
///
/// # Errors
///
/// Returns [`MonitorError::Database`] if the extension is unavailable or any
/// statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), MonitorError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb CASCADE")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sound_sensors (
            sensor_id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            description TEXT,
            installation_time TIMESTAMPTZ DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sound_metrics (
            time TIMESTAMPTZ NOT NULL,
            sensor_id TEXT NOT NULL REFERENCES sound_sensors (sensor_id),
            location_id TEXT NOT NULL,
            decibel_level DOUBLE PRECISION NOT NULL,
            frequency_bands JSONB NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "SELECT create_hypertable('sound_metrics', 'time', \
         chunk_time_interval => INTERVAL '1 hour', if_not_exists => TRUE)",
    )
    .execute(pool)
    .await?;

    tracing::info!("database schema setup complete");
    Ok(())
}
