//! Idempotent one-time sensor registration.

use std::time::Duration;

use sqlx::PgPool;

use crate::error::SinkError;
use crate::record::SensorInfo;

/// Registers this running instance as a named sensor at a location.
///
/// Registration runs exactly once at startup, strictly before capture
/// begins. The check-then-insert happens inside one transaction; a lost race
/// against another process using the same sensor id surfaces as a
/// duplicate-key error and is treated as "already registered", not fatal.
pub struct SensorRegistry {
    pool: PgPool,
    timeout: Duration,
}

impl SensorRegistry {
    /// Creates a registry over an existing connection pool.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Inserts a sensor row if none exists for `sensor_id`.
    ///
    /// Returns `true` if a row was inserted, `false` if the sensor was
    /// already registered.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the store is unreachable or the query
    /// fails; at startup the caller treats this as fatal.
    pub async fn register_if_absent(
        &self,
        sensor_id: &str,
        location_id: &str,
    ) -> Result<bool, SinkError> {
        let registration = self.register_inner(sensor_id, location_id);
        let created = match tokio::time::timeout(self.timeout, registration).await {
            Ok(result) => result?,
            Err(_) => return Err(SinkError::timeout("registration", self.timeout)),
        };

        if created {
            tracing::info!(sensor_id, location_id, "registered new sensor");
        } else {
            tracing::info!(sensor_id, "sensor already registered");
        }
        Ok(created)
    }

    async fn register_inner(&self, sensor_id: &str, location_id: &str) -> Result<bool, SinkError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM sound_sensors WHERE sensor_id = $1")
                .bind(sensor_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_some() {
            return Ok(false);
        }

        let insert = sqlx::query(
            "INSERT INTO sound_sensors (sensor_id, location_id, description) \
             VALUES ($1, $2, $3)",
        )
        .bind(sensor_id)
        .bind(location_id)
        .bind(format!("Sensor at {location_id}"))
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {
                tx.commit().await?;
                Ok(true)
            }
            // Lost race: another process inserted between check and insert.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetches the persisted row for a sensor, if any.
    pub async fn fetch(&self, sensor_id: &str) -> Result<Option<SensorInfo>, SinkError> {
        let row = sqlx::query_as::<_, SensorInfo>(
            "SELECT sensor_id, location_id, description, installation_time \
             FROM sound_sensors WHERE sensor_id = $1",
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

// Registration against a live store is exercised by the #[ignore]d tests in
// tests/integration.rs; the lost-race path relies on the database's unique
// constraint and cannot be simulated in-process.
