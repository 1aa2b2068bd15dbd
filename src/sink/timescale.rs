//! TimescaleDB sink: one transactional multi-row insert per batch.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};

use crate::config::DbConfig;
use crate::error::SinkError;
use crate::record::FeatureRecord;
use crate::sink::MetricsSink;

/// Persists feature records into the `sound_metrics` hypertable.
///
/// Each flush is a single `INSERT` with one row per record, executed inside
/// one transaction: on any failure the transaction is rolled back and the
/// store is left unchanged. Every store operation is bounded by the
/// configured timeout so a hung store cannot stall shutdown.
pub struct TimescaleSink {
    pool: PgPool,
    timeout: Duration,
}

impl TimescaleSink {
    /// Creates a sink over an existing connection pool.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Connects to the store and returns a ready sink.
    ///
    /// # Errors
    ///
    /// Returns the underlying connection error; at startup this is fatal.
    pub async fn connect(db: &DbConfig, timeout: Duration) -> Result<Self, sqlx::Error> {
        let pool = connect_pool(db, timeout).await?;
        Ok(Self::new(pool, timeout))
    }

    async fn insert_batch(&self, records: &[FeatureRecord]) -> Result<usize, SinkError> {
        let mut tx = self.pool.begin().await?;

        let mut query = QueryBuilder::new(
            "INSERT INTO sound_metrics \
             (time, sensor_id, location_id, decibel_level, frequency_bands) ",
        );
        query.push_values(records, |mut row, record| {
            row.push_bind(record.time)
                .push_bind(&record.sensor_id)
                .push_bind(&record.location_id)
                .push_bind(record.decibel_level)
                .push_bind(Json(&record.frequency_bands));
        });

        let result = query.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() as usize)
    }
}

/// Opens a small connection pool for the monitor process.
///
/// Two connections are enough: one for the flush worker, one spare for the
/// registry and schema setup at startup.
pub async fn connect_pool(db: &DbConfig, timeout: Duration) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(timeout)
        .connect_with(db.connect_options())
        .await
}

#[async_trait]
impl MetricsSink for TimescaleSink {
    fn name(&self) -> &str {
        "timescale"
    }

    async fn flush(&self, records: &[FeatureRecord]) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }
        if self.pool.is_closed() {
            return Err(SinkError::Closed);
        }

        match tokio::time::timeout(self.timeout, self.insert_batch(records)).await {
            Ok(result) => result,
            // The transaction guard is dropped on timeout, rolling it back.
            Err(_) => Err(SinkError::timeout("flush", self.timeout)),
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.pool.close().await;
        Ok(())
    }
}

// Correctness of the insert and rollback paths is covered by the
// live-database tests in tests/integration.rs (marked #[ignore]); failure
// containment is covered against MemorySink with injected failures.
