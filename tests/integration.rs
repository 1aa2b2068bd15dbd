//! Integration tests for soundscape-monitor.
//!
//! The pipeline tests run against [`MockSource`] and [`MemorySink`], so no
//! audio hardware or database is required. Tests that need a running
//! TimescaleDB are marked `#[ignore]` and read their connection parameters
//! from `SOUNDSCAPE_TEST_DB_*` environment variables.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use soundscape_monitor::source::MockSource;
use soundscape_monitor::{
    MemorySink, MetricsSink, MonitorBuilder, MonitorConfig, MonitorEvent, MonitorSession,
};

/// Block-by-block sample rate used throughout: 44.1 kHz, 100 ms blocks.
const SAMPLE_RATE: u32 = 44100;
const BLOCK_MS: u64 = 100;
const BLOCK_SIZE: usize = 4410;

fn test_config(batch_size: usize) -> MonitorConfig {
    let mut config = MonitorConfig::new("test-location").with_sensor_id("itest001");
    config.sample_rate = SAMPLE_RATE;
    config.block_duration = Duration::from_millis(BLOCK_MS);
    config.batch_size = batch_size;
    // Keep the periodic trigger out of the way so flush cadence is
    // driven purely by thresholds and the final shutdown flush.
    config.flush_interval = Duration::from_secs(60);
    config
}

struct RunningPipeline {
    session: MonitorSession,
    producer: ringbuf::HeapProd<i16>,
    sink: Arc<MemorySink>,
    events: Arc<Mutex<Vec<MonitorEvent>>>,
}

fn start_pipeline(config: MonitorConfig) -> RunningPipeline {
    let (producer, consumer) = HeapRb::<i16>::new(BLOCK_SIZE * 64).split();
    let sink = Arc::new(MemorySink::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    let session = MonitorBuilder::new(config)
        .sink(sink.clone())
        .on_event(move |event| events_clone.lock().unwrap().push(event))
        .start_with_consumer(consumer, None)
        .unwrap();

    RunningPipeline {
        session,
        producer,
        sink,
        events,
    }
}

/// Feeds whole blocks one at a time, slower than the bridge poll interval,
/// so each block is processed before the next completes. This keeps the
/// flush cadence deterministic.
async fn feed_blocks_paced(producer: &mut ringbuf::HeapProd<i16>, samples: &[i16]) {
    for block in samples.chunks(BLOCK_SIZE) {
        producer.push_slice(block);
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
}

#[tokio::test]
async fn test_end_to_end_tone_batching() {
    // 25 blocks of a pure 1 kHz tone, batch size 10: expect two
    // size-triggered flushes of 10 and the remaining 5 in the final
    // shutdown flush.
    let pipeline = start_pipeline(test_config(10));
    let RunningPipeline {
        session,
        mut producer,
        sink,
        ..
    } = pipeline;

    let mut mock = MockSource::new(SAMPLE_RATE);
    mock.generate_sine(1000.0, 25 * BLOCK_MS);
    let samples = mock.take_samples();
    assert_eq!(samples.len(), 25 * BLOCK_SIZE);

    feed_blocks_paced(&mut producer, &samples).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.stop().await.unwrap();

    let batches = sink.batches();
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(sink.record_count(), 25);

    let records = sink.records();
    for record in &records {
        assert_eq!(record.sensor_id, "itest001");
        assert_eq!(record.location_id, "test-location");
        // 1 kHz falls in the mid band (500-2000 Hz); it must dominate
        // every record.
        assert_eq!(record.frequency_bands.dominant(), "mid");
        assert!(record.decibel_level.is_finite());
        for value in record.frequency_bands.values() {
            assert!(value.is_finite());
        }
    }

    // Concatenated flushes preserve capture order.
    for pair in records.windows(2) {
        assert!(pair[1].time >= pair[0].time);
    }
}

#[tokio::test]
async fn test_shutdown_flushes_residual_records() {
    // 3 buffered records at shutdown: exactly one final flush of size 3.
    let pipeline = start_pipeline(test_config(10));
    let RunningPipeline {
        session,
        mut producer,
        sink,
        events,
    } = pipeline;

    let mut mock = MockSource::new(SAMPLE_RATE);
    mock.generate_noise(3 * BLOCK_MS, 0.2);
    producer.push_slice(&mock.take_samples());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.stats().blocks_processed, 3);

    session.stop().await.unwrap();

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
    assert!(sink.is_closed());

    let flushes: Vec<usize> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::FlushCompleted { records } => Some(*records),
            _ => None,
        })
        .collect();
    assert_eq!(flushes, vec![3]);
}

#[tokio::test]
async fn test_silence_records_hit_floor() {
    let pipeline = start_pipeline(test_config(10));
    let RunningPipeline {
        session,
        mut producer,
        sink,
        ..
    } = pipeline;

    let mut mock = MockSource::new(SAMPLE_RATE);
    mock.generate_silence(2 * BLOCK_MS);
    producer.push_slice(&mock.take_samples());

    tokio::time::sleep(Duration::from_millis(200)).await;
    session.stop().await.unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.decibel_level, soundscape_monitor::SILENCE_FLOOR_DB);
        assert_eq!(record.frequency_bands.values(), [0.0; 7]);
    }
}

#[tokio::test]
async fn test_sink_failure_drops_batch_without_crashing() {
    let pipeline = start_pipeline(test_config(10));
    let RunningPipeline {
        session,
        mut producer,
        sink,
        events,
    } = pipeline;
    sink.set_failing(true);

    let mut mock = MockSource::new(SAMPLE_RATE);
    mock.generate_noise(3 * BLOCK_MS, 0.3);
    producer.push_slice(&mock.take_samples());

    tokio::time::sleep(Duration::from_millis(200)).await;
    session.stop().await.unwrap();

    // Batch dropped, nothing persisted, pipeline shut down cleanly.
    assert_eq!(sink.record_count(), 0);
    let failed = events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, MonitorEvent::FlushFailed { records: 3, .. }));
    assert!(failed, "expected a FlushFailed event for the dropped batch");
}

#[tokio::test]
async fn test_periodic_trigger_flushes_partial_batch() {
    let mut config = test_config(100);
    config.flush_interval = Duration::from_millis(150);

    let pipeline = start_pipeline(config);
    let RunningPipeline {
        session,
        mut producer,
        sink,
        ..
    } = pipeline;

    let mut mock = MockSource::new(SAMPLE_RATE);
    mock.generate_noise(2 * BLOCK_MS, 0.2);
    producer.push_slice(&mock.take_samples());

    // Well below the batch size of 100: only the periodic trigger can
    // flush these.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.record_count(), 2);

    session.stop().await.unwrap();
}

// ---------------------------------------------------------------------------
// Live database tests. Run manually with:
//   SOUNDSCAPE_TEST_DB_NAME=... cargo test -- --ignored
// ---------------------------------------------------------------------------

mod live_db {
    use super::*;
    use soundscape_monitor::{
        connect_pool, ensure_schema, DbConfig, FeatureRecord, FrequencyBands, SensorRegistry,
        TimescaleSink,
    };

    fn env_or(name: &str, default: &str) -> String {
        std::env::var(name).unwrap_or_else(|_| default.to_string())
    }

    fn live_config() -> DbConfig {
        DbConfig {
            host: env_or("SOUNDSCAPE_TEST_DB_HOST", "localhost"),
            port: env_or("SOUNDSCAPE_TEST_DB_PORT", "5432").parse().unwrap(),
            dbname: env_or("SOUNDSCAPE_TEST_DB_NAME", "soundscape_test"),
            user: env_or("SOUNDSCAPE_TEST_DB_USER", "postgres"),
            password: env_or("SOUNDSCAPE_TEST_DB_PASSWORD", "postgres"),
        }
    }

    fn unique_sensor_id() -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }

    #[tokio::test]
    #[ignore = "requires a running TimescaleDB"]
    async fn test_registration_is_idempotent() {
        let timeout = Duration::from_secs(5);
        let pool = connect_pool(&live_config(), timeout).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let registry = SensorRegistry::new(pool, timeout);
        let sensor_id = unique_sensor_id();

        assert!(registry
            .register_if_absent(&sensor_id, "test-loc")
            .await
            .unwrap());
        assert!(!registry
            .register_if_absent(&sensor_id, "test-loc")
            .await
            .unwrap());

        let info = registry.fetch(&sensor_id).await.unwrap().unwrap();
        assert_eq!(info.location_id, "test-loc");
        assert_eq!(info.description.as_deref(), Some("Sensor at test-loc"));
    }

    #[tokio::test]
    #[ignore = "requires a running TimescaleDB"]
    async fn test_flush_inserts_all_rows_in_one_batch() {
        let timeout = Duration::from_secs(5);
        let pool = connect_pool(&live_config(), timeout).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let sensor_id = unique_sensor_id();
        let registry = SensorRegistry::new(pool.clone(), timeout);
        registry
            .register_if_absent(&sensor_id, "test-loc")
            .await
            .unwrap();

        let sink = TimescaleSink::new(pool.clone(), timeout);
        let records: Vec<FeatureRecord> = (0..5)
            .map(|i| {
                FeatureRecord::new(
                    sensor_id.clone(),
                    "test-loc",
                    -30.0 - f64::from(i),
                    FrequencyBands::default(),
                )
            })
            .collect();

        assert_eq!(sink.flush(&records).await.unwrap(), 5);
        assert_eq!(sink.flush(&[]).await.unwrap(), 0);

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sound_metrics WHERE sensor_id = $1")
                .bind(&sensor_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    #[ignore = "requires a running TimescaleDB"]
    async fn test_failed_flush_leaves_store_unchanged() {
        let timeout = Duration::from_secs(5);
        let pool = connect_pool(&live_config(), timeout).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        // Unregistered sensor violates the foreign key: the whole batch
        // must roll back.
        let sensor_id = unique_sensor_id();
        let sink = TimescaleSink::new(pool.clone(), timeout);
        let records = vec![FeatureRecord::new(
            sensor_id.clone(),
            "test-loc",
            -30.0,
            FrequencyBands::default(),
        )];

        assert!(sink.flush(&records).await.is_err());

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sound_metrics WHERE sensor_id = $1")
                .bind(&sensor_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 0);
    }
}
