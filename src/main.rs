//! The soundscape-monitor binary: capture audio, extract features, persist
//! to TimescaleDB until interrupted.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use soundscape_monitor::{
    connect_pool, ensure_schema, DbConfig, MonitorBuilder, MonitorConfig, MonitorError,
    SensorRegistry, TimescaleSink,
};

/// Continuous acoustic monitoring into a TimescaleDB hypertable.
#[derive(Debug, Parser)]
#[command(name = "soundscape-monitor", version, about)]
struct Args {
    /// Database host
    #[arg(long, default_value = "localhost")]
    db_host: String,

    /// Database port
    #[arg(long, default_value_t = 5432)]
    db_port: u16,

    /// Database name
    #[arg(long)]
    db_name: String,

    /// Database user
    #[arg(long)]
    db_user: String,

    /// Database password
    #[arg(long, env = "SOUNDSCAPE_DB_PASSWORD")]
    db_password: String,

    /// Location identifier for this monitor
    #[arg(long)]
    location_id: String,

    /// Sensor identifier (random if omitted)
    #[arg(long)]
    sensor_id: Option<String>,

    /// Audio sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Duration of one capture block in milliseconds
    #[arg(long, default_value_t = 100)]
    block_duration_ms: u64,

    /// Number of buffered records that triggers a flush
    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    /// Periodic flush interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    flush_interval_ms: u64,

    /// Upper bound on any single database operation, in seconds
    #[arg(long, default_value_t = 5)]
    db_timeout_secs: u64,

    /// Capture from a specific input device instead of the default
    #[arg(long)]
    device: Option<String>,
}

impl Args {
    fn monitor_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::new(&self.location_id);
        if let Some(ref sensor_id) = self.sensor_id {
            config.sensor_id = sensor_id.clone();
        }
        config.sample_rate = self.sample_rate;
        config.block_duration = Duration::from_millis(self.block_duration_ms);
        config.batch_size = self.batch_size;
        config.flush_interval = Duration::from_millis(self.flush_interval_ms);
        config.db_timeout = Duration::from_secs(self.db_timeout_secs);
        config
    }

    fn db_config(&self) -> DbConfig {
        DbConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            dbname: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.monitor_config();
    let db = args.db_config();

    let pool = connect_pool(&db, config.db_timeout)
        .await
        .with_context(|| format!("connecting to {}:{}", db.host, db.port))?;
    tracing::info!(host = %db.host, port = db.port, "connected to TimescaleDB");

    ensure_schema(&pool)
        .await
        .context("database schema setup failed")?;

    // Register this instance strictly before capture starts.
    let registry = SensorRegistry::new(pool.clone(), config.db_timeout);
    registry
        .register_if_absent(&config.sensor_id, &config.location_id)
        .await
        .map_err(MonitorError::Registration)?;

    let sink = Arc::new(TimescaleSink::new(pool, config.db_timeout));

    let mut builder = MonitorBuilder::new(config.clone()).sink(sink);
    if let Some(ref device) = args.device {
        builder = builder.device(device);
    }
    let session = builder.start()?;

    tracing::info!(
        sensor_id = %config.sensor_id,
        location_id = %config.location_id,
        "audio monitoring started, press Ctrl+C to stop"
    );

    wait_for_shutdown().await?;
    tracing::info!("shutdown signal received");

    session.stop().await?;
    Ok(())
}

/// Resolves when SIGINT or SIGTERM is delivered.
async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = term.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
