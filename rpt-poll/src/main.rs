//! rpt-poll - Radio play tracker polling daemon
//!
//! Samples configured live radio streams on a fixed cycle, identifies
//! what is playing via audio fingerprinting, resolves it against the
//! Spotify catalog, and records de-duplicated play events in SQLite.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rpt_common::config::Config;
use rpt_poll::registry::StationRegistry;
use rpt_poll::scheduler::{PollingScheduler, SchedulerSettings};
use rpt_poll::services::enrichment::EnrichmentResolver;
use rpt_poll::services::recognizer::RecognizerClient;
use rpt_poll::services::sampler::HttpStreamSampler;
use rpt_poll::services::spotify::SpotifyClient;

#[derive(Parser, Debug)]
#[command(name = "rpt-poll", about = "Radio play tracker polling daemon")]
struct Args {
    /// Path to config file (overrides RPT_CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting rpt-poll");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args.config.as_deref())?;
    info!(
        stations = config.stations.len(),
        interval_seconds = config.poll_interval_seconds,
        "Configuration loaded"
    );

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = rpt_common::db::init_database_pool(&db_path).await?;

    let sampler = HttpStreamSampler::new(config.work_dir(), config.sample_seconds)?;
    let recognizer = RecognizerClient::new(
        config.recognizer.url.clone(),
        config.recognizer.api_key.clone(),
    )?;
    let catalog = SpotifyClient::new(
        config.spotify.client_id.clone(),
        config.spotify.client_secret.clone(),
    )?;
    let enricher = EnrichmentResolver::new(config.civil_offset_hours);

    let registry = StationRegistry::load(&pool, config.stations.clone()).await?;

    let settings = SchedulerSettings {
        poll_interval: Duration::from_secs(config.poll_interval_seconds),
        station_timeout: Duration::from_secs(config.station_timeout_seconds),
        heartbeat_path: config.heartbeat_path.clone(),
    };

    let mut scheduler = PollingScheduler::new(
        pool, registry, sampler, recognizer, catalog, enricher, settings,
    );

    if args.once {
        scheduler.run_cycle().await;
        info!("Single cycle complete");
        return Ok(());
    }

    scheduler.run().await;

    Ok(())
}
