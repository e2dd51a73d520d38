//! # Weather Station
//!
//! Wakes on a fixed cadence, samples the sensors, logs the observation locally,
//! submits it to the collector and sleeps until the next cycle.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use weather_station::clock::SystemClock;
use weather_station::config::Config;
use weather_station::cycle::{Collaborators, NextAction, StateStore, Station};
use weather_station::sensors::feed::FeedSensors;
use weather_station::submission::{HostLink, HttpsTransport};

/// Exit status asking the supervisor to restart the station
const RESTART_EXIT_CODE: i32 = 75;

/// File name prefix for daily rolling logs
const LOG_FILE_PREFIX: &str = "weather-station.log";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(version, about = "Solar-powered outdoor weather station")]
struct Args {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "WEATHER_STATION_CONFIG",
        default_value = "config/station.toml"
    )]
    config: PathBuf,

    /// Run a single cycle and exit instead of sleeping
    #[arg(long)]
    once: bool,
}

/// Set up stdout logging, plus a daily rolling file when `dir` is set.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    match dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Build the station and its host collaborators from `config`.
fn build_station(config: &Config) -> Result<Station> {
    let clock = SystemClock::new(
        config.time.gmt_offset_sec,
        &config.time.timezone,
        Duration::from_millis(config.time.ntp_timeout_ms),
    )?;
    let transport = HttpsTransport::new(Duration::from_millis(config.server.request_timeout_ms))?;

    let station = Station::new(
        config,
        Collaborators {
            sensors: Box::new(FeedSensors::new(&config.sensors.feed_path)),
            clock: Box::new(clock),
            link: Box::new(HostLink::new()),
            transport: Box::new(transport),
        },
    )?;
    Ok(station)
}

/// Swap in staged settings picked up while the station slept.
///
/// Returns `true` when `config` was replaced. Import failures are logged and
/// the running configuration is kept.
fn apply_staged(config: &mut Config, config_path: &Path) -> bool {
    match config.import_staged(config_path) {
        Ok(Some(imported)) => {
            *config = imported;
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!("Failed to import staged settings: {}", e);
            false
        }
    }
}

/// Main entry point for the weather station
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Import a staged `settings.toml` from the data directory, if present
///    - Build the station from its collaborators
///    - Load the persisted station state
///
/// 2. **Main Loop**
///    - Run one wake cycle and persist the resulting state
///    - Sleep for the remaining interval, or exit for a restart
///    - On wake, apply settings staged while asleep and rebuild the station
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded or is invalid
/// - The sensors cannot be detected (the station halts)
///
/// # Examples
///
/// ```bash
/// weather-station --config config/station.toml
/// weather-station --once
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let guard = init_logging(config.logging.dir.as_deref());

    info!("Weather Station v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(imported) = config
        .import_staged(&args.config)
        .context("Failed to import staged settings")?
    {
        config = imported;
    }

    let mut station = build_station(&config)?;

    let mut store = StateStore::new(&config.storage.state_file);
    let mut state = store.load();
    info!(
        "Station state: needs_clock_sync={}, last_sync_hour={}",
        state.needs_clock_sync, state.last_sync_hour
    );

    loop {
        let report = match station.run_cycle(state).await {
            Ok(report) => report,
            Err(e) => {
                error!("Station halted: {}", e);
                return Err(e.into());
            }
        };

        state = report.next_state;
        if let Err(e) = store.save(&state) {
            warn!("Failed to persist station state: {}", e);
        }

        match report.next_action {
            NextAction::Restart => {
                error!("Restarting station");
                drop(guard);
                std::process::exit(RESTART_EXIT_CODE);
            }
            NextAction::Sleep(duration) => {
                if args.once {
                    info!("Single cycle complete");
                    break;
                }

                info!("Sleeping for {:?}", duration);
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                        break;
                    }
                }

                if apply_staged(&mut config, &args.config) {
                    station = build_station(&config)?;
                    store = StateStore::new(&config.storage.state_file);
                    state.needs_clock_sync = true;
                }
            }
        }
    }

    Ok(())
}
