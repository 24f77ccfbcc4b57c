//! Archive Server
//!
//! Serves the view-tracking pipeline, comments, likes and analytics over HTTP.

use std::path::Path;

use anyhow::Context;
use archive_server::api::{shutdown_signal, start_api_server};
use archive_server::core::config::parse_duration;
use archive_server::core::factory::create_app_state;
use archive_server::core::logging::init_logging;
use archive_server::{system, Config, Error};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let matches = Command::new(archive_server::NAME)
        .version(archive_server::VERSION)
        .about("Document archive back end with batched view tracking.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP server bind address"),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("Postgres connection string"),
        )
        .arg(
            Arg::new("storage-type")
                .long("storage-type")
                .value_name("TYPE")
                .help("Storage backend type (postgres, memory)"),
        )
        .arg(
            Arg::new("drain-mode")
                .long("drain-mode")
                .value_name("MODE")
                .help("Queue drain mode (atomic, copy_then_delete)"),
        )
        .arg(
            Arg::new("drain-interval")
                .long("drain-interval")
                .value_name("DURATION")
                .help("Drain the queue in-process on this interval, e.g. 5m"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("drain-once")
                .long("drain-once")
                .action(ArgAction::SetTrue)
                .help("Run a single drain and exit instead of serving"),
        )
        .get_matches();

    // Load configuration
    let config_path = matches.get_one::<String>("config").map(Path::new);
    let mut config = Config::load(config_path)?;
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    init_logging(&config.logging)?;
    system::metrics::init_registry();
    system::mark_started();

    info!("Starting {} v{}", archive_server::NAME, archive_server::VERSION);
    if config.cron_secret().is_none() {
        warn!("CRON_SECRET is not set; the drain endpoint accepts any caller");
    }

    let app_state = create_app_state(config)
        .await
        .context("failed to initialize storage")?;

    if matches.get_flag("drain-once") {
        let outcome = app_state.drain_once().await?;
        info!(processed = outcome.processed, "Single drain complete");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = app_state.spawn_scheduler(shutdown_rx);

    let server_shutdown = async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, initiating graceful shutdown...");
        let _ = shutdown_tx.send(true);
    };
    start_api_server(app_state, server_shutdown)
        .await
        .context("HTTP server failed")?;

    if let Some(scheduler) = scheduler {
        let runs = scheduler.join().await;
        info!(runs, "Drain scheduler joined");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> archive_server::Result<()> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
    }

    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database.url = Some(url.clone());
    }

    if let Some(storage_type) = matches.get_one::<String>("storage-type") {
        config.storage.storage_type = storage_type.parse()?;
    }

    if let Some(mode) = matches.get_one::<String>("drain-mode") {
        config.pipeline.drain_mode = mode.parse()?;
    }

    if let Some(interval) = matches.get_one::<String>("drain-interval") {
        config.pipeline.drain_interval = Some(
            parse_duration(interval)
                .map_err(|e| Error::config(format!("Invalid drain interval: {}", e)))?,
        );
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}
