//! Collage Backend
//!
//! Entry point: loads configuration, installs tracing, wires the queue, cache,
//! strategies and scheduler, optionally seeds the queue, then runs until Ctrl-C.

use std::path::Path;

use clap::Parser;
use collage_backend::Backend;

mod bootstrap;
mod cli;
mod tracing_setup;

use bootstrap::seed_from_file;
use cli::CliArgs;
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = load_config(args.config_path.as_deref())?;
    install_tracing_from_config(&config.logging);
    tracing::info!(
        config_path = %args
            .config_path
            .as_deref()
            .map_or_else(|| "-".into(), Path::to_string_lossy),
        interval_secs = config.scheduler.interval_secs,
        max_concurrent = config.scheduler.max_concurrent,
        "configuration loaded"
    );

    let backend = Backend::from_config(&config);

    if let Some(seed) = args.enqueue_path.as_deref() {
        seed_from_file(&backend, seed).await?;
    }

    backend.scheduler.start(config.scheduler.interval());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping scheduler");
    backend.scheduler.stop().await;

    let report = backend.scheduler.report().await;
    tracing::info!(
        queue_size = report.queue.queue_size,
        processing_count = report.queue.processing_count,
        cache_entries = report.cache.entry_count,
        iterations = report.scheduler.iterations,
        "collage backend stopped"
    );
    Ok(())
}

/// Load and validate configuration from file or defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<collage_config::Config> {
    let config = collage_config::load_config(path).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    collage_config::validate_config(&config).map_err(|e| {
        eprintln!("invalid configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(config)
}
