#![doc = include_str!("../README.md")]

mod app;

use anyhow::Context;
use app::config::{AppConfig, CliArgs};
use app::export::write_merged_csv;
use app::telemetry::init_telemetry;
use clap::Parser;
use geoshard::{ParquetStore, Pipeline, YandexGeocoder};
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    let providers = init_telemetry()?;
    let res = run(config).await;
    if let Err(e) = &res {
        tracing::error!("Run failed: {e:#}");
    }
    providers.shutdown();
    res
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    log_startup_info(&config);

    let addresses = geoshard::input::read_addresses(&config.input, &config.address_column)
        .with_context(|| format!("failed to read addresses from {}", config.input.display()))?;
    let keys = config.load_api_keys()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let geocoder = YandexGeocoder::new(config.geocoder.clone())?;
    let store = ParquetStore::new(&config.checkpoint);

    let table = Pipeline::new(geocoder, store, config.pipeline.clone())
        .with_shutdown(shutdown.clone())
        .run(&addresses, keys)
        .await
        .context("geocoding run failed")?;

    let summary = table.summary();
    tracing::info!(
        "Checkpoint {} holds {} addresses: {} resolved, {} without coordinates",
        config.checkpoint.display(),
        summary.total,
        summary.resolved,
        summary.unresolved
    );
    if shutdown.is_cancelled() {
        tracing::warn!("Run was interrupted; run again to continue from the checkpoint");
    }

    if let Some(output) = &config.output {
        let merged = table.merge_into(&addresses);
        let located = merged.iter().filter(|(_, coords)| coords.is_some()).count();
        write_merged_csv(output, &merged)?;
        tracing::info!(
            "Wrote {} rows ({located} with coordinates) to {}",
            merged.len(),
            output.display()
        );
    }

    Ok(())
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting geocoding run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting geocoding run: input {}, checkpoint {}",
            config.input.display(),
            config.checkpoint.display()
        );
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = shutdown.cancelled() => return,
    }

    tracing::info!("Stopping workers, flushing results already received...");
    shutdown.cancel();
}
