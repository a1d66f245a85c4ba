//! Standalone workflow worker.
//!
//! Claims runs from the shared Postgres queue and publishes job changes
//! through `NOTIFY`, so any number of workers can run beside the API.

use std::sync::Arc;

use anyhow::Context;
use printframe_db::Stores;
use printframe_events::{EventPublisher, PgNotifyPublisher};
use printframe_pipeline::workflows::WorkflowRegistry;
use printframe_pipeline::{Dispatcher, PipelineConfig, PipelineDeps};
use printframe_storage::{build_asset_store, StorageConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "printframe_worker=debug,printframe_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PipelineConfig::from_env();
    let storage_config = StorageConfig::from_env();

    // A worker without a shared queue would never see API submissions.
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = printframe_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    printframe_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let stores = Stores::postgres(pool.clone());
    let events: Arc<dyn EventPublisher> = Arc::new(PgNotifyPublisher::new(pool));
    let assets = build_asset_store(&storage_config).await;
    let deps = PipelineDeps::new(&stores, assets, events)
        .with_upscaler(config.upscaler())
        .with_vision(config.vision());

    let dispatcher = Dispatcher::new(
        stores.runs.clone(),
        stores.steps.clone(),
        WorkflowRegistry::standard(deps),
        &config,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    tracing::info!(
        max_concurrency = config.max_concurrency,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Worker started",
    );
    dispatcher.run(cancel).await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// Resolve on SIGINT or, on Unix, SIGTERM. Runs in flight finish first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, stopping worker"),
        () = terminate => tracing::info!("Received SIGTERM, stopping worker"),
    }
}
