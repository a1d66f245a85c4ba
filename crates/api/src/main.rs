use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use printframe_db::memory::MemoryStore;
use printframe_db::Stores;
use printframe_events::{EventBus, EventPublisher, PgEventRelay, PgNotifyPublisher};
use printframe_pipeline::workflows::WorkflowRegistry;
use printframe_pipeline::{Dispatcher, EnhancementService, PipelineConfig, PipelineDeps};
use printframe_storage::{build_asset_store, StorageConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use printframe_api::config::ServerConfig;
use printframe_api::notifications::NotificationRouter;
use printframe_api::router::build_app_router;
use printframe_api::state::AppState;
use printframe_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "printframe_api=debug,printframe_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let storage_config = StorageConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Record store ---
    let pool = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = printframe_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            printframe_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            printframe_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database ready, migrations applied");
            Some(pool)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            None
        }
    };
    let stores = match &pool {
        Some(pool) => Stores::postgres(pool.clone()),
        None => Stores::memory(Arc::new(MemoryStore::new())),
    };

    // --- Events ---
    // With Postgres every event goes through NOTIFY so workers in other
    // processes reach this process's push channel the same way.
    let event_bus = Arc::new(EventBus::default());
    let background_cancel = CancellationToken::new();
    let publisher: Arc<dyn EventPublisher> = match &pool {
        Some(pool) => {
            let relay = PgEventRelay::new(pool.clone(), Arc::clone(&event_bus));
            tokio::spawn(relay.run(background_cancel.clone()));
            Arc::new(PgNotifyPublisher::new(pool.clone())) as Arc<dyn EventPublisher>
        }
        None => Arc::clone(&event_bus) as Arc<dyn EventPublisher>,
    };

    // --- Pipeline ---
    let assets = build_asset_store(&storage_config).await;
    let deps = PipelineDeps::new(&stores, assets, publisher)
        .with_upscaler(pipeline_config.upscaler())
        .with_vision(pipeline_config.vision());
    let service = EnhancementService::new(deps.clone(), stores.runs.clone());

    let dispatcher_handle = if config.embedded_worker || pool.is_none() {
        let dispatcher = Dispatcher::new(
            stores.runs.clone(),
            stores.steps.clone(),
            WorkflowRegistry::standard(deps),
            &pipeline_config,
        );
        let cancel = background_cancel.clone();
        tracing::info!("Starting embedded workflow dispatcher");
        Some(tokio::spawn(async move { dispatcher.run(cancel).await }))
    } else {
        None
    };

    // --- Push channel ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), ws::HEARTBEAT_INTERVAL);
    let notification_router = NotificationRouter::new(Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));

    // --- App state ---
    let state = AppState {
        service,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        pool,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST address"), config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // In-flight runs finish their current step sequence before exit.
    background_cancel.cancel();
    if let Some(handle) = dispatcher_handle {
        if tokio::time::timeout(drain_timeout, handle).await.is_err() {
            tracing::warn!("Workflow dispatcher did not stop in time; abandoned runs will be recovered");
        }
    }

    ws_manager.shutdown_all().await;
    heartbeat_handle.abort();
    router_handle.abort();

    tracing::info!("Graceful shutdown complete");
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
