use std::sync::Arc;

use printframe_db::DbPool;
use printframe_events::EventBus;
use printframe_pipeline::EnhancementService;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Photo, job and asset operations.
    pub service: EnhancementService,
    pub config: Arc<ServerConfig>,
    /// Push channel connections.
    pub ws_manager: Arc<WsManager>,
    pub event_bus: Arc<EventBus>,
    /// Present when running against Postgres; `/health` probes it.
    pub pool: Option<DbPool>,
}
