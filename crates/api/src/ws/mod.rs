//! Job push channel: connection management, heartbeat and the HTTP upgrade
//! handler.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{handle_client_text, ws_handler};
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::WsManager;
