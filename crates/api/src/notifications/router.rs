//! Forwards job updates from the event bus to push channel subscribers.

use std::sync::Arc;

use printframe_core::job_events::ServerMessage;
use printframe_events::PlatformEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Consumes the event bus and delivers `job_updated` messages.
///
/// Delivery is scoped to connections of the job's owner that subscribed to
/// that job id. Other event types are ignored.
pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.route_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Skipped updates are not replayed. Watching clients pick
                    // up the missed status from their live safety poll.
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event. Returns the number of connections reached.
    pub async fn route_event(&self, event: &PlatformEvent) -> usize {
        let (Some(update), Some(owner)) = (event.job_update(), event.owner_user_id.as_deref()) else {
            return 0;
        };
        let message = ServerMessage::JobUpdated {
            job_id: update.job_id,
            status: update.status,
            error_message: update.error_message,
        };
        let delivered = self
            .ws_manager
            .send_to_job_subscribers(owner, update.job_id, &message)
            .await;
        tracing::debug!(job_id = update.job_id, status = %update.status, delivered, "Job update pushed");
        delivered
    }
}
