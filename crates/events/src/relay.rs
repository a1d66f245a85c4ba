//! Bridge from Postgres `NOTIFY` to the in-process [`EventBus`].
//!
//! [`PgEventRelay`] runs as a long-lived background task in the API
//! process. It shuts down when the cancellation token fires.
//!
//! Notifications sent while the listener is reconnecting are lost; push
//! delivery is best effort and clients reconcile against job status.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::bus::{EventBus, PlatformEvent};
use crate::publisher::NOTIFY_CHANNEL;

/// Pause before re-establishing a failed listener.
const RELISTEN_DELAY: Duration = Duration::from_secs(2);

pub struct PgEventRelay {
    pool: PgPool,
    bus: Arc<EventBus>,
}

impl PgEventRelay {
    pub fn new(pool: PgPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Run the relay loop until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(channel = NOTIFY_CHANNEL, "Event relay started");
        loop {
            let mut listener = match self.listen().await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::warn!(error = %e, "Event relay could not listen, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RELISTEN_DELAY) => continue,
                    }
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Event relay stopping");
                        return;
                    }
                    notification = listener.recv() => match notification {
                        Ok(notification) => self.forward(notification.payload()),
                        Err(e) => {
                            tracing::warn!(error = %e, "Event relay connection lost");
                            break;
                        }
                    }
                }
            }
        }
        tracing::info!("Event relay stopping");
    }

    async fn listen(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;
        Ok(listener)
    }

    fn forward(&self, payload: &str) {
        match serde_json::from_str::<PlatformEvent>(payload) {
            Ok(event) => self.bus.publish(event),
            Err(e) => tracing::warn!(error = %e, "Dropping malformed event notification"),
        }
    }
}
