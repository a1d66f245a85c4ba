//! Where the pipeline sends its change events.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::bus::{EventBus, PlatformEvent};

/// Postgres `NOTIFY` channel carrying serialized [`PlatformEvent`]s.
pub const NOTIFY_CHANNEL: &str = "printframe_events";

/// Fire-and-forget event sink. Delivery failures are logged, never raised:
/// the record store is the source of truth and clients poll as a fallback.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PlatformEvent);
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: PlatformEvent) {
        EventBus::publish(self, event);
    }
}

/// Publishes through `pg_notify` so API processes other than the one
/// running the workflow can forward the event (see [`PgEventRelay`]).
///
/// [`PgEventRelay`]: crate::relay::PgEventRelay
pub struct PgNotifyPublisher {
    pool: PgPool,
}

impl PgNotifyPublisher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventPublisher for PgNotifyPublisher {
    async fn publish(&self, event: PlatformEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, event_type = %event.event_type, "Failed to serialize event");
                return;
            }
        };
        let result = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(&payload)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, event_type = %event.event_type, "Failed to notify event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn bus_publisher_delivers_to_subscribers() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let publisher: Arc<dyn EventPublisher> = bus.clone();

        publisher.publish(PlatformEvent::new("photo.updated")).await;

        assert_eq!(rx.recv().await.unwrap().event_type, "photo.updated");
    }
}
