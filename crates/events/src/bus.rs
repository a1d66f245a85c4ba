//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PlatformEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use printframe_core::photo::Photo;
use printframe_core::status::UpscaleStatus;
use printframe_core::types::{DbId, UserId};
use printframe_core::upscale_job::UpscaleJob;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An upscale job changed status.
pub const EVENT_JOB_UPDATED: &str = "upscale_job.updated";

/// A photo's derived assets or recommendations changed.
pub const EVENT_PHOTO_UPDATED: &str = "photo.updated";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event.
///
/// Constructed via [`PlatformEvent::new`] and enriched with the builder
/// methods, or via the typed constructors [`job_updated`](Self::job_updated)
/// and [`photo_updated`](Self::photo_updated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"upscale_job.updated"`.
    pub event_type: String,

    /// Optional source entity kind (e.g. `"upscale_job"`, `"photo"`).
    pub source_entity_type: Option<String>,

    /// Optional source entity database id.
    pub source_entity_id: Option<DbId>,

    /// Owner of the source entity. Push delivery is scoped to this user.
    pub owner_user_id: Option<UserId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            owner_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_owner(mut self, user_id: impl Into<UserId>) -> Self {
        self.owner_user_id = Some(user_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Status change of an upscale job. Never carries asset URLs.
    pub fn job_updated(job: &UpscaleJob) -> Self {
        let update = JobUpdate {
            job_id: job.id,
            photo_id: job.photo_id,
            status: job.status,
            error_message: job.error_message.clone(),
        };
        Self::new(EVENT_JOB_UPDATED)
            .with_source("upscale_job", job.id)
            .with_owner(job.user_id.clone())
            .with_payload(serde_json::to_value(update).unwrap_or_default())
    }

    pub fn photo_updated(photo: &Photo) -> Self {
        Self::new(EVENT_PHOTO_UPDATED)
            .with_source("photo", photo.id)
            .with_owner(photo.user_id.clone())
            .with_payload(serde_json::json!({
                "photoId": photo.id,
                "upscaleStatus": photo.upscale_status,
                "hasRecommendations": photo.ai_recommendations.is_some(),
                "hasEnhanced": photo.enhanced_path.is_some(),
            }))
    }

    /// Decode the payload of a job update event.
    pub fn job_update(&self) -> Option<JobUpdate> {
        if self.event_type != EVENT_JOB_UPDATED {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Payload of [`EVENT_JOB_UPDATED`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub job_id: DbId,
    pub photo_id: DbId,
    pub status: UpscaleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PlatformEvent) {
        // A send error only means nobody is subscribed.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: UpscaleStatus) -> UpscaleJob {
        UpscaleJob {
            id: 5,
            photo_id: 9,
            user_id: "u1".into(),
            status,
            source_path: "u1/cropped_1.jpg".into(),
            result_path: Some("u1/topaz_enhanced_2.jpg".into()),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(PlatformEvent::job_updated(&job(UpscaleStatus::Processing)));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EVENT_JOB_UPDATED);
        assert_eq!(received.source_entity_id, Some(5));
        assert_eq!(received.owner_user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(PlatformEvent::new("one"));
        bus.publish(PlatformEvent::new("two"));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().event_type, "one");
            assert_eq!(rx.recv().await.unwrap().event_type, "two");
        }
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        EventBus::default().publish(PlatformEvent::new("nobody.listening"));
    }

    #[test]
    fn job_update_payload_omits_result_path() {
        let event = PlatformEvent::job_updated(&job(UpscaleStatus::Completed));
        assert!(event.payload.get("resultPath").is_none());
        let update = event.job_update().unwrap();
        assert_eq!(update.job_id, 5);
        assert_eq!(update.status, UpscaleStatus::Completed);
    }

    #[test]
    fn job_update_ignores_other_events() {
        assert_eq!(PlatformEvent::new(EVENT_PHOTO_UPDATED).job_update(), None);
    }
}
