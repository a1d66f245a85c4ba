use std::sync::Arc;

use printframe_core::types::DbId;
use printframe_db::RunStore;
use serde::Serialize;

use crate::error::QueueError;

/// Remote upscale of a cropped photo.
pub const EVENT_UPSCALE: &str = "topaz/process";
/// Vision analysis producing adjustment recommendations.
pub const EVENT_ANALYZE: &str = "ai/analyze-image";
/// Local pixel adjustment of the upscaled photo.
pub const EVENT_ENHANCE: &str = "image/apply-enhancements";

pub const KNOWN_EVENTS: [&str; 3] = [EVENT_UPSCALE, EVENT_ANALYZE, EVENT_ENHANCE];

/// Submission side of the run queue.
#[derive(Clone)]
pub struct WorkflowQueue {
    runs: Arc<dyn RunStore>,
}

impl WorkflowQueue {
    pub fn new(runs: Arc<dyn RunStore>) -> Self {
        Self { runs }
    }

    /// Persist a queued run and return its id. Business failures surface
    /// later, inside the run; this only fails on an unknown event or a
    /// storage error.
    pub async fn submit<P: Serialize>(&self, event_name: &str, payload: &P) -> Result<DbId, QueueError> {
        if !KNOWN_EVENTS.contains(&event_name) {
            return Err(QueueError::UnknownEvent(event_name.to_string()));
        }
        let payload = serde_json::to_value(payload)?;
        let run = self.runs.enqueue(event_name, &payload).await?;
        tracing::info!(run_id = run.id, event = event_name, "Workflow run queued");
        Ok(run.id)
    }
}
