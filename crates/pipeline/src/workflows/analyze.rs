//! Vision analysis. No job record: the presence of recommendations on the
//! photo is the completion signal, and failures are only logged.

use async_trait::async_trait;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::asset_key::{content_type_for_key, resolve_owned_key};
use printframe_core::types::DbId;
use printframe_events::bus::PlatformEvent;
use serde::{Deserialize, Serialize};

use super::{decode_payload, Workflow};
use crate::deps::PipelineDeps;
use crate::error::{RunError, StepError, WorkflowError};
use crate::queue::EVENT_ANALYZE;
use crate::step::StepContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePayload {
    pub photo_id: DbId,
    /// Asset key or storage URL of the image to analyze.
    pub image_url: String,
}

pub struct AnalyzeWorkflow {
    deps: PipelineDeps,
}

impl AnalyzeWorkflow {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    async fn process(&self, ctx: &StepContext, p: &AnalyzePayload) -> Result<AdjustmentParameters, WorkflowError> {
        let key: String = ctx.run("resolve-image", move || self.resolve_image(p)).await?;
        let key = key.as_str();

        let image = ctx
            .run_blob("download-image", move || self.download(key))
            .await?;
        let image = image.as_slice();

        let recommendations: AdjustmentParameters = ctx
            .run("call-vision", move || self.call_vision(key, image))
            .await?;
        let saved = &recommendations;

        ctx.run("save-recommendations", move || self.save(p, saved))
            .await?;
        Ok(recommendations)
    }

    /// The image must belong to the photo's owner.
    async fn resolve_image(&self, p: &AnalyzePayload) -> Result<String, StepError> {
        let photo = self
            .deps
            .photos
            .find(p.photo_id)
            .await?
            .ok_or_else(|| StepError::Permanent(format!("Photo {} not found", p.photo_id)))?;
        Ok(resolve_owned_key(&p.image_url, self.deps.assets.bucket(), &photo.user_id)?)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StepError> {
        Ok(self.deps.assets.fetch(key).await?)
    }

    async fn call_vision(&self, key: &str, image: &[u8]) -> Result<AdjustmentParameters, StepError> {
        let vision = self
            .deps
            .vision
            .as_ref()
            .ok_or_else(|| StepError::Permanent("Vision API key not configured".into()))?;
        Ok(vision.analyze(image, content_type_for_key(key)).await?)
    }

    async fn save(&self, p: &AnalyzePayload, params: &AdjustmentParameters) -> Result<(), StepError> {
        let photo = self
            .deps
            .photos
            .set_recommendations(p.photo_id, params)
            .await?
            .ok_or_else(|| StepError::Permanent(format!("Photo {} not found", p.photo_id)))?;
        self.deps.events.publish(PlatformEvent::photo_updated(&photo)).await;
        Ok(())
    }
}

#[async_trait]
impl Workflow for AnalyzeWorkflow {
    fn event_name(&self) -> &'static str {
        EVENT_ANALYZE
    }

    async fn run(&self, ctx: &StepContext, payload: serde_json::Value) -> Result<serde_json::Value, RunError> {
        let p: AnalyzePayload = decode_payload(payload)?;

        match self.process(ctx, &p).await {
            Ok(recommendations) => {
                tracing::info!(photo_id = p.photo_id, "Image analysis saved");
                Ok(serde_json::json!({ "success": true, "recommendations": recommendations }))
            }
            Err(e) => {
                tracing::error!(photo_id = p.photo_id, error = %e, "Image analysis failed");
                Err(RunError::Terminal(e.to_string()))
            }
        }
    }
}
