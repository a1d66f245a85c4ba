//! Local enhancement of the upscaled photo with caller-supplied parameters.

use async_trait::async_trait;
use chrono::Utc;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::asset_key::{category_key, AssetCategory};
use printframe_core::types::{DbId, UserId};
use printframe_events::bus::PlatformEvent;
use printframe_imaging::render;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{decode_payload, Workflow};
use crate::deps::PipelineDeps;
use crate::error::{RunError, StepError, WorkflowError};
use crate::queue::EVENT_ENHANCE;
use crate::step::StepContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancePayload {
    pub photo_id: DbId,
    pub adjustments: AdjustmentParameters,
}

/// Output of the `get-photo` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhanceSource {
    user_id: UserId,
    upscaled_path: String,
}

pub struct EnhanceWorkflow {
    deps: PipelineDeps,
}

impl EnhanceWorkflow {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    async fn process(&self, ctx: &StepContext, p: &EnhancePayload) -> Result<String, WorkflowError> {
        let source: EnhanceSource = ctx.run("get-photo", move || self.get_photo(p)).await?;
        let source = &source;

        let original = ctx
            .run_blob("download-image", move || self.download(&source.upscaled_path))
            .await?;
        let original = &original;

        let adjusted = ctx
            .run_blob("apply-adjustments", move || apply(original, &p.adjustments))
            .await?;
        let adjusted = &adjusted;

        let enhanced_path: String = ctx
            .run("upload-enhanced-image", move || self.upload(&source.user_id, adjusted))
            .await?;
        let enhanced = enhanced_path.as_str();

        ctx.run("update-photo", move || self.update_photo(p, enhanced))
            .await?;
        Ok(enhanced_path)
    }

    async fn get_photo(&self, p: &EnhancePayload) -> Result<EnhanceSource, StepError> {
        let photo = self
            .deps
            .photos
            .find(p.photo_id)
            .await?
            .ok_or_else(|| StepError::Permanent(format!("Photo {} not found", p.photo_id)))?;
        let upscaled_path = photo.enhancement_source()?.to_string();
        Ok(EnhanceSource {
            user_id: photo.user_id,
            upscaled_path,
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StepError> {
        Ok(self.deps.assets.fetch(key).await?)
    }

    async fn upload(&self, user_id: &str, bytes: &[u8]) -> Result<String, StepError> {
        let key = category_key(user_id, AssetCategory::Enhanced, Utc::now());
        self.deps.assets.put(&key, bytes.to_vec(), "image/jpeg").await?;
        Ok(key)
    }

    async fn update_photo(&self, p: &EnhancePayload, enhanced_path: &str) -> Result<(), StepError> {
        let photo = self
            .deps
            .photos
            .set_enhanced(p.photo_id, enhanced_path, &p.adjustments)
            .await?
            .ok_or_else(|| {
                StepError::Permanent(format!(
                    "Photo {} is missing or no longer has a completed upscale",
                    p.photo_id
                ))
            })?;
        self.deps.events.publish(PlatformEvent::photo_updated(&photo)).await;
        Ok(())
    }
}

/// Run the final render path off the async runtime.
async fn apply(image: &[u8], params: &AdjustmentParameters) -> Result<Vec<u8>, StepError> {
    let image = image.to_vec();
    let params = params.clone();
    tokio::task::spawn_blocking(move || render::render_final(&image, &params))
        .await
        .map_err(|e| StepError::Permanent(format!("Render task failed: {e}")))?
        .map_err(StepError::from)
}

#[async_trait]
impl Workflow for EnhanceWorkflow {
    fn event_name(&self) -> &'static str {
        EVENT_ENHANCE
    }

    async fn run(&self, ctx: &StepContext, payload: serde_json::Value) -> Result<serde_json::Value, RunError> {
        let p: EnhancePayload = decode_payload(payload)?;
        if let Err(errors) = p.adjustments.validate() {
            return Err(RunError::Terminal(format!("Invalid adjustments: {errors}")));
        }

        match self.process(ctx, &p).await {
            Ok(enhanced_path) => {
                tracing::info!(photo_id = p.photo_id, enhanced_path = %enhanced_path, "Enhancements applied");
                Ok(serde_json::json!({ "success": true, "enhancedImagePath": enhanced_path }))
            }
            Err(e) => {
                tracing::error!(photo_id = p.photo_id, error = %e, "Applying enhancements failed");
                Err(RunError::Terminal(e.to_string()))
            }
        }
    }
}
