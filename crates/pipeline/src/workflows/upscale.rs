//! Remote upscale: pending → processing → completed | failed.

use async_trait::async_trait;
use chrono::Utc;
use printframe_adapters::{EnhanceOptions, UpscaleService};
use printframe_core::asset_key::{category_key, resolve_owned_key, AssetCategory};
use printframe_core::status::UpscaleStatus;
use printframe_core::types::{DbId, UserId};
use printframe_core::upscale_job::UpscaleJob;
use serde::{Deserialize, Serialize};

use super::{decode_payload, Workflow};
use crate::deps::PipelineDeps;
use crate::error::{RunError, StepError, WorkflowError};
use crate::queue::EVENT_UPSCALE;
use crate::step::StepContext;

/// Failure recorded when no upscale credential is configured.
pub const UPSCALE_KEY_MISSING: &str = "Upscale API key not configured";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpscalePayload {
    pub job_id: DbId,
    pub photo_id: DbId,
    pub user_id: UserId,
    pub source_path: String,
}

pub struct UpscaleWorkflow {
    deps: PipelineDeps,
}

impl UpscaleWorkflow {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    async fn process(
        &self,
        ctx: &StepContext,
        p: &UpscalePayload,
        upscaler: &dyn UpscaleService,
    ) -> Result<String, WorkflowError> {
        ctx.run("update-status-processing", move || self.mark_processing(p))
            .await?;

        let key: String = ctx.run("resolve-source", move || self.resolve_source(p)).await?;
        let key = key.as_str();

        let source = ctx
            .run_blob("download-image", move || self.download(key))
            .await?;
        let source = &source;

        let sharpened = ctx
            .run_blob("topaz-sharpen", move || sharpen(upscaler, source))
            .await?;
        let sharpened = &sharpened;

        let options = EnhanceOptions::default();
        let options = &options;
        let enhanced = ctx
            .run_blob("topaz-enhance", move || enhance(upscaler, sharpened, options))
            .await?;
        let enhanced = &enhanced;

        let result_path: String = ctx
            .run("upload-enhanced-image", move || self.upload(p, enhanced))
            .await?;
        let result = result_path.as_str();

        ctx.run("mark-completed", move || self.mark_completed(p, result))
            .await?;
        Ok(result_path)
    }

    async fn mark_processing(&self, p: &UpscalePayload) -> Result<(), StepError> {
        let job = match self.deps.jobs.mark_processing(p.job_id).await? {
            Some(job) => job,
            // Already moved by an earlier invocation whose step result was lost.
            None => self.expect_status(p.job_id, UpscaleStatus::Processing).await?,
        };
        self.deps.mirror_job(&job).await?;
        tracing::info!(job_id = job.id, photo_id = job.photo_id, "Upscale job processing");
        Ok(())
    }

    async fn resolve_source(&self, p: &UpscalePayload) -> Result<String, StepError> {
        Ok(resolve_owned_key(&p.source_path, self.deps.assets.bucket(), &p.user_id)?)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StepError> {
        Ok(self.deps.assets.fetch(key).await?)
    }

    async fn upload(&self, p: &UpscalePayload, bytes: &[u8]) -> Result<String, StepError> {
        let key = category_key(&p.user_id, AssetCategory::TopazEnhanced, Utc::now());
        self.deps.assets.put(&key, bytes.to_vec(), "image/jpeg").await?;
        Ok(key)
    }

    async fn mark_completed(&self, p: &UpscalePayload, result_path: &str) -> Result<(), StepError> {
        let job = match self.deps.jobs.complete(p.job_id, result_path).await? {
            Some(job) => job,
            None => self.expect_status(p.job_id, UpscaleStatus::Completed).await?,
        };
        self.deps.mirror_job(&job).await?;
        tracing::info!(job_id = job.id, result_path, "Upscale job completed");
        Ok(())
    }

    async fn expect_status(&self, job_id: DbId, expected: UpscaleStatus) -> Result<UpscaleJob, StepError> {
        match self.deps.jobs.find(job_id).await? {
            Some(job) if job.status == expected => Ok(job),
            Some(job) => Err(StepError::Permanent(format!(
                "Upscale job {job_id} is {}, cannot become {expected}",
                job.status
            ))),
            None => Err(StepError::Permanent(format!("Upscale job {job_id} not found"))),
        }
    }

    async fn mark_failed(&self, p: &UpscalePayload, message: &str) -> Result<bool, StepError> {
        Ok(self.deps.fail_job(p.job_id, message).await?.is_some())
    }

    /// Catch-all: record the terminal failure on the job and photo.
    async fn record_failure(&self, ctx: &StepContext, p: &UpscalePayload, message: &str) -> RunError {
        tracing::error!(job_id = p.job_id, photo_id = p.photo_id, error = message, "Upscale failed");
        let recorded = ctx.run("mark-failed", move || self.mark_failed(p, message)).await;

        match recorded {
            Ok(_) => RunError::Terminal(message.to_string()),
            Err(e) => {
                tracing::error!(job_id = p.job_id, error = %e, "Could not record upscale failure");
                RunError::Unrecorded(format!("{message} (failure not recorded: {e})"))
            }
        }
    }
}

async fn sharpen(upscaler: &dyn UpscaleService, image: &[u8]) -> Result<Vec<u8>, StepError> {
    Ok(upscaler.sharpen(image.to_vec()).await?)
}

async fn enhance(
    upscaler: &dyn UpscaleService,
    image: &[u8],
    options: &EnhanceOptions,
) -> Result<Vec<u8>, StepError> {
    Ok(upscaler.enhance(image.to_vec(), options).await?)
}

#[async_trait]
impl Workflow for UpscaleWorkflow {
    fn event_name(&self) -> &'static str {
        EVENT_UPSCALE
    }

    async fn run(&self, ctx: &StepContext, payload: serde_json::Value) -> Result<serde_json::Value, RunError> {
        let p: UpscalePayload = decode_payload(payload)?;

        let Some(upscaler) = self.deps.upscaler.clone() else {
            return Err(self.record_failure(ctx, &p, UPSCALE_KEY_MISSING).await);
        };

        match self.process(ctx, &p, upscaler.as_ref()).await {
            Ok(result_path) => Ok(serde_json::json!({ "success": true, "resultPath": result_path })),
            Err(e) => Err(self.record_failure(ctx, &p, &e.to_string()).await),
        }
    }
}
