//! Synchronous operations behind the HTTP API. Every operation authorizes
//! ownership before touching anything.

use std::sync::Arc;

use chrono::Utc;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::asset_key::{category_key, content_type_for_key, original_key, resolve_owned_key, AssetCategory};
use printframe_core::error::CoreError;
use printframe_core::photo::{AspectRatio, Photo};
use printframe_core::status::UpscaleStatus;
use printframe_core::types::DbId;
use printframe_core::upscale_job::{JobStatusSnapshot, JobSubmission, UpscaleJob};
use printframe_db::{JobStore, PhotoStore, RunStore};
use printframe_events::bus::PlatformEvent;
use printframe_events::publisher::EventPublisher;
use printframe_storage::{AssetStore, StorageError, CLIENT_URL_TTL};
use validator::Validate;

use crate::deps::PipelineDeps;
use crate::error::ServiceError;
use crate::queue::{WorkflowQueue, EVENT_ANALYZE, EVENT_ENHANCE, EVENT_UPSCALE};
use crate::workflows::{AnalyzePayload, EnhancePayload, UpscalePayload};

/// Fixed failure recorded when a created job could not be queued.
pub const ENQUEUE_FAILED: &str = "Failed to queue upscale workflow";

#[derive(Clone)]
pub struct EnhancementService {
    deps: PipelineDeps,
    queue: WorkflowQueue,
}

impl EnhancementService {
    pub fn new(deps: PipelineDeps, runs: Arc<dyn RunStore>) -> Self {
        Self {
            deps,
            queue: WorkflowQueue::new(runs),
        }
    }

    pub fn photos(&self) -> &Arc<dyn PhotoStore> {
        &self.deps.photos
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.deps.jobs
    }

    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.deps.assets
    }

    pub fn events(&self) -> &Arc<dyn EventPublisher> {
        &self.deps.events
    }

    // -- photos --------------------------------------------------------------

    /// Store an uploaded original under `{userId}/{timestamp}.{ext}` and
    /// create its photo record.
    pub async fn create_photo(&self, user_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<Photo, ServiceError> {
        if bytes.is_empty() {
            return Err(CoreError::Validation("Uploaded file is empty".into()).into());
        }
        let key = original_key(user_id, file_name, Utc::now())?;
        self.deps.assets.put(&key, bytes, content_type_for_key(&key)).await?;
        let photo = self.deps.photos.create(user_id, &key).await?;
        tracing::info!(photo_id = photo.id, user_id, original_path = %key, "Photo uploaded");
        Ok(photo)
    }

    /// Store a cropped rendition and record it on the photo.
    pub async fn save_crop(
        &self,
        user_id: &str,
        photo_id: DbId,
        bytes: Vec<u8>,
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<Photo, ServiceError> {
        self.owned_photo(user_id, photo_id).await?;
        if bytes.is_empty() {
            return Err(CoreError::Validation("Cropped image is empty".into()).into());
        }
        let key = category_key(user_id, AssetCategory::Cropped, Utc::now());
        self.deps.assets.put(&key, bytes, "image/jpeg").await?;
        let photo = self
            .deps
            .photos
            .save_crop(photo_id, &key, aspect_ratio)
            .await?
            .ok_or(CoreError::NotFound { entity: "photo", id: photo_id })?;
        self.deps.events.publish(PlatformEvent::photo_updated(&photo)).await;
        Ok(photo)
    }

    pub async fn get_photo(&self, user_id: &str, photo_id: DbId) -> Result<Photo, ServiceError> {
        self.owned_photo(user_id, photo_id).await
    }

    /// The caller's photos, newest first.
    pub async fn list_photos(&self, user_id: &str) -> Result<Vec<Photo>, ServiceError> {
        Ok(self.deps.photos.list_by_user(user_id).await?)
    }

    // -- upscale -------------------------------------------------------------

    /// Admit an upscale job for the photo, or return the one in flight.
    pub async fn submit_upscale(
        &self,
        user_id: &str,
        photo_id: DbId,
        source_path: &str,
    ) -> Result<JobSubmission, ServiceError> {
        let photo = self.owned_photo(user_id, photo_id).await?;
        resolve_owned_key(source_path, self.deps.assets.bucket(), user_id)?;

        let admission = self.deps.jobs.admit(photo.id, user_id, source_path).await?;
        let job = admission.job;
        if !admission.created {
            tracing::info!(job_id = job.id, photo_id, status = %job.status, "Returning in-flight upscale job");
            return Ok(JobSubmission {
                job_id: job.id,
                status: job.status,
                created: false,
            });
        }

        // Mirrored before queueing so a fast worker cannot be overtaken.
        if let Err(e) = self.deps.mirror_job(&job).await {
            tracing::warn!(job_id = job.id, error = %e, "Failed to mirror pending job onto photo");
        }
        let payload = UpscalePayload {
            job_id: job.id,
            photo_id,
            user_id: user_id.to_string(),
            source_path: source_path.to_string(),
        };
        if let Err(e) = self.queue.submit(EVENT_UPSCALE, &payload).await {
            tracing::error!(job_id = job.id, error = %e, "Failed to queue upscale workflow");
            if let Err(record_err) = self.deps.fail_job(job.id, ENQUEUE_FAILED).await {
                tracing::error!(job_id = job.id, error = %record_err, "Failed to record queueing failure");
            }
            return Err(e.into());
        }

        tracing::info!(job_id = job.id, photo_id, "Upscale job created");
        Ok(JobSubmission {
            job_id: job.id,
            status: job.status,
            created: true,
        })
    }

    /// Status snapshot of a job the caller owns. A completed job always
    /// carries a signed result URL; if one cannot be produced the call
    /// fails instead of reporting completion without it.
    pub async fn job_status(&self, user_id: &str, job_id: DbId) -> Result<JobStatusSnapshot, ServiceError> {
        let job = self
            .deps
            .jobs
            .find(job_id)
            .await?
            .filter(|job| job.user_id == user_id)
            .ok_or(CoreError::NotFound { entity: "upscale_job", id: job_id })?;
        self.snapshot(&job).await
    }

    /// Most recent job for a photo the caller owns.
    pub async fn latest_job(&self, user_id: &str, photo_id: DbId) -> Result<Option<JobStatusSnapshot>, ServiceError> {
        self.owned_photo(user_id, photo_id).await?;
        match self.deps.jobs.latest_for_photo(photo_id).await? {
            Some(job) => Ok(Some(self.snapshot(&job).await?)),
            None => Ok(None),
        }
    }

    async fn snapshot(&self, job: &UpscaleJob) -> Result<JobStatusSnapshot, ServiceError> {
        if job.status != UpscaleStatus::Completed {
            return Ok(JobStatusSnapshot::from_job(job, None));
        }
        let result_path = job
            .result_path
            .as_deref()
            .ok_or_else(|| ServiceError::Unavailable(format!("Job {} completed without a result", job.id)))?;
        let url = self
            .deps
            .assets
            .signed_url(result_path, CLIENT_URL_TTL)
            .await
            .map_err(|e| {
                tracing::error!(job_id = job.id, error = %e, "Could not sign result URL");
                ServiceError::Unavailable(format!("Result URL for job {} is temporarily unavailable", job.id))
            })?;
        Ok(JobStatusSnapshot::from_job(job, Some(url)))
    }

    // -- enhancement ---------------------------------------------------------

    /// Queue the local enhancement. Rejected up front unless the photo's
    /// upscale is completed; nothing is queued in that case.
    pub async fn apply_enhancements(
        &self,
        user_id: &str,
        photo_id: DbId,
        adjustments: AdjustmentParameters,
    ) -> Result<DbId, ServiceError> {
        adjustments.validate()?;
        let photo = self.owned_photo(user_id, photo_id).await?;
        photo.enhancement_source()?;

        let run_id = self
            .queue
            .submit(EVENT_ENHANCE, &EnhancePayload { photo_id, adjustments })
            .await?;
        Ok(run_id)
    }

    /// Queue a vision analysis of an image the caller owns.
    pub async fn analyze_image(&self, user_id: &str, photo_id: DbId, image_url: &str) -> Result<DbId, ServiceError> {
        self.owned_photo(user_id, photo_id).await?;
        resolve_owned_key(image_url, self.deps.assets.bucket(), user_id)?;

        let run_id = self
            .queue
            .submit(
                EVENT_ANALYZE,
                &AnalyzePayload {
                    photo_id,
                    image_url: image_url.to_string(),
                },
            )
            .await?;
        Ok(run_id)
    }

    // -- assets --------------------------------------------------------------

    /// 24 h signed URL for an asset the caller owns.
    pub async fn signed_asset_url(&self, user_id: &str, file_path: &str) -> Result<String, ServiceError> {
        let key = resolve_owned_key(file_path, self.deps.assets.bucket(), user_id)?;
        self.deps
            .assets
            .signed_url(&key, CLIENT_URL_TTL)
            .await
            .map_err(|e| match e {
                StorageError::SigningUnavailable(reason) => ServiceError::Unavailable(reason),
                other => other.into(),
            })
    }

    /// Raw bytes and content type of an asset the caller owns.
    pub async fn proxy_asset(&self, user_id: &str, path: &str) -> Result<(Vec<u8>, &'static str), ServiceError> {
        let key = resolve_owned_key(path, self.deps.assets.bucket(), user_id)?;
        let bytes = self.deps.assets.get(&key).await?;
        Ok((bytes, content_type_for_key(&key)))
    }

    /// Missing and foreign photos are indistinguishable to the caller.
    async fn owned_photo(&self, user_id: &str, photo_id: DbId) -> Result<Photo, ServiceError> {
        self.deps
            .photos
            .find(photo_id)
            .await?
            .filter(|photo| photo.is_owned_by(user_id))
            .ok_or_else(|| CoreError::NotFound { entity: "photo", id: photo_id }.into())
    }
}
