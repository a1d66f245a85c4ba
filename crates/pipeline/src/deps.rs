use std::sync::Arc;

use printframe_adapters::{UpscaleService, VisionService};
use printframe_core::status::UpscaleStatus;
use printframe_core::types::DbId;
use printframe_core::upscale_job::UpscaleJob;
use printframe_db::{JobStore, PhotoStore, StoreError, Stores};
use printframe_events::bus::PlatformEvent;
use printframe_events::publisher::EventPublisher;
use printframe_storage::AssetStore;

/// Collaborators shared by the workflows and the service layer.
#[derive(Clone)]
pub struct PipelineDeps {
    pub photos: Arc<dyn PhotoStore>,
    pub jobs: Arc<dyn JobStore>,
    pub assets: Arc<dyn AssetStore>,
    /// `None` when no upscale credential is configured.
    pub upscaler: Option<Arc<dyn UpscaleService>>,
    pub vision: Option<Arc<dyn VisionService>>,
    pub events: Arc<dyn EventPublisher>,
}

impl PipelineDeps {
    pub fn new(stores: &Stores, assets: Arc<dyn AssetStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            photos: stores.photos.clone(),
            jobs: stores.jobs.clone(),
            assets,
            upscaler: None,
            vision: None,
            events,
        }
    }

    pub fn with_upscaler(mut self, upscaler: Option<Arc<dyn UpscaleService>>) -> Self {
        self.upscaler = upscaler;
        self
    }

    pub fn with_vision(mut self, vision: Option<Arc<dyn VisionService>>) -> Self {
        self.vision = vision;
        self
    }

    /// Publish a job change and mirror its status onto the photo, unless a
    /// newer job for the photo has since been admitted.
    pub async fn mirror_job(&self, job: &UpscaleJob) -> Result<(), StoreError> {
        self.events.publish(PlatformEvent::job_updated(job)).await;

        let latest = self.jobs.latest_for_photo(job.photo_id).await?;
        if latest.as_ref().map(|j| j.id) != Some(job.id) {
            tracing::debug!(job_id = job.id, photo_id = job.photo_id, "Job superseded, photo not mirrored");
            return Ok(());
        }

        let photo = match (job.status, job.result_path.as_deref()) {
            (UpscaleStatus::Completed, Some(path)) => self.photos.set_upscaled(job.photo_id, path).await?,
            (status, _) => self.photos.set_upscale_status(job.photo_id, status).await?,
        };
        if let Some(photo) = photo {
            self.events.publish(PlatformEvent::photo_updated(&photo)).await;
        }
        Ok(())
    }

    /// Fail a job and mirror the failure. Idempotent: a job already failed
    /// is mirrored again, a job in another terminal state is left alone.
    pub async fn fail_job(&self, job_id: DbId, message: &str) -> Result<Option<UpscaleJob>, StoreError> {
        let job = match self.jobs.fail(job_id, message).await? {
            Some(job) => job,
            None => match self.jobs.find(job_id).await? {
                Some(job) if job.status == UpscaleStatus::Failed => job,
                _ => return Ok(None),
            },
        };
        self.mirror_job(&job).await?;
        Ok(Some(job))
    }
}
