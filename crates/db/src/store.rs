//! Store traits consumed by the pipeline and API, plus the Postgres
//! implementation backed by the repositories.

use std::sync::Arc;

use async_trait::async_trait;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::photo::{AspectRatio, Photo};
use printframe_core::status::UpscaleStatus;
use printframe_core::types::{DbId, Timestamp};
use printframe_core::upscale_job::UpscaleJob;

use crate::error::StoreError;
use crate::memory::MemoryStore;
use crate::models::workflow::{StepOutput, WorkflowRun};
use crate::repositories::{PhotoRepo, UpscaleJobRepo, WorkflowRunRepo, WorkflowStepRepo};
use crate::DbPool;

/// Result of an upscale admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct JobAdmission {
    pub job: UpscaleJob,
    /// False when an in-flight job for the photo was returned instead.
    pub created: bool,
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn create(&self, user_id: &str, original_path: &str) -> Result<Photo, StoreError>;
    async fn find(&self, id: DbId) -> Result<Option<Photo>, StoreError>;
    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Photo>, StoreError>;
    async fn save_crop(
        &self,
        id: DbId,
        cropped_path: &str,
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<Option<Photo>, StoreError>;
    /// Mirror a job status. Clears `enhanced_path` unless completed.
    async fn set_upscale_status(
        &self,
        id: DbId,
        status: UpscaleStatus,
    ) -> Result<Option<Photo>, StoreError>;
    async fn set_upscaled(&self, id: DbId, upscaled_path: &str) -> Result<Option<Photo>, StoreError>;
    async fn set_recommendations(
        &self,
        id: DbId,
        params: &AdjustmentParameters,
    ) -> Result<Option<Photo>, StoreError>;
    /// Returns `None` if the photo is missing or its upscale is not completed.
    async fn set_enhanced(
        &self,
        id: DbId,
        enhanced_path: &str,
        params: &AdjustmentParameters,
    ) -> Result<Option<Photo>, StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomic admission: return the photo's in-flight job or create one.
    async fn admit(
        &self,
        photo_id: DbId,
        user_id: &str,
        source_path: &str,
    ) -> Result<JobAdmission, StoreError>;
    async fn find(&self, id: DbId) -> Result<Option<UpscaleJob>, StoreError>;
    async fn latest_for_photo(&self, photo_id: DbId) -> Result<Option<UpscaleJob>, StoreError>;
    /// Guarded transitions; `None` means the job was not in the source state.
    async fn mark_processing(&self, id: DbId) -> Result<Option<UpscaleJob>, StoreError>;
    async fn complete(&self, id: DbId, result_path: &str) -> Result<Option<UpscaleJob>, StoreError>;
    async fn fail(&self, id: DbId, error_message: &str) -> Result<Option<UpscaleJob>, StoreError>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn enqueue(
        &self,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<WorkflowRun, StoreError>;
    /// Claim the oldest queued run, bumping its attempt counter.
    async fn claim_next(&self) -> Result<Option<WorkflowRun>, StoreError>;
    async fn find(&self, id: DbId) -> Result<Option<WorkflowRun>, StoreError>;
    async fn complete(&self, id: DbId) -> Result<(), StoreError>;
    async fn fail(&self, id: DbId, error: &str) -> Result<(), StoreError>;
    async fn requeue(&self, id: DbId, error: &str) -> Result<(), StoreError>;
    /// Refresh the claim on a run still executing. False once the run is no
    /// longer `running` (finished, or recovered by another dispatcher).
    async fn heartbeat(&self, id: DbId) -> Result<bool, StoreError>;
    /// Requeue `running` runs whose claim is older than `cutoff`.
    async fn requeue_stale(&self, cutoff: Timestamp) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait StepStore: Send + Sync {
    async fn load(&self, run_id: DbId, step_name: &str) -> Result<Option<StepOutput>, StoreError>;
    /// First write wins; saving an already cached step is a no-op.
    async fn save(&self, run_id: DbId, step_name: &str, output: &StepOutput) -> Result<(), StoreError>;
}

/// The four stores bundled for wiring.
#[derive(Clone)]
pub struct Stores {
    pub photos: Arc<dyn PhotoStore>,
    pub jobs: Arc<dyn JobStore>,
    pub runs: Arc<dyn RunStore>,
    pub steps: Arc<dyn StepStore>,
}

impl Stores {
    pub fn postgres(pool: DbPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            photos: store.clone(),
            jobs: store.clone(),
            runs: store.clone(),
            steps: store,
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            photos: store.clone(),
            jobs: store.clone(),
            runs: store.clone(),
            steps: store,
        }
    }
}

/// Postgres-backed store delegating to the repositories.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn photo(row: Option<crate::models::photo::PhotoRow>) -> Result<Option<Photo>, StoreError> {
    row.map(Photo::try_from).transpose()
}

fn job(
    row: Option<crate::models::upscale_job::UpscaleJobRow>,
) -> Result<Option<UpscaleJob>, StoreError> {
    row.map(UpscaleJob::try_from).transpose()
}

#[async_trait]
impl PhotoStore for PgStore {
    async fn create(&self, user_id: &str, original_path: &str) -> Result<Photo, StoreError> {
        Photo::try_from(PhotoRepo::create(&self.pool, user_id, original_path).await?)
    }

    async fn find(&self, id: DbId) -> Result<Option<Photo>, StoreError> {
        photo(PhotoRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Photo>, StoreError> {
        PhotoRepo::list_by_user(&self.pool, user_id)
            .await?
            .into_iter()
            .map(Photo::try_from)
            .collect()
    }

    async fn save_crop(
        &self,
        id: DbId,
        cropped_path: &str,
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<Option<Photo>, StoreError> {
        photo(
            PhotoRepo::save_crop(&self.pool, id, cropped_path, aspect_ratio.map(AspectRatio::as_str))
                .await?,
        )
    }

    async fn set_upscale_status(
        &self,
        id: DbId,
        status: UpscaleStatus,
    ) -> Result<Option<Photo>, StoreError> {
        photo(PhotoRepo::set_upscale_status(&self.pool, id, status).await?)
    }

    async fn set_upscaled(&self, id: DbId, upscaled_path: &str) -> Result<Option<Photo>, StoreError> {
        photo(PhotoRepo::set_upscaled(&self.pool, id, upscaled_path).await?)
    }

    async fn set_recommendations(
        &self,
        id: DbId,
        params: &AdjustmentParameters,
    ) -> Result<Option<Photo>, StoreError> {
        photo(PhotoRepo::set_recommendations(&self.pool, id, params).await?)
    }

    async fn set_enhanced(
        &self,
        id: DbId,
        enhanced_path: &str,
        params: &AdjustmentParameters,
    ) -> Result<Option<Photo>, StoreError> {
        photo(PhotoRepo::set_enhanced(&self.pool, id, enhanced_path, params).await?)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn admit(
        &self,
        photo_id: DbId,
        user_id: &str,
        source_path: &str,
    ) -> Result<JobAdmission, StoreError> {
        let (row, created) =
            UpscaleJobRepo::insert_if_no_active(&self.pool, photo_id, user_id, source_path).await?;
        if !created {
            tracing::debug!(photo_id, job_id = row.id, "Reusing in-flight upscale job");
        }
        Ok(JobAdmission {
            job: UpscaleJob::try_from(row)?,
            created,
        })
    }

    async fn find(&self, id: DbId) -> Result<Option<UpscaleJob>, StoreError> {
        job(UpscaleJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn latest_for_photo(&self, photo_id: DbId) -> Result<Option<UpscaleJob>, StoreError> {
        job(UpscaleJobRepo::latest_for_photo(&self.pool, photo_id).await?)
    }

    async fn mark_processing(&self, id: DbId) -> Result<Option<UpscaleJob>, StoreError> {
        job(UpscaleJobRepo::mark_processing(&self.pool, id).await?)
    }

    async fn complete(&self, id: DbId, result_path: &str) -> Result<Option<UpscaleJob>, StoreError> {
        job(UpscaleJobRepo::complete(&self.pool, id, result_path).await?)
    }

    async fn fail(&self, id: DbId, error_message: &str) -> Result<Option<UpscaleJob>, StoreError> {
        job(UpscaleJobRepo::fail(&self.pool, id, error_message).await?)
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn enqueue(
        &self,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<WorkflowRun, StoreError> {
        Ok(WorkflowRunRepo::enqueue(&self.pool, event_name, payload).await?)
    }

    async fn claim_next(&self) -> Result<Option<WorkflowRun>, StoreError> {
        Ok(WorkflowRunRepo::claim_next(&self.pool).await?)
    }

    async fn find(&self, id: DbId) -> Result<Option<WorkflowRun>, StoreError> {
        Ok(WorkflowRunRepo::find_by_id(&self.pool, id).await?)
    }

    async fn complete(&self, id: DbId) -> Result<(), StoreError> {
        Ok(WorkflowRunRepo::complete(&self.pool, id).await?)
    }

    async fn fail(&self, id: DbId, error: &str) -> Result<(), StoreError> {
        Ok(WorkflowRunRepo::fail(&self.pool, id, error).await?)
    }

    async fn requeue(&self, id: DbId, error: &str) -> Result<(), StoreError> {
        Ok(WorkflowRunRepo::requeue(&self.pool, id, error).await?)
    }

    async fn heartbeat(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(WorkflowRunRepo::heartbeat(&self.pool, id).await?)
    }

    async fn requeue_stale(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let recovered = WorkflowRunRepo::requeue_stale(&self.pool, cutoff).await?;
        if recovered > 0 {
            tracing::debug!(recovered, %cutoff, "Stale workflow runs requeued");
        }
        Ok(recovered)
    }
}

#[async_trait]
impl StepStore for PgStore {
    async fn load(&self, run_id: DbId, step_name: &str) -> Result<Option<StepOutput>, StoreError> {
        Ok(WorkflowStepRepo::find(&self.pool, run_id, step_name)
            .await?
            .and_then(|row| row.into_output()))
    }

    async fn save(&self, run_id: DbId, step_name: &str, output: &StepOutput) -> Result<(), StoreError> {
        let (json, blob) = match output {
            StepOutput::Json(value) => (Some(value), None),
            StepOutput::Blob(bytes) => (None, Some(bytes.as_slice())),
        };
        Ok(WorkflowStepRepo::save(&self.pool, run_id, step_name, json, blob).await?)
    }
}
