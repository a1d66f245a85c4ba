//! In-memory store used for local development without Postgres and by the
//! test suites of the crates above.
//!
//! All state sits behind one `RwLock`, so every operation (admission in
//! particular) is atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::photo::{AspectRatio, Photo};
use printframe_core::status::{RunStatus, UpscaleStatus};
use printframe_core::types::{DbId, Timestamp};
use printframe_core::upscale_job::UpscaleJob;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::workflow::{StepOutput, WorkflowRun};
use crate::store::{JobAdmission, JobStore, PhotoStore, RunStore, StepStore};

#[derive(Default)]
struct State {
    next_id: DbId,
    photos: BTreeMap<DbId, Photo>,
    jobs: BTreeMap<DbId, UpscaleJob>,
    runs: BTreeMap<DbId, WorkflowRun>,
    steps: HashMap<(DbId, String), StepOutput>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn update_photo(&mut self, id: DbId, f: impl FnOnce(&mut Photo)) -> Option<Photo> {
        let photo = self.photos.get_mut(&id)?;
        f(photo);
        photo.updated_at = Utc::now();
        Some(photo.clone())
    }

    fn transition_job(
        &mut self,
        id: DbId,
        to: UpscaleStatus,
        f: impl FnOnce(&mut UpscaleJob),
    ) -> Option<UpscaleJob> {
        let job = self.jobs.get_mut(&id)?;
        if !job.status.can_transition_to(to) {
            return None;
        }
        job.status = to;
        f(job);
        Some(job.clone())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs recorded for an event name, oldest first.
    pub async fn runs_for_event(&self, event_name: &str) -> Vec<WorkflowRun> {
        let state = self.state.read().await;
        state
            .runs
            .values()
            .filter(|run| run.event_name == event_name)
            .cloned()
            .collect()
    }

    /// Names of the cached steps of a run.
    pub async fn cached_steps(&self, run_id: DbId) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .steps
            .keys()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Every upscale job created for a photo, oldest first.
    pub async fn jobs_for_photo(&self, photo_id: DbId) -> Vec<UpscaleJob> {
        let state = self.state.read().await;
        state
            .jobs
            .values()
            .filter(|job| job.photo_id == photo_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PhotoStore for MemoryStore {
    async fn create(&self, user_id: &str, original_path: &str) -> Result<Photo, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let now = Utc::now();
        let photo = Photo {
            id,
            user_id: user_id.to_string(),
            original_path: original_path.to_string(),
            cropped_path: None,
            enhanced_path: None,
            upscaled_path: None,
            upscale_status: None,
            ai_recommendations: None,
            aspect_ratio: None,
            created_at: now,
            updated_at: now,
        };
        state.photos.insert(id, photo.clone());
        Ok(photo)
    }

    async fn find(&self, id: DbId) -> Result<Option<Photo>, StoreError> {
        Ok(self.state.read().await.photos.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Photo>, StoreError> {
        let state = self.state.read().await;
        let mut photos: Vec<Photo> = state
            .photos
            .values()
            .filter(|photo| photo.user_id == user_id)
            .cloned()
            .collect();
        photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(photos)
    }

    async fn save_crop(
        &self,
        id: DbId,
        cropped_path: &str,
        aspect_ratio: Option<AspectRatio>,
    ) -> Result<Option<Photo>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.update_photo(id, |photo| {
            photo.cropped_path = Some(cropped_path.to_string());
            photo.aspect_ratio = aspect_ratio;
        }))
    }

    async fn set_upscale_status(
        &self,
        id: DbId,
        status: UpscaleStatus,
    ) -> Result<Option<Photo>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.update_photo(id, |photo| {
            photo.upscale_status = Some(status);
            if status != UpscaleStatus::Completed {
                photo.enhanced_path = None;
            }
        }))
    }

    async fn set_upscaled(&self, id: DbId, upscaled_path: &str) -> Result<Option<Photo>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.update_photo(id, |photo| {
            photo.upscale_status = Some(UpscaleStatus::Completed);
            photo.upscaled_path = Some(upscaled_path.to_string());
        }))
    }

    async fn set_recommendations(
        &self,
        id: DbId,
        params: &AdjustmentParameters,
    ) -> Result<Option<Photo>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.update_photo(id, |photo| {
            photo.ai_recommendations = Some(params.clone());
        }))
    }

    async fn set_enhanced(
        &self,
        id: DbId,
        enhanced_path: &str,
        params: &AdjustmentParameters,
    ) -> Result<Option<Photo>, StoreError> {
        let mut state = self.state.write().await;
        let upscaled = state
            .photos
            .get(&id)
            .is_some_and(|photo| photo.upscale_status == Some(UpscaleStatus::Completed));
        if !upscaled {
            return Ok(None);
        }
        Ok(state.update_photo(id, |photo| {
            photo.enhanced_path = Some(enhanced_path.to_string());
            photo.ai_recommendations = Some(params.clone());
        }))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn admit(
        &self,
        photo_id: DbId,
        user_id: &str,
        source_path: &str,
    ) -> Result<JobAdmission, StoreError> {
        let mut state = self.state.write().await;
        if let Some(active) = state
            .jobs
            .values()
            .find(|job| job.photo_id == photo_id && job.status.is_active())
        {
            return Ok(JobAdmission {
                job: active.clone(),
                created: false,
            });
        }

        let id = state.next_id();
        let job = UpscaleJob {
            id,
            photo_id,
            user_id: user_id.to_string(),
            status: UpscaleStatus::Pending,
            source_path: source_path.to_string(),
            result_path: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        state.jobs.insert(id, job.clone());
        Ok(JobAdmission { job, created: true })
    }

    async fn find(&self, id: DbId) -> Result<Option<UpscaleJob>, StoreError> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn latest_for_photo(&self, photo_id: DbId) -> Result<Option<UpscaleJob>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.photo_id == photo_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn mark_processing(&self, id: DbId) -> Result<Option<UpscaleJob>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.transition_job(id, UpscaleStatus::Processing, |job| {
            job.started_at.get_or_insert_with(Utc::now);
        }))
    }

    async fn complete(&self, id: DbId, result_path: &str) -> Result<Option<UpscaleJob>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.transition_job(id, UpscaleStatus::Completed, |job| {
            job.result_path = Some(result_path.to_string());
            job.completed_at.get_or_insert_with(Utc::now);
        }))
    }

    async fn fail(&self, id: DbId, error_message: &str) -> Result<Option<UpscaleJob>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.transition_job(id, UpscaleStatus::Failed, |job| {
            job.error_message = Some(error_message.to_string());
            job.completed_at.get_or_insert_with(Utc::now);
        }))
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn enqueue(
        &self,
        event_name: &str,
        payload: &serde_json::Value,
    ) -> Result<WorkflowRun, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let now = Utc::now();
        let run = WorkflowRun {
            id,
            event_name: event_name.to_string(),
            payload: payload.clone(),
            status_id: RunStatus::Queued.id(),
            attempts: 0,
            error: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.runs.insert(id, run.clone());
        Ok(run)
    }

    async fn claim_next(&self) -> Result<Option<WorkflowRun>, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let Some(run) = state
            .runs
            .values_mut()
            .find(|run| run.status() == Some(RunStatus::Queued))
        else {
            return Ok(None);
        };
        run.status_id = RunStatus::Running.id();
        run.attempts += 1;
        run.claimed_at = Some(now);
        run.updated_at = now;
        Ok(Some(run.clone()))
    }

    async fn find(&self, id: DbId) -> Result<Option<WorkflowRun>, StoreError> {
        Ok(self.state.read().await.runs.get(&id).cloned())
    }

    async fn complete(&self, id: DbId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(run) = state.runs.get_mut(&id) {
            let now = Utc::now();
            run.status_id = RunStatus::Completed.id();
            run.error = None;
            run.completed_at = Some(now);
            run.updated_at = now;
        }
        Ok(())
    }

    async fn fail(&self, id: DbId, error: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(run) = state.runs.get_mut(&id) {
            let now = Utc::now();
            run.status_id = RunStatus::Failed.id();
            run.error = Some(error.to_string());
            run.completed_at = Some(now);
            run.updated_at = now;
        }
        Ok(())
    }

    async fn requeue(&self, id: DbId, error: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(run) = state.runs.get_mut(&id) {
            if run.status() == Some(RunStatus::Running) {
                run.status_id = RunStatus::Queued.id();
                run.error = Some(error.to_string());
                run.claimed_at = None;
                run.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn heartbeat(&self, id: DbId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.runs.get_mut(&id) {
            Some(run) if run.status() == Some(RunStatus::Running) => {
                let now = Utc::now();
                run.claimed_at = Some(now);
                run.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn requeue_stale(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut recovered = 0;
        for run in state.runs.values_mut() {
            let stale = run.status() == Some(RunStatus::Running)
                && run.claimed_at.is_some_and(|claimed| claimed < cutoff);
            if stale {
                run.status_id = RunStatus::Queued.id();
                run.claimed_at = None;
                run.updated_at = Utc::now();
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

#[async_trait]
impl StepStore for MemoryStore {
    async fn load(&self, run_id: DbId, step_name: &str) -> Result<Option<StepOutput>, StoreError> {
        let state = self.state.read().await;
        Ok(state.steps.get(&(run_id, step_name.to_string())).cloned())
    }

    async fn save(&self, run_id: DbId, step_name: &str, output: &StepOutput) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .steps
            .entry((run_id, step_name.to_string()))
            .or_insert_with(|| output.clone());
        Ok(())
    }
}
