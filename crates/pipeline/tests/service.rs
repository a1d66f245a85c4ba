mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::{fast_config, test_jpeg, Harness, OTHER_USER, USER};
use printframe_core::error::CoreError;
use printframe_core::status::{RunStatus, UpscaleStatus};
use printframe_core::types::DbId;
use printframe_db::memory::MemoryStore;
use printframe_db::{RunStore, Stores};
use printframe_pipeline::queue::EVENT_UPSCALE;
use printframe_pipeline::workflows::{Workflow, WorkflowRegistry};
use printframe_pipeline::{Dispatcher, RunError, ServiceError, StepContext};
use printframe_storage::StorageError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_submissions_share_one_job() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        let cropped = cropped.clone();
        handles.push(tokio::spawn(async move {
            service.submit_upscale(USER, photo.id, &cropped).await.unwrap()
        }));
    }
    let mut submissions = Vec::new();
    for handle in handles {
        submissions.push(handle.await.unwrap());
    }

    assert_eq!(submissions.iter().filter(|s| s.created).count(), 1);
    assert!(submissions.iter().all(|s| s.job_id == submissions[0].job_id));
    assert_eq!(h.store.jobs_for_photo(photo.id).await.len(), 1);
    assert_eq!(h.store.runs_for_event(EVENT_UPSCALE).await.len(), 1);
}

#[tokio::test]
async fn finished_jobs_do_not_block_new_submissions() {
    let h = Harness::new();
    let photo = h.upscaled_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();

    let submission = h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();
    assert!(submission.created);
    assert_eq!(h.store.jobs_for_photo(photo.id).await.len(), 2);

    let latest = h.service.latest_job(USER, photo.id).await.unwrap().unwrap();
    assert_eq!(latest.job_id, submission.job_id);
    assert_eq!(latest.status, UpscaleStatus::Pending);
}

#[tokio::test]
async fn submission_for_a_foreign_source_is_forbidden() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;

    let err = h
        .service
        .submit_upscale(USER, photo.id, &format!("{OTHER_USER}/cropped_1.jpg"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Forbidden(_)));
    assert!(h.store.jobs_for_photo(photo.id).await.is_empty());
}

#[tokio::test]
async fn traversal_in_source_is_rejected() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;

    let err = h
        .service
        .submit_upscale(USER, photo.id, "u1/../u2/cropped_1.jpg")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn other_users_cannot_see_photos_or_jobs() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();
    let submission = h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();

    assert_matches!(
        h.service.get_photo(OTHER_USER, photo.id).await,
        Err(ServiceError::Core(CoreError::NotFound { entity: "photo", .. }))
    );
    assert_matches!(
        h.service.job_status(OTHER_USER, submission.job_id).await,
        Err(ServiceError::Core(CoreError::NotFound { .. }))
    );
    assert_matches!(
        h.service.submit_upscale(OTHER_USER, photo.id, "u2/cropped_1.jpg").await,
        Err(ServiceError::Core(CoreError::NotFound { .. }))
    );
    assert!(h.service.list_photos(OTHER_USER).await.unwrap().is_empty());
    assert_eq!(h.service.list_photos(USER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn asset_access_is_scoped_to_the_owner() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();

    let url = h.service.signed_asset_url(USER, &cropped).await.unwrap();
    assert!(url.starts_with("memory://photos/u1/cropped_"));

    let (bytes, content_type) = h.service.proxy_asset(USER, &cropped).await.unwrap();
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(bytes, test_jpeg(48, 32));

    assert_matches!(
        h.service.signed_asset_url(OTHER_USER, &cropped).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
    assert_matches!(
        h.service.proxy_asset(OTHER_USER, &cropped).await,
        Err(ServiceError::Core(CoreError::Forbidden(_)))
    );
    assert_matches!(
        h.service.proxy_asset(USER, "u1/missing.jpg").await,
        Err(ServiceError::Storage(StorageError::NotFound(_)))
    );
}

// ---------------------------------------------------------------------------
// Signing outages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_job_without_a_signable_result_is_unavailable() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();
    let submission = h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();
    h.dispatcher.run_until_idle().await.unwrap();

    h.assets.set_signing(false);
    assert_matches!(
        h.service.job_status(USER, submission.job_id).await,
        Err(ServiceError::Unavailable(_))
    );
    assert_matches!(
        h.service.signed_asset_url(USER, &cropped).await,
        Err(ServiceError::Unavailable(_))
    );

    h.assets.set_signing(true);
    let snapshot = h.service.job_status(USER, submission.job_id).await.unwrap();
    assert_eq!(snapshot.status, UpscaleStatus::Completed);
    assert!(snapshot.result_url.is_some());
}

#[tokio::test]
async fn workers_fall_back_to_direct_reads_when_signing_is_down() {
    let h = Harness::new();
    h.assets.set_signing(false);
    let photo = h.cropped_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();

    let submission = h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();
    h.dispatcher.run_until_idle().await.unwrap();
    h.assets.set_signing(true);

    let snapshot = h.service.job_status(USER, submission.job_id).await.unwrap();
    assert_eq!(snapshot.status, UpscaleStatus::Completed);
    assert_eq!(h.assets.signed_fetches(), 0);
}

// ---------------------------------------------------------------------------
// Dispatcher loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatcher_loop_drains_the_queue_and_stops_on_cancel() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;
    let cropped = photo.cropped_path.clone().unwrap();
    let submission = h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();

    let cancel = CancellationToken::new();
    let dispatcher = h.dispatcher;
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move { dispatcher.run(loop_cancel).await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let run = &h.store.runs_for_event(EVENT_UPSCALE).await[0];
        if run.status() == Some(RunStatus::Completed) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "run never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    let snapshot = h.service.job_status(USER, submission.job_id).await.unwrap();
    assert_eq!(snapshot.status, UpscaleStatus::Completed);
}

/// Keeps its run executing until released.
struct HeldWorkflow {
    release: Arc<Notify>,
}

#[async_trait]
impl Workflow for HeldWorkflow {
    fn event_name(&self) -> &'static str {
        "test.held"
    }

    async fn run(&self, _ctx: &StepContext, _payload: serde_json::Value) -> Result<serde_json::Value, RunError> {
        self.release.notified().await;
        Ok(serde_json::Value::Null)
    }
}

async fn wait_for_run(store: &MemoryStore, id: DbId, status: RunStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let run = RunStore::find(store, id).await.unwrap().unwrap();
        if run.status() == Some(status) {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "run never reached {status:?}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn long_running_run_is_not_recovered_while_heartbeating() {
    let store = Arc::new(MemoryStore::new());
    let stores = Stores::memory(store.clone());
    let config = fast_config();
    let release = Arc::new(Notify::new());

    let mut registry = WorkflowRegistry::default();
    registry.register(Arc::new(HeldWorkflow { release: release.clone() }));
    let dispatcher = Dispatcher::new(stores.runs.clone(), stores.steps.clone(), registry, &config);
    // Another process sharing the queue, restarted while the run executes.
    let restarted = Dispatcher::new(stores.runs.clone(), stores.steps.clone(), WorkflowRegistry::default(), &config);

    let run = RunStore::enqueue(store.as_ref(), "test.held", &serde_json::json!({})).await.unwrap();
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move { dispatcher.run(loop_cancel).await });

    wait_for_run(&store, run.id, RunStatus::Running).await;
    tokio::time::sleep(config.stale_after * 2).await;
    assert_eq!(restarted.recover_stale().await.unwrap(), 0);
    let in_flight = RunStore::find(store.as_ref(), run.id).await.unwrap().unwrap();
    assert_eq!(in_flight.status(), Some(RunStatus::Running));
    assert_eq!(in_flight.attempts, 1);

    release.notify_one();
    wait_for_run(&store, run.id, RunStatus::Completed).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    let finished = RunStore::find(store.as_ref(), run.id).await.unwrap().unwrap();
    assert_eq!(finished.attempts, 1, "the run was never dispatched twice");
}
