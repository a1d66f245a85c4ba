mod common;

use assert_matches::assert_matches;
use common::{Harness, OTHER_USER, USER};
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::error::CoreError;
use printframe_core::status::{RunStatus, UpscaleStatus};
use printframe_db::RunStore;
use printframe_imaging::render;
use printframe_pipeline::queue::{EVENT_ANALYZE, EVENT_ENHANCE};
use printframe_pipeline::ServiceError;
use printframe_storage::AssetStore;

// ---------------------------------------------------------------------------
// Enhance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enhance_is_rejected_until_upscale_completes() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;

    let err = h
        .service
        .apply_enhancements(USER, photo.id, AdjustmentParameters::new(20.0, -10.0, 0.0, 0.0, 30.0, 0.0))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::Core(CoreError::Precondition(_)));
    assert!(h.store.runs_for_event(EVENT_ENHANCE).await.is_empty());
    assert_eq!(h.photo(photo.id).await, photo);
}

#[tokio::test]
async fn enhance_raises_mean_red_and_records_applied_values() {
    let h = Harness::new();
    let photo = h.upscaled_photo().await;
    let upscaled = photo.upscaled_path.clone().unwrap();
    let params = AdjustmentParameters::new(20.0, -10.0, 0.0, 0.0, 30.0, 0.0);

    h.service
        .apply_enhancements(USER, photo.id, params.clone())
        .await
        .unwrap();
    assert_eq!(h.dispatcher.run_until_idle().await.unwrap(), 1);

    let photo = h.photo(photo.id).await;
    let enhanced = photo.enhanced_path.clone().unwrap();
    assert!(enhanced.starts_with("u1/enhanced_") && enhanced.ends_with(".jpg"));
    assert_eq!(photo.ai_recommendations, Some(params));

    let before = render::decode(&h.assets.get(&upscaled).await.unwrap()).unwrap().to_rgb8();
    let after = render::decode(&h.assets.get(&enhanced).await.unwrap()).unwrap().to_rgb8();
    assert_eq!(before.dimensions(), after.dimensions());
    assert!(render::channel_means(&after)[0] > render::channel_means(&before)[0] + 5.0);

    // Warmth lifts red on top of the tone change and leaves blue alone.
    let tone_only = render::adjust_rgb(&before, &AdjustmentParameters::new(20.0, -10.0, 0.0, 0.0, 0.0, 0.0));
    let [tone_red, _, tone_blue] = render::channel_means(&tone_only);
    let [red, _, blue] = render::channel_means(&after);
    assert!(red > tone_red + 2.0, "red {tone_red} -> {red}");
    assert!((blue - tone_blue).abs() < 1.5, "blue {tone_blue} -> {blue}");
}

#[tokio::test]
async fn out_of_range_adjustments_are_rejected() {
    let h = Harness::new();
    let photo = h.upscaled_photo().await;

    let err = h
        .service
        .apply_enhancements(USER, photo.id, AdjustmentParameters::new(150.0, 0.0, 0.0, 0.0, 0.0, 0.0))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Validation(_)));
    assert!(h.store.runs_for_event(EVENT_ENHANCE).await.is_empty());
}

#[tokio::test]
async fn re_upscaling_clears_the_stale_enhancement() {
    let h = Harness::new();
    let photo = h.upscaled_photo().await;
    h.service
        .apply_enhancements(USER, photo.id, AdjustmentParameters::new(10.0, 0.0, 0.0, 0.0, 0.0, 0.0))
        .await
        .unwrap();
    h.dispatcher.run_until_idle().await.unwrap();
    assert!(h.photo(photo.id).await.enhanced_path.is_some());

    let cropped = photo.cropped_path.clone().unwrap();
    h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();

    let photo = h.photo(photo.id).await;
    assert_eq!(photo.upscale_status, Some(UpscaleStatus::Pending));
    assert_eq!(photo.enhanced_path, None);
}

#[tokio::test]
async fn enhance_run_fails_when_upscale_regressed_after_queueing() {
    let h = Harness::new();
    let photo = h.upscaled_photo().await;
    h.service
        .apply_enhancements(USER, photo.id, AdjustmentParameters::new(10.0, 0.0, 0.0, 0.0, 0.0, 0.0))
        .await
        .unwrap();

    // A new upscale is admitted before the enhance run is picked up.
    let cropped = photo.cropped_path.clone().unwrap();
    h.service.submit_upscale(USER, photo.id, &cropped).await.unwrap();
    let enhance_run = h.store.runs_for_event(EVENT_ENHANCE).await[0].id;

    h.dispatcher.run_until_idle().await.unwrap();

    let run = RunStore::find(h.store.as_ref(), enhance_run).await.unwrap().unwrap();
    assert_eq!(run.status(), Some(RunStatus::Failed));
    assert!(run.error.unwrap().contains("must finish upscaling"));
}

// ---------------------------------------------------------------------------
// Analyze
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analysis_saves_recommendations() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;
    assert_eq!(photo.ai_recommendations, None);

    let cropped = photo.cropped_path.clone().unwrap();
    let signed = format!("https://project.example.co/storage/v1/object/sign/photos/{cropped}?token=t");

    h.service.analyze_image(USER, photo.id, &signed).await.unwrap();
    h.dispatcher.run_until_idle().await.unwrap();

    let photo = h.photo(photo.id).await;
    assert_eq!(photo.ai_recommendations, Some(h.vision.recommendation.clone()));
    let run = &h.store.runs_for_event(EVENT_ANALYZE).await[0];
    assert_eq!(run.status(), Some(RunStatus::Completed));
    assert_eq!(h.vision.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn analysis_of_a_foreign_image_is_forbidden() {
    let h = Harness::new();
    let photo = h.cropped_photo().await;

    let err = h
        .service
        .analyze_image(USER, photo.id, &format!("{OTHER_USER}/cropped_1.jpg"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Forbidden(_)));
    assert!(h.store.runs_for_event(EVENT_ANALYZE).await.is_empty());
}
