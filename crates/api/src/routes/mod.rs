pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{assets, enhancements, jobs, photos};
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree. Everything except `/ws` requires a
/// bearer token; the push channel authenticates per subscription.
///
/// ```text
/// /ws                                  push channel
///
/// /photos                              list, upload
/// /photos/{id}                         get
/// /photos/{id}/crop                    save crop
/// /photos/{id}/latest-job              latest upscale job snapshot
///
/// /enhancement-jobs                    submit upscale
/// /job-status/{job_id}                 status snapshot
/// /apply-enhancements                  queue local adjustments
/// /analyze-image                       queue vision analysis
///
/// /assets/signed-url                   24 h signed URL
/// /assets/proxy?path=                  raw bytes
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/photos", get(photos::list_photos).post(photos::upload_photo))
        .route("/photos/{id}", get(photos::get_photo))
        .route("/photos/{id}/crop", post(photos::save_crop))
        .route("/photos/{id}/latest-job", get(jobs::latest_job))
        .route("/enhancement-jobs", post(jobs::submit_upscale))
        .route("/job-status/{job_id}", get(jobs::job_status))
        .route("/apply-enhancements", post(enhancements::apply_enhancements))
        .route("/analyze-image", post(enhancements::analyze_image))
        .route("/assets/signed-url", post(assets::signed_url))
        .route("/assets/proxy", get(assets::proxy))
}
