//! Upscale job submission and status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use printframe_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitUpscale {
    pub photo_id: DbId,
    /// Bare key or storage URL of the image to upscale.
    pub source_path: String,
}

/// POST /api/v1/enhancement-jobs
///
/// 201 when a job was created, 200 when the photo's in-flight job is
/// returned instead.
pub async fn submit_upscale(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SubmitUpscale>,
) -> AppResult<impl IntoResponse> {
    let submission = state
        .service
        .submit_upscale(&auth.user_id, input.photo_id, &input.source_path)
        .await?;

    let status = if submission.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse { data: submission })))
}

/// GET /api/v1/job-status/{job_id}
pub async fn job_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.service.job_status(&auth.user_id, job_id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/photos/{id}/latest-job
///
/// `data` is null when the photo was never upscaled.
pub async fn latest_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.service.latest_job(&auth.user_id, photo_id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}
