//! Queue the local adjustment and vision analysis workflows. Both return
//! 202 with the queued run id; results arrive on the photo.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEnhancements {
    pub photo_id: DbId,
    pub adjustments: AdjustmentParameters,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImage {
    pub photo_id: DbId,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Queued {
    pub run_id: DbId,
    pub status: &'static str,
}

impl Queued {
    fn new(run_id: DbId) -> Self {
        Self {
            run_id,
            status: "queued",
        }
    }
}

/// POST /api/v1/apply-enhancements
///
/// 412 when the photo's upscale has not completed; nothing is queued.
pub async fn apply_enhancements(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ApplyEnhancements>,
) -> AppResult<impl IntoResponse> {
    let run_id = state
        .service
        .apply_enhancements(&auth.user_id, input.photo_id, input.adjustments)
        .await?;
    tracing::info!(run_id, photo_id = input.photo_id, "Enhancement queued");
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: Queued::new(run_id) })))
}

/// POST /api/v1/analyze-image
pub async fn analyze_image(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AnalyzeImage>,
) -> AppResult<impl IntoResponse> {
    let run_id = state
        .service
        .analyze_image(&auth.user_id, input.photo_id, &input.image_url)
        .await?;
    tracing::info!(run_id, photo_id = input.photo_id, "Analysis queued");
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: Queued::new(run_id) })))
}
