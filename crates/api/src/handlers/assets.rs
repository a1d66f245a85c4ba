//! Signed URLs and proxied reads for assets the caller owns.

use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::Json;
use printframe_storage::UPLOAD_CACHE_CONTROL;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlRequest {
    pub file_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub signed_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub path: String,
}

/// POST /api/v1/assets/signed-url
///
/// 403 when the path belongs to another user.
pub async fn signed_url(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SignedUrlRequest>,
) -> AppResult<impl IntoResponse> {
    let signed_url = state
        .service
        .signed_asset_url(&auth.user_id, &input.file_path)
        .await?;
    Ok(Json(DataResponse {
        data: SignedUrlResponse { signed_url },
    }))
}

/// GET /api/v1/assets/proxy?path=
///
/// Same-origin bytes for canvas rendering.
pub async fn proxy(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> AppResult<impl IntoResponse> {
    let (bytes, content_type) = state.service.proxy_asset(&auth.user_id, &query.path).await?;
    Ok((
        [(CONTENT_TYPE, content_type), (CACHE_CONTROL, UPLOAD_CACHE_CONTROL)],
        bytes,
    ))
}
