//! Handlers for the `/photos` resource.
//!
//! Uploads and crops arrive as multipart forms; the file part is named
//! `file`.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use printframe_core::photo::AspectRatio;
use printframe_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Parts read from an upload form.
#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    aspect_ratio: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                form.file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                form.bytes = Some(bytes.to_vec());
            }
            Some("aspectRatio") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read aspectRatio: {e}")))?;
                form.aspect_ratio = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /api/v1/photos
///
/// Store the original and create the photo record. Returns 201.
pub async fn upload_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = read_form(multipart).await?;
    let bytes = form
        .bytes
        .ok_or_else(|| AppError::BadRequest("Missing 'file' part".into()))?;
    let file_name = form.file_name.unwrap_or_else(|| "upload.jpg".into());

    let photo = state.service.create_photo(&auth.user_id, &file_name, bytes).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: photo })))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/photos
pub async fn list_photos(auth: AuthUser, State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let photos = state.service.list_photos(&auth.user_id).await?;
    Ok(Json(DataResponse { data: photos }))
}

/// GET /api/v1/photos/{id}
pub async fn get_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let photo = state.service.get_photo(&auth.user_id, photo_id).await?;
    Ok(Json(DataResponse { data: photo }))
}

// ---------------------------------------------------------------------------
// Crop
// ---------------------------------------------------------------------------

/// POST /api/v1/photos/{id}/crop
///
/// The crop itself is rendered client-side; this stores the result.
pub async fn save_crop(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = read_form(multipart).await?;
    let bytes = form
        .bytes
        .ok_or_else(|| AppError::BadRequest("Missing 'file' part".into()))?;
    let aspect_ratio = form
        .aspect_ratio
        .as_deref()
        .map(str::parse::<AspectRatio>)
        .transpose()?;

    let photo = state
        .service
        .save_crop(&auth.user_id, photo_id, bytes, aspect_ratio)
        .await?;
    Ok(Json(DataResponse { data: photo }))
}
