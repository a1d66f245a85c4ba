//! Repository for the `photos` table.

use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::status::UpscaleStatus;
use printframe_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::photo::PhotoRow;

/// Column list for `photos` queries.
const COLUMNS: &str = "\
    id, user_id, original_path, cropped_path, enhanced_path, upscaled_path, \
    upscale_status_id, ai_recommendations, aspect_ratio, created_at, updated_at";

pub struct PhotoRepo;

impl PhotoRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        original_path: &str,
    ) -> Result<PhotoRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO photos (user_id, original_path) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(user_id)
            .bind(original_path)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PhotoRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photos WHERE id = $1");
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All photos of one user, newest first.
    pub async fn list_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<PhotoRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photos WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn save_crop(
        pool: &PgPool,
        id: DbId,
        cropped_path: &str,
        aspect_ratio: Option<&str>,
    ) -> Result<Option<PhotoRow>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET cropped_path = $2, aspect_ratio = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .bind(cropped_path)
            .bind(aspect_ratio)
            .fetch_optional(pool)
            .await
    }

    /// Mirror an upscale job status onto the photo.
    ///
    /// Any status other than completed clears `enhanced_path`, since an
    /// enhanced asset is derived from the previous upscale.
    pub async fn set_upscale_status(
        pool: &PgPool,
        id: DbId,
        status: UpscaleStatus,
    ) -> Result<Option<PhotoRow>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET upscale_status_id = $2, \
                 enhanced_path = CASE WHEN $2 = $3 THEN enhanced_path ELSE NULL END, \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .bind(status.id())
            .bind(UpscaleStatus::Completed.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a finished upscale: status completed plus the result key.
    pub async fn set_upscaled(
        pool: &PgPool,
        id: DbId,
        upscaled_path: &str,
    ) -> Result<Option<PhotoRow>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET upscale_status_id = $2, upscaled_path = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .bind(UpscaleStatus::Completed.id())
            .bind(upscaled_path)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_recommendations(
        pool: &PgPool,
        id: DbId,
        params: &AdjustmentParameters,
    ) -> Result<Option<PhotoRow>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET ai_recommendations = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .bind(Json(params))
            .fetch_optional(pool)
            .await
    }

    /// Store the enhanced asset and the applied parameters.
    ///
    /// Only updates photos whose upscale is completed; returns `None`
    /// otherwise.
    pub async fn set_enhanced(
        pool: &PgPool,
        id: DbId,
        enhanced_path: &str,
        params: &AdjustmentParameters,
    ) -> Result<Option<PhotoRow>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET enhanced_path = $2, ai_recommendations = $3, updated_at = NOW() \
             WHERE id = $1 AND upscale_status_id = $4 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoRow>(&query)
            .bind(id)
            .bind(enhanced_path)
            .bind(Json(params))
            .bind(UpscaleStatus::Completed.id())
            .fetch_optional(pool)
            .await
    }
}
