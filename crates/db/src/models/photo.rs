//! Row mapping for the `photos` table.

use printframe_core::adjustments::AdjustmentParameters;
use printframe_core::photo::{AspectRatio, Photo};
use printframe_core::status::{StatusId, UpscaleStatus};
use printframe_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::error::StoreError;

/// A row from the `photos` table.
#[derive(Debug, Clone, FromRow)]
pub struct PhotoRow {
    pub id: DbId,
    pub user_id: String,
    pub original_path: String,
    pub cropped_path: Option<String>,
    pub enhanced_path: Option<String>,
    pub upscaled_path: Option<String>,
    pub upscale_status_id: Option<StatusId>,
    pub ai_recommendations: Option<Json<AdjustmentParameters>>,
    pub aspect_ratio: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<PhotoRow> for Photo {
    type Error = StoreError;

    fn try_from(row: PhotoRow) -> Result<Self, Self::Error> {
        let upscale_status = row
            .upscale_status_id
            .map(|id| {
                UpscaleStatus::from_id(id).ok_or_else(|| {
                    StoreError::Corrupt(format!("photo {} has unknown upscale status {id}", row.id))
                })
            })
            .transpose()?;
        let aspect_ratio = row
            .aspect_ratio
            .as_deref()
            .map(str::parse::<AspectRatio>)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("photo {}: {e}", row.id)))?;

        Ok(Photo {
            id: row.id,
            user_id: row.user_id,
            original_path: row.original_path,
            cropped_path: row.cropped_path,
            enhanced_path: row.enhanced_path,
            upscaled_path: row.upscaled_path,
            upscale_status,
            ai_recommendations: row.ai_recommendations.map(|Json(params)| params),
            aspect_ratio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
