//! Row mapping for the `upscale_jobs` table.

use printframe_core::status::{StatusId, UpscaleStatus};
use printframe_core::types::{DbId, Timestamp};
use printframe_core::upscale_job::UpscaleJob;
use sqlx::FromRow;

use crate::error::StoreError;

/// A row from the `upscale_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct UpscaleJobRow {
    pub id: DbId,
    pub photo_id: DbId,
    pub user_id: String,
    pub status_id: StatusId,
    pub source_path: String,
    pub result_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<UpscaleJobRow> for UpscaleJob {
    type Error = StoreError;

    fn try_from(row: UpscaleJobRow) -> Result<Self, Self::Error> {
        let status = UpscaleStatus::from_id(row.status_id).ok_or_else(|| {
            StoreError::Corrupt(format!("upscale job {} has unknown status {}", row.id, row.status_id))
        })?;
        Ok(UpscaleJob {
            id: row.id,
            photo_id: row.photo_id,
            user_id: row.user_id,
            status,
            source_path: row.source_path,
            result_path: row.result_path,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
