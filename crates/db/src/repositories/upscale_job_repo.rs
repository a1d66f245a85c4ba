//! Repository for the `upscale_jobs` table.
//!
//! Every transition is guarded by the expected source status so terminal
//! rows are never revised, and timestamps are stamped with `COALESCE` so
//! they are set at most once.

use printframe_core::status::{StatusId, UpscaleStatus};
use printframe_core::types::DbId;
use sqlx::PgPool;

use crate::models::upscale_job::UpscaleJobRow;

/// Column list for `upscale_jobs` queries.
const COLUMNS: &str = "\
    id, photo_id, user_id, status_id, source_path, result_path, error_message, \
    created_at, started_at, completed_at";

/// Statuses that occupy the photo's single in-flight slot.
const ACTIVE_STATUSES: [StatusId; 2] = [
    UpscaleStatus::Pending as StatusId,
    UpscaleStatus::Processing as StatusId,
];

pub struct UpscaleJobRepo;

impl UpscaleJobRepo {
    /// Return the photo's in-flight job, or insert a new pending one.
    ///
    /// The lookup and insert share a transaction, and the partial unique
    /// index `uq_upscale_jobs_active_photo` turns a concurrent insert into a
    /// no-op, after which the winner's row is returned. The boolean is
    /// `true` when a row was created.
    pub async fn insert_if_no_active(
        pool: &PgPool,
        photo_id: DbId,
        user_id: &str,
        source_path: &str,
    ) -> Result<(UpscaleJobRow, bool), sqlx::Error> {
        let select_active = format!(
            "SELECT {COLUMNS} FROM upscale_jobs \
             WHERE photo_id = $1 AND status_id = ANY($2) \
             ORDER BY created_at DESC LIMIT 1"
        );
        let insert = format!(
            "INSERT INTO upscale_jobs (photo_id, user_id, status_id, source_path) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (photo_id) WHERE status_id IN (1, 2) DO NOTHING \
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, UpscaleJobRow>(&select_active)
            .bind(photo_id)
            .bind(&ACTIVE_STATUSES[..])
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(job) = existing {
            tx.commit().await?;
            return Ok((job, false));
        }

        let inserted = sqlx::query_as::<_, UpscaleJobRow>(&insert)
            .bind(photo_id)
            .bind(user_id)
            .bind(UpscaleStatus::Pending.id())
            .bind(source_path)
            .fetch_optional(&mut *tx)
            .await?;

        let result = match inserted {
            Some(job) => (job, true),
            None => {
                let winner = sqlx::query_as::<_, UpscaleJobRow>(&select_active)
                    .bind(photo_id)
                    .bind(&ACTIVE_STATUSES[..])
                    .fetch_one(&mut *tx)
                    .await?;
                (winner, false)
            }
        };
        tx.commit().await?;
        Ok(result)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UpscaleJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM upscale_jobs WHERE id = $1");
        sqlx::query_as::<_, UpscaleJobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently created job for a photo, in any status.
    pub async fn latest_for_photo(
        pool: &PgPool,
        photo_id: DbId,
    ) -> Result<Option<UpscaleJobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM upscale_jobs WHERE photo_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, UpscaleJobRow>(&query)
            .bind(photo_id)
            .fetch_optional(pool)
            .await
    }

    /// pending -> processing. Returns `None` if the job was not pending.
    pub async fn mark_processing(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<UpscaleJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE upscale_jobs \
             SET status_id = $2, started_at = COALESCE(started_at, NOW()) \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UpscaleJobRow>(&query)
            .bind(id)
            .bind(UpscaleStatus::Processing.id())
            .bind(UpscaleStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// processing -> completed. Returns `None` if the job was not processing.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        result_path: &str,
    ) -> Result<Option<UpscaleJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE upscale_jobs \
             SET status_id = $2, result_path = $3, completed_at = COALESCE(completed_at, NOW()) \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UpscaleJobRow>(&query)
            .bind(id)
            .bind(UpscaleStatus::Completed.id())
            .bind(result_path)
            .bind(UpscaleStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }

    /// pending|processing -> failed. Returns `None` if already terminal.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_message: &str,
    ) -> Result<Option<UpscaleJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE upscale_jobs \
             SET status_id = $2, error_message = $3, completed_at = COALESCE(completed_at, NOW()) \
             WHERE id = $1 AND status_id = ANY($4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UpscaleJobRow>(&query)
            .bind(id)
            .bind(UpscaleStatus::Failed.id())
            .bind(error_message)
            .bind(&ACTIVE_STATUSES[..])
            .fetch_optional(pool)
            .await
    }
}
