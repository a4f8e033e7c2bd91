//! Media item repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use mediaq_core::error::{AppError, ErrorKind};
use mediaq_core::result::AppResult;
use mediaq_core::traits::item_store::ItemStore;
use mediaq_core::types::{ItemId, JobId, MediaKind, ProcessingStatus, StatusCounts};
use mediaq_entity::item::MediaItem;

/// PostgreSQL-backed item store.
///
/// Every state change is a single conditional `UPDATE`; the row count
/// tells whether the transition happened.
#[derive(Debug, Clone)]
pub struct MediaItemRepository {
    pool: PgPool,
}

impl MediaItemRepository {
    /// Create a new media item repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recently failed items of a kind, newest first.
    pub async fn recent_failures(&self, kind: MediaKind, limit: i64) -> AppResult<Vec<MediaItem>> {
        sqlx::query_as::<_, MediaItem>(
            "SELECT * FROM media_items WHERE kind = $1 AND processing_status = 'failed' \
             ORDER BY updated_at DESC LIMIT $2",
        )
        .bind(kind)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list failed items", e))
    }
}

#[async_trait]
impl ItemStore for MediaItemRepository {
    async fn list_pending(&self, kind: MediaKind, limit: usize) -> AppResult<Vec<ItemId>> {
        sqlx::query_scalar::<_, ItemId>(
            "SELECT id FROM media_items \
             WHERE kind = $1 AND processing_status = 'pending' \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2",
        )
        .bind(kind)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list pending items", e))
    }

    async fn try_claim(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE media_items SET processing_status = 'processing', claimed_by = $2, \
             claimed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND (processing_status = 'pending' \
                OR (processing_status = 'processing' AND claimed_by = $2))",
        )
        .bind(item_id)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim media item", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE media_items SET processing_status = 'pending', claimed_by = NULL, \
             claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND processing_status = 'processing' AND claimed_by = $2",
        )
        .bind(item_id)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release media item", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_processed(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE media_items SET processing_status = 'processed', processing_error = NULL, \
             updated_at = NOW() \
             WHERE id = $1 AND processing_status = 'processing' AND claimed_by = $2",
        )
        .bind(item_id)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark media item processed", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, item_id: ItemId, job_id: JobId, error: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE media_items SET processing_status = 'failed', processing_error = $3, \
             updated_at = NOW() \
             WHERE id = $1 AND (processing_status = 'pending' \
                OR (processing_status = 'processing' AND claimed_by = $2))",
        )
        .bind(item_id)
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark media item failed", e)
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn status_counts(&self, kind: MediaKind) -> AppResult<StatusCounts> {
        let rows: Vec<(ProcessingStatus, i64)> = sqlx::query_as(
            "SELECT processing_status, COUNT(*) FROM media_items \
             WHERE kind = $1 GROUP BY processing_status",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count media items", e))?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let count = u64::try_from(count).unwrap_or(0);
            match status {
                ProcessingStatus::Pending => counts.pending = count,
                ProcessingStatus::Processing => counts.processing = count,
                ProcessingStatus::Processed => counts.processed = count,
                ProcessingStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}
