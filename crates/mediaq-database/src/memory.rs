//! In-memory item store for tests and single-node development.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use mediaq_core::result::AppResult;
use mediaq_core::traits::item_store::ItemStore;
use mediaq_core::types::{ItemId, JobId, MediaKind, ProcessingStatus, StatusCounts};
use mediaq_entity::item::MediaItem;

/// Item store held in a concurrent map.
///
/// Each transition runs under the shard lock of its entry, which gives the
/// same compare-and-set semantics as the conditional `UPDATE` of the
/// PostgreSQL repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryItemStore {
    items: Arc<DashMap<ItemId, MediaItem>>,
}

impl MemoryItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending item uploaded at `created_at`.
    pub fn insert_pending(&self, kind: MediaKind, created_at: DateTime<Utc>) -> ItemId {
        let item = MediaItem::new(kind, created_at);
        let id = item.id;
        self.items.insert(id, item);
        id
    }

    /// Fetch a copy of an item.
    pub fn get(&self, id: ItemId) -> Option<MediaItem> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of items in the store.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply `f` to an item under its entry lock. Returns whatever `f`
    /// returns, or `false` for unknown items.
    fn update(&self, id: ItemId, f: impl FnOnce(&mut MediaItem) -> bool) -> bool {
        match self.items.get_mut(&id) {
            Some(mut entry) => {
                let changed = f(entry.value_mut());
                if changed {
                    entry.value_mut().updated_at = Utc::now();
                }
                changed
            }
            None => false,
        }
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn list_pending(&self, kind: MediaKind, limit: usize) -> AppResult<Vec<ItemId>> {
        let mut pending: Vec<(DateTime<Utc>, ItemId)> = self
            .items
            .iter()
            .filter(|entry| {
                entry.kind == kind && entry.processing_status == ProcessingStatus::Pending
            })
            .map(|entry| (entry.created_at, entry.id))
            .collect();
        pending.sort();
        Ok(pending.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn try_claim(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool> {
        Ok(self.update(item_id, |item| match item.processing_status {
            ProcessingStatus::Pending => {
                item.processing_status = ProcessingStatus::Processing;
                item.claimed_by = Some(job_id);
                item.claimed_at = Some(Utc::now());
                true
            }
            ProcessingStatus::Processing if item.claimed_by == Some(job_id) => {
                item.claimed_at = Some(Utc::now());
                true
            }
            _ => false,
        }))
    }

    async fn release(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool> {
        Ok(self.update(item_id, |item| {
            if item.processing_status == ProcessingStatus::Processing
                && item.claimed_by == Some(job_id)
            {
                item.processing_status = ProcessingStatus::Pending;
                item.claimed_by = None;
                item.claimed_at = None;
                true
            } else {
                false
            }
        }))
    }

    async fn mark_processed(&self, item_id: ItemId, job_id: JobId) -> AppResult<bool> {
        Ok(self.update(item_id, |item| {
            if item.processing_status == ProcessingStatus::Processing
                && item.claimed_by == Some(job_id)
            {
                item.processing_status = ProcessingStatus::Processed;
                item.processing_error = None;
                true
            } else {
                false
            }
        }))
    }

    async fn mark_failed(&self, item_id: ItemId, job_id: JobId, error: &str) -> AppResult<bool> {
        Ok(self.update(item_id, |item| {
            let allowed = match item.processing_status {
                ProcessingStatus::Pending => true,
                ProcessingStatus::Processing => item.claimed_by == Some(job_id),
                ProcessingStatus::Processed | ProcessingStatus::Failed => false,
            };
            if allowed {
                item.processing_status = ProcessingStatus::Failed;
                item.processing_error = Some(error.to_string());
            }
            allowed
        }))
    }

    async fn status_counts(&self, kind: MediaKind) -> AppResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for entry in self.items.iter().filter(|entry| entry.kind == kind) {
            match entry.processing_status {
                ProcessingStatus::Pending => counts.pending += 1,
                ProcessingStatus::Processing => counts.processing += 1,
                ProcessingStatus::Processed => counts.processed += 1,
                ProcessingStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_pending_is_oldest_first_and_limited() {
        let store = MemoryItemStore::new();
        let now = Utc::now();
        let newest = store.insert_pending(MediaKind::Photo, now);
        let oldest = store.insert_pending(MediaKind::Photo, now - Duration::hours(2));
        let middle = store.insert_pending(MediaKind::Photo, now - Duration::hours(1));
        store.insert_pending(MediaKind::Video, now - Duration::hours(3));

        let ids = store.list_pending(MediaKind::Photo, 10).await.unwrap();
        assert_eq!(ids, vec![oldest, middle, newest]);

        let ids = store.list_pending(MediaKind::Photo, 2).await.unwrap();
        assert_eq!(ids, vec![oldest, middle]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_between_jobs() {
        let store = MemoryItemStore::new();
        let item = store.insert_pending(MediaKind::Photo, Utc::now());
        let first = JobId::new();
        let second = JobId::new();

        assert!(store.try_claim(item, first).await.unwrap());
        assert!(!store.try_claim(item, second).await.unwrap());
        // Redelivery of the same job may take its own claim back.
        assert!(store.try_claim(item, first).await.unwrap());
        assert!(store.list_pending(MediaKind::Photo, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_returns_item_to_pending() {
        let store = MemoryItemStore::new();
        let item = store.insert_pending(MediaKind::Video, Utc::now());
        let job = JobId::new();

        assert!(!store.release(item, job).await.unwrap());
        assert!(store.try_claim(item, job).await.unwrap());
        assert!(store.release(item, job).await.unwrap());
        assert_eq!(
            store.get(item).unwrap().processing_status,
            ProcessingStatus::Pending
        );
        assert!(store.try_claim(item, JobId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let store = MemoryItemStore::new();
        let item = store.insert_pending(MediaKind::Photo, Utc::now());
        let job = JobId::new();

        assert!(!store.mark_processed(item, job).await.unwrap());
        assert!(store.try_claim(item, job).await.unwrap());
        assert!(store.mark_processed(item, job).await.unwrap());
        assert!(!store.mark_failed(item, job, "late").await.unwrap());
        assert!(!store.try_claim(item, job).await.unwrap());

        let counts = store.status_counts(MediaKind::Photo).await.unwrap();
        assert_eq!(counts.processed, 1);
        assert_eq!(counts.total(), 1);
    }

    #[tokio::test]
    async fn test_mark_failed_respects_foreign_claim() {
        let store = MemoryItemStore::new();
        let item = store.insert_pending(MediaKind::Photo, Utc::now());
        let holder = JobId::new();
        assert!(store.try_claim(item, holder).await.unwrap());

        assert!(!store.mark_failed(item, JobId::new(), "boom").await.unwrap());
        assert!(store.mark_failed(item, holder, "boom").await.unwrap());
        let stored = store.get(item).unwrap();
        assert_eq!(stored.processing_status, ProcessingStatus::Failed);
        assert_eq!(stored.processing_error.as_deref(), Some("boom"));
    }
}
