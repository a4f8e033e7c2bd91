//! Item store selection.

use std::sync::Arc;

use tracing::info;

use mediaq_core::config::AppConfig;
use mediaq_core::error::AppError;
use mediaq_core::result::AppResult;
use mediaq_core::traits::item_store::ItemStore;

use crate::connection::DatabasePool;
use crate::memory::MemoryItemStore;
use crate::migration::run_migrations;
use crate::repositories::MediaItemRepository;

/// Build the item store named by `store.provider`.
///
/// The `postgres` provider connects, runs pending migrations, and returns
/// the pool alongside the store so callers can close it on shutdown.
pub async fn create_item_store(
    config: &AppConfig,
) -> AppResult<(Arc<dyn ItemStore>, Option<DatabasePool>)> {
    match config.store.provider.as_str() {
        "memory" => {
            info!("Initializing in-memory item store");
            Ok((Arc::new(MemoryItemStore::new()), None))
        }
        "postgres" => {
            info!("Initializing PostgreSQL item store");
            let pool = DatabasePool::connect(&config.database).await?;
            run_migrations(pool.pool()).await?;
            let repo = MediaItemRepository::new(pool.pool().clone());
            Ok((Arc::new(repo), Some(pool)))
        }
        other => Err(AppError::configuration(format!(
            "Unknown item store provider: '{other}'. Supported: memory, postgres"
        ))),
    }
}
