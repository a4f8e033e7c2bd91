//! Database migration runner.

use sqlx::PgPool;
use tracing::info;

use mediaq_core::error::{AppError, ErrorKind};

/// Apply pending migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Media item schema is up to date");
    Ok(())
}
