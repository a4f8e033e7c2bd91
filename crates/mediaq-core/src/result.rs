//! Convenience result type alias for MediaQ.

use crate::error::AppError;

/// A specialized `Result` type for MediaQ operations.
pub type AppResult<T> = Result<T, AppError>;
