//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure. The
//! pipeline treats any variant as a persistence failure: recoverable by
//! retrying the same batch, surfaced through the status reporter while
//! unhealthy.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Read pool exhausted or unavailable.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Store was shut down before the operation.
    #[error("store closed")]
    Closed,

    /// Invalid data read back from storage (e.g. unknown enum value).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}
