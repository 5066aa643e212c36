//! Error types for backing store operations.

use thiserror::Error;

/// Result type for backing store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a keyspace enumerator or a change log.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is temporarily unable to serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The requested section, shard or log does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A marker could not be interpreted by the store.
    #[error("invalid marker: {0:?}")]
    InvalidMarker(String),

    /// The listing handle was not produced by this store or is already complete.
    #[error("invalid listing handle")]
    InvalidHandle,
}

impl StoreError {
    /// Returns true if the failure is transient and the call may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
