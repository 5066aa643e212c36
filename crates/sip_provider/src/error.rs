//! Error types for sync info providers.

use sip_store::StoreError;
use thiserror::Error;

/// Result type for provider operations.
pub type SipResult<T> = Result<T, SipError>;

/// Errors that can occur in provider operations.
#[derive(Error, Debug)]
pub enum SipError {
    /// Shard id outside `[0, num_shards)`.
    #[error("shard {shard_id} out of range (num_shards={num_shards})")]
    OutOfRange {
        /// Requested shard.
        shard_id: u32,
        /// Shards of the stage.
        num_shards: u32,
    },

    /// Malformed marker or other bad argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing provider, stage or section.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation was called before `init`.
    #[error("provider not initialized")]
    NotInitialized,

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Entry payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl SipError {
    /// Returns true if the caller's request was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SipError::OutOfRange { .. } | SipError::InvalidArgument(_) | SipError::NotFound(_)
        ) || matches!(
            self,
            SipError::Store(StoreError::NotFound(_) | StoreError::InvalidMarker(_))
        )
    }

    /// Returns true if the error means the thing asked for does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SipError::NotFound(_) | SipError::Store(StoreError::NotFound(_))
        )
    }
}
