//! The sync info provider contract.

use crate::error::{SipError, SipResult};
use crate::types::{FetchResult, ProviderInfo, SipPos, StageShardInfo};
use std::sync::Arc;

/// Decodes entry payloads of one data type for display.
pub trait TypeHandler: Send + Sync {
    /// Data type this handler understands.
    fn data_type(&self) -> &str;

    /// Renders an entry payload as JSON.
    fn decode_json(&self, data: &[u8]) -> SipResult<serde_json::Value>;
}

/// A Sync Information Provider.
///
/// A provider exposes an ordered, sharded, resumable stream of change
/// entries. Every positional state lives in the caller's marker; the
/// provider keeps nothing between calls.
///
/// # Invariants
///
/// - `init` runs once, before any other operation, and takes `&mut self`;
///   after that the provider is only read, so it can be shared behind an
///   [`Arc`] without locking
/// - Within a shard, entries across successive `fetch` calls are totally
///   ordered by marker, with no gaps and no duplicates
/// - A shard id outside `[0, num_shards)` yields [`SipError::OutOfRange`]
/// - Calls block on the backing store; async callers must run them on a
///   blocking-capable thread
///
/// # Trim hazard
///
/// Trim is not coordinated with fetches. Fetching from a marker that a
/// concurrent trim already removed may fail with a not-found or
/// invalid-argument class error.
pub trait SiProvider: Send + Sync {
    /// Provider name, data type and stages.
    fn info(&self) -> &ProviderInfo;

    /// Handler for this provider's entry payloads.
    fn type_handler(&self) -> &dyn TypeHandler;

    /// One-time setup; may perform I/O against the backing store.
    fn init(&mut self) -> SipResult<()>;

    /// Returns at most `max` entries strictly after `marker`.
    ///
    /// An empty marker starts from the beginning of the shard.
    ///
    /// # Errors
    ///
    /// - [`SipError::OutOfRange`] for a bad shard id
    /// - [`SipError::InvalidArgument`] for a malformed marker
    /// - [`SipError::Store`] when the backing store fails
    fn fetch(&self, shard_id: u32, marker: &str, max: usize) -> SipResult<FetchResult>;

    /// Earliest valid marker of a shard.
    fn get_start_marker(&self, shard_id: u32) -> SipResult<SipPos>;

    /// Current head of a shard.
    fn get_current_state(&self, shard_id: u32) -> SipResult<StageShardInfo>;

    /// Advises the store that entries at or before `marker` can go.
    fn trim(&self, shard_id: u32, marker: &str) -> SipResult<()>;

    /// Provider name.
    fn name(&self) -> &str {
        &self.info().name
    }
}

/// Shared handle to an initialized provider.
pub type SiProviderRef = Arc<dyn SiProvider>;

pub(crate) fn check_shard(shard_id: u32, num_shards: u32) -> SipResult<()> {
    if shard_id >= num_shards {
        return Err(SipError::OutOfRange {
            shard_id,
            num_shards,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_bounds() {
        assert!(check_shard(0, 1).is_ok());
        assert!(check_shard(63, 64).is_ok());
        assert!(matches!(
            check_shard(1, 1),
            Err(SipError::OutOfRange {
                shard_id: 1,
                num_shards: 1
            })
        ));
        assert!(check_shard(0, 0).is_err());
    }
}
