//! Side store for consumer marker bookkeeping.
//!
//! Consumers record how far each of their targets has progressed on a
//! provider shard. The records are plain keyed state: providers never read
//! them, and fetch positions always come from the request.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

/// Identifies the marker record of one provider shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerKey {
    /// Provider name.
    pub provider: String,
    /// Stage id.
    pub stage: String,
    /// Shard id.
    pub shard: u32,
}

impl MarkerKey {
    /// Creates a key.
    pub fn new(provider: impl Into<String>, stage: impl Into<String>, shard: u32) -> Self {
        Self {
            provider: provider.into(),
            stage: stage.into(),
            shard,
        }
    }
}

/// Position a target has reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMarker {
    /// Last marker the target applied.
    pub marker: String,
    /// When the target recorded it.
    pub mtime: SystemTime,
}

/// Marker record of one provider shard, per target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardMarkers {
    /// Target id to position.
    pub targets: BTreeMap<String, TargetMarker>,
}

/// Keyed storage for [`ShardMarkers`].
pub trait MarkerStore: Send + Sync {
    /// Reads the record of `key`, if any.
    fn get(&self, key: &MarkerKey) -> ServerResult<Option<ShardMarkers>>;

    /// Upserts the position of `target_id`.
    ///
    /// With `check_exists`, the target must already be recorded.
    fn set_target(
        &self,
        key: &MarkerKey,
        target_id: &str,
        marker: TargetMarker,
        check_exists: bool,
    ) -> ServerResult<()>;

    /// Removes `target_id`; the record goes away with its last target.
    /// Removing an absent target succeeds.
    fn remove_target(&self, key: &MarkerKey, target_id: &str) -> ServerResult<()>;
}

/// A [`MarkerStore`] kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    records: RwLock<HashMap<MarkerKey, ShardMarkers>>,
}

impl InMemoryMarkerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn get(&self, key: &MarkerKey) -> ServerResult<Option<ShardMarkers>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn set_target(
        &self,
        key: &MarkerKey,
        target_id: &str,
        marker: TargetMarker,
        check_exists: bool,
    ) -> ServerResult<()> {
        let mut records = self.records.write();
        let exists = records
            .get(key)
            .is_some_and(|r| r.targets.contains_key(target_id));
        if check_exists && !exists {
            return Err(ServerError::NotFound(format!(
                "target {target_id} on {}/{}/{}",
                key.provider, key.stage, key.shard
            )));
        }

        records
            .entry(key.clone())
            .or_default()
            .targets
            .insert(target_id.to_string(), marker);
        Ok(())
    }

    fn remove_target(&self, key: &MarkerKey, target_id: &str) -> ServerResult<()> {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(key) {
            record.targets.remove(target_id);
            if record.targets.is_empty() {
                records.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(m: &str) -> TargetMarker {
        TargetMarker {
            marker: m.to_string(),
            mtime: SystemTime::now(),
        }
    }

    #[test]
    fn set_get_remove() {
        let store = InMemoryMarkerStore::new();
        let key = MarkerKey::new("meta.inc", "meta.inc", 3);

        assert!(store.get(&key).unwrap().is_none());

        store.set_target(&key, "zone-b", marker("00000000000000000004"), false).unwrap();
        store.set_target(&key, "zone-c", marker("00000000000000000002"), false).unwrap();

        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.targets.len(), 2);
        assert_eq!(record.targets["zone-b"].marker, "00000000000000000004");

        store.remove_target(&key, "zone-b").unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap().targets.len(), 1);

        store.remove_target(&key, "zone-c").unwrap();
        assert!(store.get(&key).unwrap().is_none());

        // Removing again is fine.
        store.remove_target(&key, "zone-c").unwrap();
    }

    #[test]
    fn check_exists_requires_target() {
        let store = InMemoryMarkerStore::new();
        let key = MarkerKey::new("meta.full", "meta.full", 0);

        let result = store.set_target(&key, "zone-b", marker("user/a"), true);
        assert!(matches!(result, Err(ServerError::NotFound(_))));

        store.set_target(&key, "zone-b", marker("user/a"), false).unwrap();
        store.set_target(&key, "zone-b", marker("user/b"), true).unwrap();
        assert_eq!(
            store.get(&key).unwrap().unwrap().targets["zone-b"].marker,
            "user/b"
        );
    }

    #[test]
    fn records_are_per_shard() {
        let store = InMemoryMarkerStore::new();
        store
            .set_target(&MarkerKey::new("meta.inc", "meta.inc", 0), "z", marker("1"), false)
            .unwrap();

        assert!(store
            .get(&MarkerKey::new("meta.inc", "meta.inc", 1))
            .unwrap()
            .is_none());
    }
}
