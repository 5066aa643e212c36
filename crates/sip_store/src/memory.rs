//! In-memory keyspace and change log for testing.

use crate::changelog::{
    ChangeLog, ChangeLogSource, LogBatch, LogInfo, LogRecord, TimeRange, TrimOutcome,
};
use crate::error::{StoreError, StoreResult};
use crate::keyspace::{KeyBatch, KeyEnumerator, KeyInfo};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// An in-memory sectioned keyspace.
///
/// Sections and the keys inside them list in sorted order, and a key's
/// marker is the key itself. The keyspace counts open listings so tests can
/// check that every listing gets completed.
///
/// # Example
///
/// ```rust
/// use sip_store::{InMemoryKeyspace, KeyListing};
///
/// let keyspace = InMemoryKeyspace::new();
/// keyspace.insert("user", "alice");
/// keyspace.insert("user", "bob");
///
/// let listing = KeyListing::open(&keyspace, "user", "alice").unwrap();
/// let keys = listing.collect_all(10).unwrap();
/// assert_eq!(keys.len(), 1);
/// assert_eq!(keys[0].key, "bob");
/// assert_eq!(keyspace.open_handles(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryKeyspace {
    sections: RwLock<BTreeMap<String, BTreeSet<String>>>,
    open_handles: AtomicUsize,
    failing: AtomicBool,
}

/// Listing cursor for [`InMemoryKeyspace`].
#[derive(Debug)]
pub struct KeyspaceHandle {
    section: String,
    after: Option<String>,
}

impl InMemoryKeyspace {
    /// Creates an empty keyspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keyspace from `(section, keys)` pairs.
    pub fn with_sections<S, K>(sections: impl IntoIterator<Item = (S, K)>) -> Self
    where
        S: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        let keyspace = Self::new();
        for (section, keys) in sections {
            let section = section.into();
            keyspace.add_section(&section);
            for key in keys {
                keyspace.insert(&section, key);
            }
        }
        keyspace
    }

    /// Registers a section, possibly without keys.
    pub fn add_section(&self, section: &str) {
        self.sections.write().entry(section.to_string()).or_default();
    }

    /// Adds a key, creating its section if needed.
    pub fn insert(&self, section: &str, key: impl Into<String>) {
        self.sections
            .write()
            .entry(section.to_string())
            .or_default()
            .insert(key.into());
    }

    /// Removes a key. Returns true if it was present.
    pub fn remove(&self, section: &str, key: &str) -> bool {
        self.sections
            .write()
            .get_mut(section)
            .map_or(false, |keys| keys.remove(key))
    }

    /// Number of listings opened and not yet completed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `list_next` fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KeyEnumerator for InMemoryKeyspace {
    type Handle = KeyspaceHandle;

    fn list_init(&self, section: &str, marker: &str) -> StoreResult<KeyspaceHandle> {
        if !section.is_empty() && !self.sections.read().contains_key(section) {
            return Err(StoreError::NotFound(format!("section {section:?}")));
        }
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(KeyspaceHandle {
            section: section.to_string(),
            after: (!marker.is_empty()).then(|| marker.to_string()),
        })
    }

    fn list_next(&self, handle: &mut KeyspaceHandle, max: usize) -> StoreResult<KeyBatch> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("keyspace listing disabled".into()));
        }

        let sections = self.sections.read();
        let lower = match &handle.after {
            Some(after) => Bound::Excluded(after.as_str()),
            None => Bound::Unbounded,
        };

        let mut names: Vec<&String> = if handle.section.is_empty() {
            sections
                .range::<str, _>((lower, Bound::Unbounded))
                .map(|(name, _)| name)
                .take(max.saturating_add(1))
                .collect()
        } else {
            let keys = sections
                .get(&handle.section)
                .ok_or_else(|| StoreError::NotFound(format!("section {:?}", handle.section)))?;
            keys.range::<str, _>((lower, Bound::Unbounded))
                .take(max.saturating_add(1))
                .collect()
        };

        let truncated = names.len() > max;
        names.truncate(max);

        if let Some(last) = names.last() {
            handle.after = Some((*last).clone());
        }
        trace!(section = %handle.section, count = names.len(), truncated, "listed keys");

        Ok(KeyBatch {
            keys: names.into_iter().map(|name| KeyInfo::new(name.clone())).collect(),
            truncated,
        })
    }

    fn list_complete(&self, _handle: KeyspaceHandle) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct ShardLog {
    records: VecDeque<LogRecord>,
    next_seq: u64,
    head: LogInfo,
}

impl ShardLog {
    fn new() -> Self {
        Self {
            records: VecDeque::new(),
            next_seq: 1,
            head: LogInfo {
                marker: String::new(),
                last_update: UNIX_EPOCH,
            },
        }
    }
}

/// An in-memory sharded change log.
///
/// Record ids are zero-padded sequence numbers, so string order matches
/// append order. A single trim call removes at most `trim_batch` records.
#[derive(Debug)]
pub struct InMemoryChangeLog {
    shards: Vec<RwLock<ShardLog>>,
    trim_batch: usize,
    open_handles: AtomicUsize,
    failing: AtomicBool,
}

/// Listing cursor for [`InMemoryChangeLog`].
#[derive(Debug)]
pub struct LogHandle {
    shard_id: u32,
    range: TimeRange,
    after: String,
}

impl InMemoryChangeLog {
    /// Default number of records removed per trim call.
    pub const DEFAULT_TRIM_BATCH: usize = 1000;

    /// Width of the zero-padded record ids.
    pub const ID_WIDTH: usize = 20;

    /// Creates a log with `num_shards` empty shards.
    pub fn new(num_shards: u32) -> Self {
        Self {
            shards: (0..num_shards).map(|_| RwLock::new(ShardLog::new())).collect(),
            trim_batch: Self::DEFAULT_TRIM_BATCH,
            open_handles: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Sets how many records one trim call may remove.
    #[must_use]
    pub fn with_trim_batch(mut self, trim_batch: usize) -> Self {
        self.trim_batch = trim_batch.max(1);
        self
    }

    /// Number of shards.
    pub fn num_shards(&self) -> u32 {
        self.shards.len() as u32
    }

    /// Appends a change stamped with the current time. Returns the record id.
    pub fn append(&self, shard_id: u32, section: &str, name: &str) -> StoreResult<String> {
        self.append_at(shard_id, section, name, SystemTime::now())
    }

    /// Appends a change with an explicit timestamp. Returns the record id.
    pub fn append_at(
        &self,
        shard_id: u32,
        section: &str,
        name: &str,
        timestamp: SystemTime,
    ) -> StoreResult<String> {
        let mut shard = self.shard(shard_id)?.write();
        let id = format!("{:0width$}", shard.next_seq, width = Self::ID_WIDTH);
        shard.next_seq += 1;
        shard.records.push_back(LogRecord {
            id: id.clone(),
            section: section.to_string(),
            name: name.to_string(),
            timestamp,
        });
        shard.head = LogInfo {
            marker: id.clone(),
            last_update: timestamp,
        };
        Ok(id)
    }

    /// Number of records retained in a shard.
    pub fn len(&self, shard_id: u32) -> StoreResult<usize> {
        Ok(self.shard(shard_id)?.read().records.len())
    }

    /// Returns true if the shard retains no records.
    pub fn is_empty(&self, shard_id: u32) -> StoreResult<bool> {
        Ok(self.len(shard_id)? == 0)
    }

    /// Number of listings opened and not yet completed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `list` fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Checks that `marker` is empty or a record id of this log.
    fn check_marker(marker: &str) -> StoreResult<()> {
        let is_id = marker.len() == Self::ID_WIDTH && marker.bytes().all(|b| b.is_ascii_digit());
        if marker.is_empty() || is_id {
            Ok(())
        } else {
            Err(StoreError::InvalidMarker(marker.to_string()))
        }
    }

    fn shard(&self, shard_id: u32) -> StoreResult<&RwLock<ShardLog>> {
        self.shards
            .get(shard_id as usize)
            .ok_or_else(|| StoreError::NotFound(format!("log shard {shard_id}")))
    }
}

impl ChangeLog for InMemoryChangeLog {
    type Handle = LogHandle;

    fn init_list(&self, shard_id: u32, range: TimeRange, marker: &str) -> StoreResult<LogHandle> {
        self.shard(shard_id)?;
        Self::check_marker(marker)?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(LogHandle {
            shard_id,
            range,
            after: marker.to_string(),
        })
    }

    fn list(&self, handle: &mut LogHandle, max: usize) -> StoreResult<LogBatch> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("change log listing disabled".into()));
        }

        let shard = self.shard(handle.shard_id)?.read();
        let mut records: Vec<LogRecord> = shard
            .records
            .iter()
            .filter(|r| r.id.as_str() > handle.after.as_str() && handle.range.contains(r.timestamp))
            .take(max.saturating_add(1))
            .cloned()
            .collect();

        let truncated = records.len() > max;
        records.truncate(max);

        if let Some(last) = records.last() {
            handle.after = last.id.clone();
        }

        Ok(LogBatch { records, truncated })
    }

    fn complete_list(&self, _handle: LogHandle) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }

    fn get_info(&self, shard_id: u32) -> StoreResult<LogInfo> {
        Ok(self.shard(shard_id)?.read().head.clone())
    }

    fn trim(
        &self,
        shard_id: u32,
        range: TimeRange,
        start_marker: &str,
        end_marker: &str,
    ) -> StoreResult<TrimOutcome> {
        let mut shard = self.shard(shard_id)?.write();
        let mut budget = self.trim_batch;

        shard.records.retain(|r| {
            let id = r.id.as_str();
            let trimmable = budget > 0
                && id > start_marker
                && id <= end_marker
                && range.contains(r.timestamp);
            if trimmable {
                budget -= 1;
            }
            !trimmable
        });

        let removed = self.trim_batch - budget;
        trace!(shard_id, removed, end_marker, "trimmed log shard");

        Ok(if removed == 0 {
            TrimOutcome::NoData
        } else {
            TrimOutcome::Progress
        })
    }
}

/// Maps period ids to in-memory change logs.
#[derive(Debug, Default)]
pub struct InMemoryLogSource {
    logs: RwLock<HashMap<String, Arc<InMemoryChangeLog>>>,
}

impl InMemoryLogSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the log of a period.
    pub fn insert(&self, period_id: impl Into<String>, log: Arc<InMemoryChangeLog>) {
        self.logs.write().insert(period_id.into(), log);
    }
}

impl ChangeLogSource for InMemoryLogSource {
    type Log = InMemoryChangeLog;

    fn get_log(&self, period_id: &str) -> StoreResult<Arc<InMemoryChangeLog>> {
        self.logs
            .read()
            .get(period_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("change log for period {period_id:?}")))
    }
}
