//! Append-only change log contract.

use crate::error::{StoreError, StoreResult};
use std::sync::Arc;
use std::time::SystemTime;

/// An optional time window over log records. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: Option<SystemTime>,
    /// Exclusive upper bound.
    pub end: Option<SystemTime>,
}

impl TimeRange {
    /// The whole retained history.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Returns true if `timestamp` falls inside the window.
    pub fn contains(&self, timestamp: SystemTime) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp < end)
    }
}

/// A single change log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Native entry id; ids order the records of a shard.
    pub id: String,
    /// Keyspace section the change touched.
    pub section: String,
    /// Name of the changed key within the section.
    pub name: String,
    /// When the change was logged.
    pub timestamp: SystemTime,
}

/// One page of a change log listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    /// Records in log order.
    pub records: Vec<LogRecord>,
    /// Whether more records exist after this page.
    pub truncated: bool,
}

/// Head position of a log shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogInfo {
    /// Id of the newest record ever appended (empty if none).
    pub marker: String,
    /// Time of the last append.
    pub last_update: SystemTime,
}

/// Result of a single trim call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimOutcome {
    /// Some records were removed; more may remain below the end marker.
    Progress,
    /// Nothing left to trim in the requested range.
    NoData,
}

/// A sharded append-only change log.
///
/// A single `trim` call may stop after partial progress; callers that need
/// the whole range gone re-issue it until [`TrimOutcome::NoData`].
pub trait ChangeLog: Send + Sync {
    /// Per-listing cursor state.
    type Handle: Send;

    /// Starts listing `shard_id` after `marker` within `range`.
    fn init_list(&self, shard_id: u32, range: TimeRange, marker: &str)
        -> StoreResult<Self::Handle>;

    /// Returns at most `max` further records.
    fn list(&self, handle: &mut Self::Handle, max: usize) -> StoreResult<LogBatch>;

    /// Releases the listing.
    fn complete_list(&self, handle: Self::Handle);

    /// Returns the head position of a shard.
    fn get_info(&self, shard_id: u32) -> StoreResult<LogInfo>;

    /// Removes records in `(start_marker, end_marker]` that fall inside `range`.
    /// An empty `start_marker` means from the oldest retained record.
    fn trim(
        &self,
        shard_id: u32,
        range: TimeRange,
        start_marker: &str,
        end_marker: &str,
    ) -> StoreResult<TrimOutcome>;
}

/// Resolves the change log of a period.
pub trait ChangeLogSource: Send + Sync {
    /// The log type handed out.
    type Log: ChangeLog;

    /// Returns the log for `period_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown period.
    fn get_log(&self, period_id: &str) -> StoreResult<Arc<Self::Log>>;
}

/// A change log listing that is completed when dropped.
pub struct LogListing<'a, L: ChangeLog + ?Sized> {
    log: &'a L,
    handle: Option<L::Handle>,
}

impl<'a, L: ChangeLog + ?Sized> LogListing<'a, L> {
    /// Opens a listing of `shard_id` positioned after `marker`.
    pub fn open(log: &'a L, shard_id: u32, range: TimeRange, marker: &str) -> StoreResult<Self> {
        let handle = log.init_list(shard_id, range, marker)?;
        Ok(Self {
            log,
            handle: Some(handle),
        })
    }

    /// Reads the next page of at most `max` records.
    pub fn next_batch(&mut self, max: usize) -> StoreResult<LogBatch> {
        let handle = self.handle.as_mut().ok_or(StoreError::InvalidHandle)?;
        self.log.list(handle, max)
    }
}

impl<L: ChangeLog + ?Sized> Drop for LogListing<'_, L> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.log.complete_list(handle);
        }
    }
}
