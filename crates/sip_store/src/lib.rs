//! # SIP Store
//!
//! Backing store contracts consumed by sync info providers.
//!
//! Providers never own the stores they read. They go through two narrow
//! iteration contracts:
//!
//! - [`KeyEnumerator`] - paginated listing of a sectioned metadata keyspace
//! - [`ChangeLog`] - a sharded append-only log with listing, head queries
//!   and best-effort trimming
//!
//! Listing handles are wrapped in [`KeyListing`] and [`LogListing`], which
//! complete the listing when dropped, so early returns cannot leak them.
//!
//! ## Available Stores
//!
//! - [`InMemoryKeyspace`] - sorted in-memory keyspace
//! - [`InMemoryChangeLog`] - in-memory sharded log with bounded trim batches
//! - [`InMemoryLogSource`] - period id to log mapping
//!
//! ## Example
//!
//! ```rust
//! use sip_store::{InMemoryChangeLog, LogListing, TimeRange};
//!
//! let log = InMemoryChangeLog::new(4);
//! log.append(2, "user", "alice").unwrap();
//!
//! let mut listing = LogListing::open(&log, 2, TimeRange::unbounded(), "").unwrap();
//! let batch = listing.next_batch(10).unwrap();
//! assert_eq!(batch.records[0].name, "alice");
//! assert!(!batch.truncated);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changelog;
mod error;
mod keyspace;
mod memory;

pub use changelog::{
    ChangeLog, ChangeLogSource, LogBatch, LogInfo, LogListing, LogRecord, TimeRange, TrimOutcome,
};
pub use error::{StoreError, StoreResult};
pub use keyspace::{KeyBatch, KeyEnumerator, KeyInfo, KeyListing};
pub use memory::{
    InMemoryChangeLog, InMemoryKeyspace, InMemoryLogSource, KeyspaceHandle, LogHandle,
};
