//! # SIP Provider
//!
//! Sync Information Provider contract and the metadata providers.
//!
//! This crate provides:
//! - [`SiProvider`] - fetch / start marker / current state / trim over
//!   sharded, marker-ordered change streams
//! - [`FullSyncProvider`] - one-shot replay of a whole metadata keyspace,
//!   section by section in dependency order
//! - [`IncrementalSyncProvider`] - unbounded tail of a sharded change log
//! - [`MetaInfo`] - CBOR payload of metadata entries
//!
//! # Markers
//!
//! Markers are opaque to consumers and only valid within the shard that
//! produced them. The full provider encodes `<section>/<key-marker>`; the
//! incremental provider hands out the log's own entry ids.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sip_provider::{FullSyncProvider, ProviderConfig, SiProvider};
//! use sip_store::InMemoryKeyspace;
//!
//! let keyspace = InMemoryKeyspace::with_sections([
//!     ("bucket", vec!["photos"]),
//!     ("user", vec!["alice"]),
//! ]);
//! let mut provider = FullSyncProvider::new(Arc::new(keyspace), ProviderConfig::default());
//! provider.init().unwrap();
//!
//! let result = provider.fetch(0, "", 10).unwrap();
//! assert_eq!(result.entries[0].key, "user/alice");
//! assert_eq!(result.entries[1].key, "bucket/photos");
//! assert!(result.done);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod factory;
mod full;
mod incremental;
mod meta_info;
mod provider;
mod types;

pub use config::ProviderConfig;
pub use error::{SipError, SipResult};
pub use factory::{build_meta_provider, MetaStores};
pub use full::{
    arrange_sections, decode_marker, encode_marker, FullSyncProvider, FULL_PROVIDER_NAME,
    PRIORITY_SECTIONS,
};
pub use incremental::{IncrementalSyncProvider, INC_PROVIDER_NAME};
pub use meta_info::{MetaInfo, MetaTypeHandler, META_DATA_TYPE};
pub use provider::{SiProvider, SiProviderRef, TypeHandler};
pub use types::{Entry, FetchResult, ProviderInfo, SipPos, StageInfo, StageShardInfo, StageType};
