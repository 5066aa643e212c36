//! Full keyspace replay provider.

use crate::config::ProviderConfig;
use crate::error::{SipError, SipResult};
use crate::meta_info::{MetaInfo, MetaTypeHandler, META_DATA_TYPE};
use crate::provider::{check_shard, SiProvider, TypeHandler};
use crate::types::{Entry, FetchResult, ProviderInfo, SipPos, StageShardInfo, StageType};
use sip_store::{KeyEnumerator, KeyInfo, KeyListing};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Sections replayed ahead of all others, in this order.
///
/// Consumers resolve cross-section references while applying, so users
/// must land before bucket instances, and bucket instances before the
/// buckets that point at them. Remaining sections follow in discovery order.
pub const PRIORITY_SECTIONS: [&str; 3] = ["user", "bucket.instance", "bucket"];

/// Name of the full metadata provider.
pub const FULL_PROVIDER_NAME: &str = "meta.full";

const MARKER_SEPARATOR: char = '/';

/// Builds a full-sync marker from a section and a key marker.
pub fn encode_marker(section: &str, key_marker: &str) -> String {
    format!("{section}{MARKER_SEPARATOR}{key_marker}")
}

/// Splits a full-sync marker into section and key marker at the first `/`.
///
/// # Errors
///
/// Returns [`SipError::InvalidArgument`] if the separator is missing.
pub fn decode_marker(marker: &str) -> SipResult<(&str, &str)> {
    marker
        .split_once(MARKER_SEPARATOR)
        .ok_or_else(|| SipError::InvalidArgument(format!("malformed marker: {marker:?}")))
}

/// Orders sections for replay: [`PRIORITY_SECTIONS`] first, then the rest
/// in the order they were discovered.
pub fn arrange_sections(discovered: Vec<String>) -> Vec<String> {
    let mut rest = discovered;
    let mut ordered = Vec::with_capacity(rest.len());

    for name in PRIORITY_SECTIONS {
        if let Some(pos) = rest.iter().position(|s| s == name) {
            ordered.push(rest.remove(pos));
        }
    }

    ordered.extend(rest);
    ordered
}

/// Replays a whole metadata keyspace as a single one-shot shard.
///
/// Markers have the form `<section>/<key-marker>`. Sections are walked in
/// the order fixed by `init`; when one runs out, `fetch` moves on to its
/// successor without the caller knowing the section list.
pub struct FullSyncProvider<E: KeyEnumerator> {
    info: ProviderInfo,
    config: ProviderConfig,
    enumerator: Arc<E>,
    handler: MetaTypeHandler,
    sections: Vec<String>,
    /// Successor of each section; the empty name maps to the first section.
    next_section: HashMap<String, String>,
    initialized: bool,
}

impl<E: KeyEnumerator> FullSyncProvider<E> {
    /// Creates an uninitialized provider over `enumerator`.
    pub fn new(enumerator: Arc<E>, config: ProviderConfig) -> Self {
        Self {
            info: ProviderInfo::single_stage(
                FULL_PROVIDER_NAME,
                META_DATA_TYPE,
                StageType::Full,
                1,
            ),
            config,
            enumerator,
            handler: MetaTypeHandler,
            sections: Vec::new(),
            next_section: HashMap::new(),
            initialized: false,
        }
    }

    /// Sections in replay order. Empty before `init`.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    fn list_sections(&self) -> SipResult<Vec<String>> {
        let listing = KeyListing::open(self.enumerator.as_ref(), "", "")?;
        let names = listing.collect_all(self.config.section_list_batch)?;
        Ok(names.into_iter().map(|k| k.key).collect())
    }

    fn next_section(&self, section: &str) -> Option<&str> {
        self.next_section.get(section).map(String::as_str)
    }

    fn ensure_initialized(&self) -> SipResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SipError::NotInitialized)
        }
    }

    fn create_entry(&self, section: &str, key: KeyInfo) -> SipResult<Entry> {
        Ok(Entry {
            key: encode_marker(section, &key.marker),
            data: MetaInfo::new(section, key.key).encode()?,
        })
    }

    /// Reads `section` after `key_marker` into `result` until the section
    /// runs out or `remaining` hits zero. Returns true if the section ran out.
    fn fetch_section(
        &self,
        section: &str,
        key_marker: &str,
        remaining: &mut usize,
        result: &mut FetchResult,
    ) -> SipResult<bool> {
        let mut listing = KeyListing::open(self.enumerator.as_ref(), section, key_marker)
            .inspect_err(|e| error!(section, error = %e, "failed to start key listing"))?;

        loop {
            let page = listing
                .next_batch(*remaining)
                .inspect_err(|e| error!(section, error = %e, "failed to list keys"))?;

            let stalled = page.keys.is_empty();
            *remaining = remaining.saturating_sub(page.keys.len());
            for key in page.keys {
                result.entries.push(self.create_entry(section, key)?);
            }

            if !page.truncated {
                return Ok(true);
            }
            if *remaining == 0 || stalled {
                return Ok(false);
            }
        }
    }
}

impl<E: KeyEnumerator> SiProvider for FullSyncProvider<E> {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn type_handler(&self) -> &dyn TypeHandler {
        &self.handler
    }

    fn init(&mut self) -> SipResult<()> {
        let discovered = self
            .list_sections()
            .inspect_err(|e| error!(error = %e, "failed to enumerate keyspace sections"))?;

        self.sections = arrange_sections(discovered);
        self.next_section.clear();

        let mut prev = String::new();
        for section in &self.sections {
            self.next_section.insert(prev, section.clone());
            prev = section.clone();
        }

        self.initialized = true;
        debug!(sections = ?self.sections, "full sync sections arranged");
        Ok(())
    }

    fn fetch(&self, shard_id: u32, marker: &str, max: usize) -> SipResult<FetchResult> {
        check_shard(shard_id, 1)?;
        self.ensure_initialized()?;

        let mut result = FetchResult::default();
        if max == 0 {
            return Ok(result);
        }

        let (mut section, mut key_marker) = if marker.is_empty() {
            match self.next_section("") {
                Some(first) => (first.to_string(), String::new()),
                None => {
                    // An empty keyspace is replayed as soon as it starts.
                    result.done = true;
                    return Ok(result);
                }
            }
        } else {
            let (section, key_marker) = decode_marker(marker)?;
            if !self.sections.iter().any(|s| s == section) {
                return Err(SipError::InvalidArgument(format!(
                    "marker refers to unknown section: {section:?}"
                )));
            }
            (section.to_string(), key_marker.to_string())
        };

        let mut remaining = max;
        loop {
            let exhausted = self.fetch_section(&section, &key_marker, &mut remaining, &mut result)?;
            if !exhausted {
                result.more = true;
                return Ok(result);
            }

            let Some(next) = self.next_section(&section) else {
                debug!(section = %section, entries = result.entries.len(), "full sync complete");
                result.done = true;
                return Ok(result);
            };

            debug!(from = %section, to = next, "advancing to next section");
            section = next.to_string();
            key_marker.clear();

            if remaining == 0 {
                result.more = true;
                return Ok(result);
            }
        }
    }

    fn get_start_marker(&self, shard_id: u32) -> SipResult<SipPos> {
        check_shard(shard_id, 1)?;
        self.ensure_initialized()?;
        Ok(SipPos::default())
    }

    fn get_current_state(&self, shard_id: u32) -> SipResult<StageShardInfo> {
        check_shard(shard_id, 1)?;
        self.ensure_initialized()?;
        Ok(StageShardInfo::default())
    }

    fn trim(&self, shard_id: u32, marker: &str) -> SipResult<()> {
        check_shard(shard_id, 1)?;
        self.ensure_initialized()?;
        // The keyspace is live state, not history: nothing to drop.
        debug!(marker, "ignoring trim on full sync stage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_store::{InMemoryKeyspace, KeyBatch, StoreError, StoreResult};

    fn keys(result: &FetchResult) -> Vec<&str> {
        result.entries.iter().map(|e| e.key.as_str()).collect()
    }

    fn provider(keyspace: InMemoryKeyspace) -> FullSyncProvider<InMemoryKeyspace> {
        let mut provider = FullSyncProvider::new(Arc::new(keyspace), ProviderConfig::default());
        provider.init().unwrap();
        provider
    }

    #[test]
    fn arrange_puts_priority_sections_first() {
        let discovered = vec!["bucket", "user", "bucket.instance", "zzz"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            arrange_sections(discovered),
            vec!["user", "bucket.instance", "bucket", "zzz"]
        );
    }

    #[test]
    fn arrange_keeps_discovery_order_of_the_rest() {
        let discovered = vec!["roles", "otp", "bucket", "group"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            arrange_sections(discovered),
            vec!["bucket", "roles", "otp", "group"]
        );
    }

    #[test]
    fn marker_round_trip() {
        let marker = encode_marker("bucket.instance", "photos:abc/def");
        assert_eq!(marker, "bucket.instance/photos:abc/def");
        assert_eq!(
            decode_marker(&marker).unwrap(),
            ("bucket.instance", "photos:abc/def")
        );
    }

    #[test]
    fn marker_without_separator_is_invalid() {
        assert!(matches!(
            decode_marker("user"),
            Err(SipError::InvalidArgument(_))
        ));
    }

    #[test]
    fn init_orders_sections() {
        let keyspace = InMemoryKeyspace::new();
        for section in ["bucket", "user", "bucket.instance", "zzz"] {
            keyspace.add_section(section);
        }

        let provider = provider(keyspace);
        assert_eq!(
            provider.sections(),
            &["user", "bucket.instance", "bucket", "zzz"]
        );
    }

    #[test]
    fn init_pages_through_sections() {
        let keyspace = InMemoryKeyspace::new();
        for i in 0..10 {
            keyspace.add_section(&format!("s{i}"));
        }

        let mut provider = FullSyncProvider::new(
            Arc::new(keyspace),
            ProviderConfig::default().with_section_list_batch(3),
        );
        provider.init().unwrap();
        assert_eq!(provider.sections().len(), 10);
    }

    #[test]
    fn fetch_walks_sections_in_order() {
        let provider = provider(InMemoryKeyspace::with_sections([
            ("bucket.instance", vec!["a", "b"]),
            ("user", vec!["a", "b"]),
        ]));

        let first = provider.fetch(0, "", 1).unwrap();
        assert_eq!(keys(&first), vec!["user/a"]);
        assert!(!first.done);
        assert!(first.more);

        let rest = provider.fetch(0, "user/a", 10).unwrap();
        assert_eq!(
            keys(&rest),
            vec!["user/b", "bucket.instance/a", "bucket.instance/b"]
        );
        assert!(rest.done);
        assert!(!rest.more);
    }

    #[test]
    fn entry_payload_names_section_and_key() {
        let provider = provider(InMemoryKeyspace::with_sections([("user", vec!["alice"])]));
        let result = provider.fetch(0, "", 10).unwrap();

        let info = MetaInfo::decode(&result.entries[0].data).unwrap();
        assert_eq!(info, MetaInfo::new("user", "alice"));
    }

    #[test]
    fn budget_exhausted_at_section_boundary() {
        let provider = provider(InMemoryKeyspace::with_sections([
            ("user", vec!["a"]),
            ("bucket", vec!["x"]),
        ]));

        let result = provider.fetch(0, "", 1).unwrap();
        assert_eq!(keys(&result), vec!["user/a"]);
        assert!(result.more);
        assert!(!result.done);

        let result = provider.fetch(0, "user/a", 1).unwrap();
        assert_eq!(keys(&result), vec!["bucket/x"]);
        assert!(result.done);
    }

    #[test]
    fn empty_sections_are_skipped() {
        let keyspace = InMemoryKeyspace::with_sections([("user", vec!["a"]), ("zzz", vec!["z"])]);
        keyspace.add_section("bucket");
        keyspace.add_section("bucket.instance");
        let provider = provider(keyspace);

        let result = provider.fetch(0, "user/a", 5).unwrap();
        assert_eq!(keys(&result), vec!["zzz/z"]);
        assert!(result.done);
    }

    #[test]
    fn terminal_marker_stays_done() {
        let provider = provider(InMemoryKeyspace::with_sections([("user", vec!["a"])]));

        let result = provider.fetch(0, "", 10).unwrap();
        assert!(result.done);
        let terminal = result.last_marker().unwrap().to_string();

        for _ in 0..3 {
            let again = provider.fetch(0, &terminal, 10).unwrap();
            assert!(again.entries.is_empty());
            assert!(again.done);
            assert!(!again.more);
        }
    }

    #[test]
    fn empty_keyspace_is_done_immediately() {
        let provider = provider(InMemoryKeyspace::new());
        let result = provider.fetch(0, "", 10).unwrap();
        assert!(result.entries.is_empty());
        assert!(result.done);
    }

    #[test]
    fn zero_budget_returns_nothing() {
        let provider = provider(InMemoryKeyspace::with_sections([("user", vec!["a"])]));
        let result = provider.fetch(0, "", 0).unwrap();
        assert!(result.entries.is_empty());
        assert!(!result.done);
    }

    #[test]
    fn only_shard_zero_exists() {
        let provider = provider(InMemoryKeyspace::with_sections([("user", vec!["a"])]));

        assert!(matches!(
            provider.fetch(1, "", 10),
            Err(SipError::OutOfRange { shard_id: 1, .. })
        ));
        assert!(matches!(
            provider.get_current_state(1),
            Err(SipError::OutOfRange { .. })
        ));
        assert!(matches!(
            provider.trim(2, "user/a"),
            Err(SipError::OutOfRange { .. })
        ));
    }

    #[test]
    fn malformed_and_unknown_markers() {
        let provider = provider(InMemoryKeyspace::with_sections([("user", vec!["a"])]));

        assert!(matches!(
            provider.fetch(0, "user", 10),
            Err(SipError::InvalidArgument(_))
        ));
        assert!(matches!(
            provider.fetch(0, "roles/a", 10),
            Err(SipError::InvalidArgument(_))
        ));
    }

    #[test]
    fn fetch_before_init() {
        let provider =
            FullSyncProvider::new(Arc::new(InMemoryKeyspace::new()), ProviderConfig::default());
        assert!(matches!(
            provider.fetch(0, "", 10),
            Err(SipError::NotInitialized)
        ));
    }

    #[test]
    fn listing_failure_releases_handle() {
        let keyspace = Arc::new(InMemoryKeyspace::with_sections([("user", vec!["a"])]));
        let mut provider = FullSyncProvider::new(Arc::clone(&keyspace), ProviderConfig::default());
        provider.init().unwrap();

        keyspace.set_failing(true);
        let result = provider.fetch(0, "", 10);
        assert!(matches!(
            result,
            Err(SipError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(keyspace.open_handles(), 0);
    }

    #[test]
    fn trim_is_a_no_op() {
        let keyspace = Arc::new(InMemoryKeyspace::with_sections([("user", vec!["a"])]));
        let mut provider = FullSyncProvider::new(Arc::clone(&keyspace), ProviderConfig::default());
        provider.init().unwrap();

        provider.trim(0, "user/a").unwrap();
        assert_eq!(provider.fetch(0, "", 10).unwrap().entries.len(), 1);
    }

    #[test]
    fn start_and_current_positions_are_empty() {
        let provider = provider(InMemoryKeyspace::with_sections([("user", vec!["a"])]));

        assert_eq!(provider.get_start_marker(0).unwrap(), SipPos::default());
        let state = provider.get_current_state(0).unwrap();
        assert!(state.marker.is_empty());
        assert!(!state.disabled);
    }

    /// Keyspace with one section whose listing never yields keys but
    /// always claims more.
    struct StallingKeyspace;

    impl KeyEnumerator for StallingKeyspace {
        type Handle = bool;

        fn list_init(&self, section: &str, _marker: &str) -> StoreResult<bool> {
            Ok(section.is_empty())
        }

        fn list_next(&self, listing_sections: &mut bool, _max: usize) -> StoreResult<KeyBatch> {
            if *listing_sections {
                return Ok(KeyBatch {
                    keys: vec![KeyInfo::new("user")],
                    truncated: false,
                });
            }
            Ok(KeyBatch {
                keys: Vec::new(),
                truncated: true,
            })
        }

        fn list_complete(&self, _handle: bool) {}
    }

    #[test]
    fn empty_truncated_page_returns_more() {
        let mut provider =
            FullSyncProvider::new(Arc::new(StallingKeyspace), ProviderConfig::default());
        provider.init().unwrap();

        let result = provider.fetch(0, "", 5).unwrap();
        assert!(result.entries.is_empty());
        assert!(result.more);
        assert!(!result.done);
    }

    #[test]
    fn keys_removed_mid_replay_are_skipped() {
        let keyspace = Arc::new(InMemoryKeyspace::with_sections([
            ("user", vec!["a", "b"]),
            ("bucket", vec!["x", "y"]),
        ]));
        let mut provider = FullSyncProvider::new(Arc::clone(&keyspace), ProviderConfig::default());
        provider.init().unwrap();

        let first = provider.fetch(0, "", 1).unwrap();
        assert_eq!(keys(&first), vec!["user/a"]);

        assert!(keyspace.remove("bucket", "x"));
        assert!(!keyspace.remove("bucket", "x"));

        let rest = provider.fetch(0, first.last_marker().unwrap(), 10).unwrap();
        assert_eq!(keys(&rest), vec!["user/b", "bucket/y"]);
        assert!(rest.done);
    }
}
