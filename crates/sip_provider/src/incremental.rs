//! Incremental change log provider.

use crate::config::ProviderConfig;
use crate::error::{SipError, SipResult};
use crate::meta_info::{MetaInfo, MetaTypeHandler, META_DATA_TYPE};
use crate::provider::{check_shard, SiProvider, TypeHandler};
use crate::types::{Entry, FetchResult, ProviderInfo, SipPos, StageShardInfo, StageType};
use sip_store::{ChangeLog, ChangeLogSource, LogListing, StoreError, TimeRange, TrimOutcome};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Name of the incremental metadata provider.
pub const INC_PROVIDER_NAME: &str = "meta.inc";

/// Tails the sharded metadata change log of one period.
///
/// Markers are the log's native entry ids. The stream never ends, so
/// `done` is always false; `more` reports whether the log had entries past
/// the returned batch when it was read.
pub struct IncrementalSyncProvider<S: ChangeLogSource> {
    info: ProviderInfo,
    config: ProviderConfig,
    source: Arc<S>,
    handler: MetaTypeHandler,
    log: Option<Arc<S::Log>>,
}

impl<S: ChangeLogSource> IncrementalSyncProvider<S> {
    /// Creates an uninitialized provider; `init` resolves the period's log.
    pub fn new(source: Arc<S>, config: ProviderConfig) -> Self {
        Self {
            info: ProviderInfo::single_stage(
                INC_PROVIDER_NAME,
                META_DATA_TYPE,
                StageType::Incremental,
                config.log_max_shards,
            ),
            config,
            source,
            handler: MetaTypeHandler,
            log: None,
        }
    }

    /// Number of shards.
    pub fn num_shards(&self) -> u32 {
        self.config.log_max_shards
    }

    fn log(&self) -> SipResult<&S::Log> {
        self.log.as_deref().ok_or(SipError::NotInitialized)
    }
}

impl<S: ChangeLogSource> SiProvider for IncrementalSyncProvider<S> {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn type_handler(&self) -> &dyn TypeHandler {
        &self.handler
    }

    fn init(&mut self) -> SipResult<()> {
        let log = self.source.get_log(&self.config.period_id).inspect_err(|e| {
            error!(period = %self.config.period_id, error = %e, "failed to resolve change log")
        })?;
        self.log = Some(log);
        Ok(())
    }

    fn fetch(&self, shard_id: u32, marker: &str, max: usize) -> SipResult<FetchResult> {
        check_shard(shard_id, self.num_shards())?;
        let log = self.log()?;

        // Never terminal: an incremental shard can always grow.
        let mut result = FetchResult::default();
        if max == 0 {
            return Ok(result);
        }

        let mut listing = LogListing::open(log, shard_id, TimeRange::unbounded(), marker)
            .map_err(|e| match e {
                StoreError::InvalidMarker(m) => {
                    SipError::InvalidArgument(format!("malformed log marker: {m:?}"))
                }
                other => other.into(),
            })?;
        let page_size = self.config.log_page_size.max(1);
        let mut remaining = max;

        loop {
            let page = listing
                .next_batch(remaining.min(page_size))
                .inspect_err(|e| {
                    if e.is_transient() {
                        warn!(shard_id, error = %e, "change log temporarily unavailable");
                    } else {
                        error!(shard_id, error = %e, "failed to list change log");
                    }
                })?;

            if page.records.is_empty() {
                result.more = page.truncated;
                break;
            }
            remaining = remaining.saturating_sub(page.records.len());
            for record in page.records {
                let data = MetaInfo::new(record.section, record.name).encode()?;
                result.entries.push(Entry {
                    key: record.id,
                    data,
                });
            }

            result.more = page.truncated;
            if !page.truncated || remaining == 0 {
                break;
            }
        }

        debug!(
            shard_id,
            entries = result.entries.len(),
            more = result.more,
            "fetched change log entries"
        );
        Ok(result)
    }

    fn get_start_marker(&self, shard_id: u32) -> SipResult<SipPos> {
        check_shard(shard_id, self.num_shards())?;
        self.log()?;
        Ok(SipPos::default())
    }

    fn get_current_state(&self, shard_id: u32) -> SipResult<StageShardInfo> {
        check_shard(shard_id, self.num_shards())?;
        let info = self.log()?.get_info(shard_id).inspect_err(|e| {
            warn!(shard_id, error = %e, "failed to read change log info")
        })?;

        Ok(StageShardInfo {
            marker: info.marker,
            timestamp: info.last_update,
            disabled: false,
        })
    }

    fn trim(&self, shard_id: u32, marker: &str) -> SipResult<()> {
        check_shard(shard_id, self.num_shards())?;
        let log = self.log()?;

        let mut passes = 0usize;
        loop {
            match log.trim(shard_id, TimeRange::unbounded(), "", marker) {
                Ok(TrimOutcome::Progress) => passes += 1,
                Ok(TrimOutcome::NoData) => break,
                Err(e) => {
                    error!(shard_id, marker, error = %e, "change log trim failed");
                    return Err(e.into());
                }
            }
        }

        debug!(shard_id, marker, passes, "trimmed change log shard");
        Ok(())
    }
}
