//! Provider construction by stage type.

use crate::config::ProviderConfig;
use crate::full::FullSyncProvider;
use crate::incremental::IncrementalSyncProvider;
use crate::provider::SiProvider;
use crate::types::StageType;
use sip_store::{ChangeLogSource, KeyEnumerator};
use std::sync::Arc;

/// Backing stores of the metadata providers.
pub struct MetaStores<E, S> {
    /// Keyspace replayed by the full stage.
    pub keyspace: Arc<E>,
    /// Change logs tailed by the incremental stage.
    pub logs: Arc<S>,
}

impl<E, S> Clone for MetaStores<E, S> {
    fn clone(&self) -> Self {
        Self {
            keyspace: Arc::clone(&self.keyspace),
            logs: Arc::clone(&self.logs),
        }
    }
}

/// Creates the uninitialized metadata provider for `stage_type`.
pub fn build_meta_provider<E, S>(
    stage_type: StageType,
    stores: &MetaStores<E, S>,
    config: ProviderConfig,
) -> Box<dyn SiProvider>
where
    E: KeyEnumerator + 'static,
    S: ChangeLogSource + 'static,
{
    match stage_type {
        StageType::Full => Box::new(FullSyncProvider::new(Arc::clone(&stores.keyspace), config)),
        StageType::Incremental => Box::new(IncrementalSyncProvider::new(
            Arc::clone(&stores.logs),
            config,
        )),
    }
}
