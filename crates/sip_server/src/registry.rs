//! Registry of initialized providers.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use sip_provider::{SiProvider, SiProviderRef, StageType};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Providers known to the server, by name.
///
/// Providers are initialized on registration and are immutable afterwards.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<BTreeMap<String, SiProviderRef>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes `provider` and makes it available under its name.
    ///
    /// # Errors
    ///
    /// Fails if a provider with the same name exists or if `init` fails.
    pub fn register(&self, mut provider: Box<dyn SiProvider>) -> ServerResult<SiProviderRef> {
        let name = provider.name().to_string();
        if self.providers.read().contains_key(&name) {
            return Err(ServerError::InvalidRequest(format!(
                "provider {name} already registered"
            )));
        }

        provider.init()?;
        let provider: SiProviderRef = Arc::from(provider);

        let mut providers = self.providers.write();
        if providers.contains_key(&name) {
            return Err(ServerError::InvalidRequest(format!(
                "provider {name} already registered"
            )));
        }
        providers.insert(name.clone(), Arc::clone(&provider));

        let info = provider.info();
        info!(provider = %name, data_type = %info.data_type, stages = info.stages.len(), "registered sync provider");
        Ok(provider)
    }

    /// Returns the provider named `name`.
    pub fn get(&self, name: &str) -> ServerResult<SiProviderRef> {
        self.providers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::UnknownProvider(name.to_string()))
    }

    /// Names of all providers, sorted.
    pub fn names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    /// Providers matching an optional data type and stage type, by name.
    pub fn find(&self, data_type: Option<&str>, stage_type: Option<StageType>) -> Vec<SiProviderRef> {
        self.providers
            .read()
            .values()
            .filter(|p| {
                let info = p.info();
                data_type.map_or(true, |d| info.data_type == d)
                    && stage_type.map_or(true, |t| info.has_stage_type(t))
            })
            .cloned()
            .collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Returns true if no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_provider::{build_meta_provider, MetaStores, ProviderConfig};
    use sip_store::{InMemoryChangeLog, InMemoryKeyspace, InMemoryLogSource};

    fn stores() -> MetaStores<InMemoryKeyspace, InMemoryLogSource> {
        let logs = InMemoryLogSource::new();
        logs.insert("p1", Arc::new(InMemoryChangeLog::new(2)));
        MetaStores {
            keyspace: Arc::new(InMemoryKeyspace::new()),
            logs: Arc::new(logs),
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = ProviderRegistry::new();
        let stores = stores();
        let config = ProviderConfig::new("p1").with_log_max_shards(2);

        registry
            .register(build_meta_provider(StageType::Full, &stores, config.clone()))
            .unwrap();
        registry
            .register(build_meta_provider(StageType::Incremental, &stores, config))
            .unwrap();

        assert_eq!(registry.names(), vec!["meta.full", "meta.inc"]);
        assert_eq!(registry.get("meta.inc").unwrap().info().stages[0].num_shards, 2);
        assert!(matches!(
            registry.get("bucket.inc"),
            Err(ServerError::UnknownProvider(_))
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = ProviderRegistry::new();
        let stores = stores();

        registry
            .register(build_meta_provider(StageType::Full, &stores, ProviderConfig::default()))
            .unwrap();
        let again =
            registry.register(build_meta_provider(StageType::Full, &stores, ProviderConfig::default()));
        assert!(matches!(again, Err(ServerError::InvalidRequest(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_init_is_not_registered() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::new("unknown-period");

        let result = registry.register(build_meta_provider(StageType::Incremental, &stores(), config));
        assert!(matches!(result, Err(ServerError::Provider(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn find_by_type() {
        let registry = ProviderRegistry::new();
        let stores = stores();
        let config = ProviderConfig::new("p1").with_log_max_shards(2);
        registry
            .register(build_meta_provider(StageType::Full, &stores, config.clone()))
            .unwrap();
        registry
            .register(build_meta_provider(StageType::Incremental, &stores, config))
            .unwrap();

        let inc = registry.find(Some("meta"), Some(StageType::Incremental));
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].name(), "meta.inc");

        assert_eq!(registry.find(Some("meta"), None).len(), 2);
        assert!(registry.find(Some("data"), None).is_empty());
    }
}
