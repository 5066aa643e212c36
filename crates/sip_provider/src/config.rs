//! Provider configuration.

/// Configuration shared by the metadata providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Period whose change log the incremental provider tails.
    pub period_id: String,
    /// Number of shards of the metadata change log.
    pub log_max_shards: u32,
    /// Page size used when enumerating keyspace sections.
    pub section_list_batch: usize,
    /// Largest page requested from the change log in one call.
    pub log_page_size: usize,
}

impl ProviderConfig {
    /// Creates a configuration for the given period.
    pub fn new(period_id: impl Into<String>) -> Self {
        Self {
            period_id: period_id.into(),
            log_max_shards: 64,
            section_list_batch: 32,
            log_page_size: 1000,
        }
    }

    /// Sets the number of change log shards.
    pub fn with_log_max_shards(mut self, shards: u32) -> Self {
        self.log_max_shards = shards;
        self
    }

    /// Sets the section enumeration page size.
    pub fn with_section_list_batch(mut self, batch: usize) -> Self {
        self.section_list_batch = batch.max(1);
        self
    }

    /// Sets the change log page size.
    pub fn with_log_page_size(mut self, size: usize) -> Self {
        self.log_page_size = size.max(1);
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ProviderConfig::default();
        assert_eq!(config.log_max_shards, 64);
        assert_eq!(config.section_list_batch, 32);
        assert!(config.period_id.is_empty());
    }

    #[test]
    fn config_builder() {
        let config = ProviderConfig::new("period-7")
            .with_log_max_shards(8)
            .with_section_list_batch(0)
            .with_log_page_size(50);

        assert_eq!(config.period_id, "period-7");
        assert_eq!(config.log_max_shards, 8);
        assert_eq!(config.section_list_batch, 1);
        assert_eq!(config.log_page_size, 50);
    }
}
