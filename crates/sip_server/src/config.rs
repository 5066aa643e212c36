//! Server configuration.

/// Configuration for the protocol layer.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Capability name guarding every operation.
    pub capability: String,
    /// Entries returned by a fetch that does not say how many it wants.
    pub default_fetch: u32,
    /// Upper bound on entries per fetch.
    pub max_fetch: u32,
}

impl ServerConfig {
    /// Default and maximum fetch size.
    pub const FETCH_LIMIT: u32 = 1000;

    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            capability: "sip".to_string(),
            default_fetch: Self::FETCH_LIMIT,
            max_fetch: Self::FETCH_LIMIT,
        }
    }

    /// Sets the capability name.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    /// Sets the default fetch size.
    pub fn with_default_fetch(mut self, size: u32) -> Self {
        self.default_fetch = size;
        self
    }

    /// Sets the maximum fetch size.
    pub fn with_max_fetch(mut self, size: u32) -> Self {
        self.max_fetch = size;
        self
    }

    /// Resolves the number of entries a fetch may return.
    pub fn fetch_limit(&self, requested: Option<u32>) -> usize {
        requested.unwrap_or(self.default_fetch).min(self.max_fetch) as usize
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.capability, "sip");
        assert_eq!(config.fetch_limit(None), 1000);
    }

    #[test]
    fn fetch_limit_is_capped() {
        let config = ServerConfig::new().with_max_fetch(50).with_default_fetch(20);

        assert_eq!(config.fetch_limit(None), 20);
        assert_eq!(config.fetch_limit(Some(10)), 10);
        assert_eq!(config.fetch_limit(Some(5000)), 50);
        assert_eq!(config.fetch_limit(Some(0)), 0);
    }
}
