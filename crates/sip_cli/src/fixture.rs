//! JSON fixtures describing a metadata keyspace and change log.
//!
//! A fixture seeds in-memory stores so providers can be exercised without a
//! live backing store:
//!
//! ```json
//! {
//!   "period": "p1",
//!   "shards": 4,
//!   "sections": {"user": ["alice"], "bucket": ["photos"]},
//!   "log": [{"shard": 0, "section": "user", "name": "alice"}]
//! }
//! ```

use serde::Deserialize;
use sip_provider::{build_meta_provider, MetaStores, ProviderConfig, StageType};
use sip_server::{ServerConfig, ServerError, SipServer};
use sip_store::{InMemoryChangeLog, InMemoryKeyspace, InMemoryLogSource, StoreError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a fixture.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The fixture file could not be read.
    #[error("failed to read fixture {path}: {source}")]
    Io {
        /// Fixture path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The fixture is not valid JSON of the expected shape.
    #[error("malformed fixture: {0}")]
    Parse(#[from] serde_json::Error),

    /// The fixture content is inconsistent.
    #[error("invalid fixture: {0}")]
    Invalid(String),

    /// Seeding the stores failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Registering providers failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}

fn default_period() -> String {
    "default".to_string()
}

fn default_shards() -> u32 {
    ProviderConfig::default().log_max_shards
}

/// One change log record.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRecord {
    /// Shard the record lands in.
    pub shard: u32,
    /// Section of the changed object.
    pub section: String,
    /// Name of the changed object.
    pub name: String,
}

/// Seed data for the metadata providers.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    /// Log period the incremental provider binds to.
    #[serde(default = "default_period")]
    pub period: String,
    /// Number of log shards.
    #[serde(default = "default_shards")]
    pub shards: u32,
    /// Keyspace sections and their keys.
    #[serde(default)]
    pub sections: BTreeMap<String, Vec<String>>,
    /// Change log records, appended in order.
    #[serde(default)]
    pub log: Vec<FixtureRecord>,
}

impl Fixture {
    /// Parses a fixture from JSON text.
    pub fn parse(text: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(text)?;
        if fixture.shards == 0 {
            return Err(FixtureError::Invalid("shards must be positive".into()));
        }
        if let Some(r) = fixture.log.iter().find(|r| r.shard >= fixture.shards) {
            return Err(FixtureError::Invalid(format!(
                "log record {}/{} targets shard {} of {}",
                r.section, r.name, r.shard, fixture.shards
            )));
        }
        Ok(fixture)
    }

    /// Reads and parses a fixture file.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Builds in-memory stores holding the fixture data.
    pub fn stores(&self) -> Result<MetaStores<InMemoryKeyspace, InMemoryLogSource>, FixtureError> {
        let keyspace = InMemoryKeyspace::with_sections(
            self.sections
                .iter()
                .map(|(section, keys)| (section.as_str(), keys.iter().map(String::as_str))),
        );

        let log = InMemoryChangeLog::new(self.shards);
        for record in &self.log {
            log.append(record.shard, &record.section, &record.name)?;
        }
        let logs = InMemoryLogSource::new();
        logs.insert(self.period.clone(), Arc::new(log));

        debug!(
            sections = self.sections.len(),
            records = self.log.len(),
            "seeded fixture stores"
        );
        Ok(MetaStores {
            keyspace: Arc::new(keyspace),
            logs: Arc::new(logs),
        })
    }

    /// Builds a server with the full and incremental metadata providers
    /// registered over the fixture data.
    pub fn server(&self, config: ServerConfig) -> Result<SipServer, FixtureError> {
        let stores = self.stores()?;
        let provider_config = ProviderConfig::new(self.period.clone()).with_log_max_shards(self.shards);

        let server = SipServer::new(config);
        for stage_type in [StageType::Full, StageType::Incremental] {
            server.register_provider(build_meta_provider(
                stage_type,
                &stores,
                provider_config.clone(),
            ))?;
        }
        Ok(server)
    }
}
