//! Shared provider, stage and fetch types.

use crate::error::SipError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of a provider stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    /// One-shot replay of the whole dataset; terminates.
    Full,
    /// Unbounded tail of new changes.
    #[serde(rename = "inc")]
    Incremental,
}

impl StageType {
    /// Short name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Full => "full",
            StageType::Incremental => "inc",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageType {
    type Err = SipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(StageType::Full),
            "inc" | "incremental" => Ok(StageType::Incremental),
            other => Err(SipError::InvalidArgument(format!(
                "unknown stage type: {other:?}"
            ))),
        }
    }
}

/// Topology of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    /// Stage id, unique within its provider.
    pub id: String,
    /// Stage kind.
    pub stage_type: StageType,
    /// Number of shards; shard ids are `0..num_shards`.
    pub num_shards: u32,
    /// Whether the stage is disabled.
    pub disabled: bool,
}

/// Description of a provider and its stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name.
    pub name: String,
    /// Kind of data carried in entry payloads.
    pub data_type: String,
    /// Stages in replay order.
    pub stages: Vec<StageInfo>,
}

impl ProviderInfo {
    /// Describes a provider with a single stage named after the provider.
    pub fn single_stage(
        name: impl Into<String>,
        data_type: impl Into<String>,
        stage_type: StageType,
        num_shards: u32,
    ) -> Self {
        let name = name.into();
        Self {
            stages: vec![StageInfo {
                id: name.clone(),
                stage_type,
                num_shards,
                disabled: false,
            }],
            name,
            data_type: data_type.into(),
        }
    }

    /// Looks up a stage; `None` selects the first stage.
    pub fn stage(&self, stage_id: Option<&str>) -> Option<&StageInfo> {
        match stage_id {
            Some(id) => self.stages.iter().find(|s| s.id == id),
            None => self.stages.first(),
        }
    }

    /// Returns true if any stage has the given type.
    pub fn has_stage_type(&self, stage_type: StageType) -> bool {
        self.stages.iter().any(|s| s.stage_type == stage_type)
    }
}

/// A change record returned by `fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Position key of the entry; fetching from it resumes strictly after it.
    pub key: String,
    /// Serialized payload describing the change.
    pub data: Vec<u8>,
}

/// Outcome of one `fetch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Entries in shard order.
    pub entries: Vec<Entry>,
    /// The stage will never produce more data.
    pub done: bool,
    /// More entries exist past the last returned one.
    pub more: bool,
}

impl FetchResult {
    /// Marker to resume from, if any entry was returned.
    pub fn last_marker(&self) -> Option<&str> {
        self.entries.last().map(|e| e.key.as_str())
    }
}

/// A marker together with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipPos {
    /// Shard marker.
    pub marker: String,
    /// Time associated with the marker (epoch when unknown).
    pub timestamp: SystemTime,
}

impl Default for SipPos {
    fn default() -> Self {
        Self {
            marker: String::new(),
            timestamp: UNIX_EPOCH,
        }
    }
}

/// Current head of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageShardInfo {
    /// Head marker.
    pub marker: String,
    /// Time of the head marker.
    pub timestamp: SystemTime,
    /// Whether the shard is disabled.
    pub disabled: bool,
}

impl Default for StageShardInfo {
    fn default() -> Self {
        Self {
            marker: String::new(),
            timestamp: UNIX_EPOCH,
            disabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_type_names() {
        assert_eq!("full".parse::<StageType>().unwrap(), StageType::Full);
        assert_eq!("inc".parse::<StageType>().unwrap(), StageType::Incremental);
        assert_eq!(
            "incremental".parse::<StageType>().unwrap(),
            StageType::Incremental
        );
        assert!("partial".parse::<StageType>().is_err());
        assert_eq!(StageType::Incremental.to_string(), "inc");
    }

    #[test]
    fn stage_type_serde_matches_display() {
        let json = serde_json::to_string(&StageType::Incremental).unwrap();
        assert_eq!(json, "\"inc\"");
    }

    #[test]
    fn stage_lookup() {
        let info = ProviderInfo::single_stage("meta.inc", "meta", StageType::Incremental, 64);

        assert_eq!(info.stage(None).unwrap().id, "meta.inc");
        assert_eq!(info.stage(Some("meta.inc")).unwrap().num_shards, 64);
        assert!(info.stage(Some("other")).is_none());
        assert!(info.has_stage_type(StageType::Incremental));
        assert!(!info.has_stage_type(StageType::Full));
    }

    #[test]
    fn last_marker() {
        let mut result = FetchResult::default();
        assert_eq!(result.last_marker(), None);

        result.entries.push(Entry {
            key: "user/a".into(),
            data: vec![],
        });
        assert_eq!(result.last_marker(), Some("user/a"));
    }
}
