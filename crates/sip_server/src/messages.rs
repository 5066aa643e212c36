//! Request and response messages of the protocol layer.
//!
//! Messages are plain serde types; the JSON form is externally tagged with
//! snake_case operation names:
//!
//! ```json
//! {"fetch": {"provider": "meta.inc", "shard": 3, "marker": "", "max": 100}}
//! ```

use crate::caps::Perm;
use crate::markers::ShardMarkers;
use serde::{Deserialize, Serialize};
use sip_provider::{ProviderInfo, SipPos, StageType};
use std::time::SystemTime;

/// Addresses one shard of a provider stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRequest {
    /// Provider name.
    pub provider: String,
    /// Stage id; the first stage when absent.
    #[serde(default)]
    pub stage: Option<String>,
    /// Shard id.
    pub shard: u32,
}

/// A protocol request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SipRequest {
    /// Lists provider names.
    ListProviders,

    /// Describes a provider, by name or by data and stage type.
    GetProviderInfo {
        /// Provider name.
        #[serde(default)]
        provider: Option<String>,
        /// Data type to look up when no name is given.
        #[serde(default)]
        data_type: Option<String>,
        /// Stage type to look up when no name is given.
        #[serde(default)]
        stage_type: Option<StageType>,
    },

    /// Start and current position of a shard.
    GetStageStatus(ShardRequest),

    /// Consumer markers recorded for a shard.
    GetMarkerInfo(ShardRequest),

    /// Records a consumer target's position.
    SetMarkerInfo {
        /// Shard addressed.
        #[serde(flatten)]
        shard: ShardRequest,
        /// Consumer target id.
        target_id: String,
        /// Position reached.
        marker: String,
        /// Time of the position; now when absent.
        #[serde(default)]
        mtime: Option<SystemTime>,
        /// Fail unless the target is already recorded.
        #[serde(default)]
        check_exists: bool,
    },

    /// Forgets a consumer target.
    RemoveMarkerInfo {
        /// Shard addressed.
        #[serde(flatten)]
        shard: ShardRequest,
        /// Consumer target id.
        target_id: String,
    },

    /// Reads entries after a marker.
    Fetch {
        /// Shard addressed.
        #[serde(flatten)]
        shard: ShardRequest,
        /// Resume position; empty starts at the beginning.
        #[serde(default)]
        marker: String,
        /// Entries wanted; the server default when absent.
        #[serde(default)]
        max: Option<u32>,
    },

    /// Trims a shard up to a marker.
    Trim {
        /// Shard addressed.
        #[serde(flatten)]
        shard: ShardRequest,
        /// Last position that may be discarded.
        marker: String,
    },
}

impl SipRequest {
    /// Operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SipRequest::ListProviders => "list_sip",
            SipRequest::GetProviderInfo { .. } => "get_sip_info",
            SipRequest::GetStageStatus(_) => "sip_get_stage_status",
            SipRequest::GetMarkerInfo(_) => "sip_get_marker_info",
            SipRequest::SetMarkerInfo { .. } => "sip_set_marker_info",
            SipRequest::RemoveMarkerInfo { .. } => "sip_remove_marker_info",
            SipRequest::Fetch { .. } => "sip_fetch",
            SipRequest::Trim { .. } => "sip_trim",
        }
    }

    /// Permission the caller needs on the protocol capability.
    pub fn required_perm(&self) -> Perm {
        match self {
            SipRequest::SetMarkerInfo { .. }
            | SipRequest::RemoveMarkerInfo { .. }
            | SipRequest::Trim { .. } => Perm::Write,
            _ => Perm::Read,
        }
    }
}

/// An entry as returned to protocol clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedEntry {
    /// Entry key; pass it back as the marker to resume.
    pub key: String,
    /// Payload decoded by the provider's type handler.
    pub info: serde_json::Value,
}

/// Result of a fetch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// More entries exist past the last one returned.
    pub more: bool,
    /// The stage will produce nothing further.
    pub done: bool,
    /// Entries in shard order.
    pub entries: Vec<FetchedEntry>,
}

impl FetchResponse {
    /// Marker to resume from, if any entry was returned.
    pub fn last_marker(&self) -> Option<&str> {
        self.entries.last().map(|e| e.key.as_str())
    }
}

/// A protocol response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SipResponse {
    /// Provider names, sorted.
    Providers(Vec<String>),
    /// Provider description.
    ProviderInfo(ProviderInfo),
    /// Shard positions.
    StageStatus {
        /// Earliest valid position.
        start: SipPos,
        /// Head position.
        current: SipPos,
        /// Whether the shard is disabled.
        disabled: bool,
    },
    /// Consumer markers of a shard.
    MarkerInfo(ShardMarkers),
    /// Fetched entries.
    Fetch(FetchResponse),
    /// The mutation was applied.
    Ack,
}
