//! Payload carried by metadata sync entries.

use crate::error::{SipError, SipResult};
use crate::provider::TypeHandler;
use serde::{Deserialize, Serialize};

/// Data type name of metadata providers.
pub const META_DATA_TYPE: &str = "meta";

/// Identifies the metadata key an entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// Keyspace section.
    pub section: String,
    /// Key within the section.
    pub id: String,
}

impl MetaInfo {
    /// Creates a payload for `section`/`id`.
    pub fn new(section: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            id: id.into(),
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> SipResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| SipError::Codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> SipResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| SipError::Codec(e.to_string()))
    }
}

/// Type handler for [`MetaInfo`] payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaTypeHandler;

impl TypeHandler for MetaTypeHandler {
    fn data_type(&self) -> &str {
        META_DATA_TYPE
    }

    fn decode_json(&self, data: &[u8]) -> SipResult<serde_json::Value> {
        let info = MetaInfo::decode(data)?;
        serde_json::to_value(info).map_err(|e| SipError::Codec(e.to_string()))
    }
}
