//! Trim command implementation.

use super::print_json;
use sip_server::{ShardRequest, SipRequest, SipServer, UserCaps};
use tracing::info;

/// Runs the trim command, then reports the shard's status.
pub fn run(
    server: &SipServer,
    caps: &UserCaps,
    shard: ShardRequest,
    marker: String,
) -> Result<(), Box<dyn std::error::Error>> {
    server.handle(
        caps,
        SipRequest::Trim {
            shard: shard.clone(),
            marker: marker.clone(),
        },
    )?;
    info!(provider = %shard.provider, shard = shard.shard, marker = %marker, "trimmed shard");

    let status = server.handle(caps, SipRequest::GetStageStatus(shard))?;
    print_json(&status)
}
