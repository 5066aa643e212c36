//! Read-only provider queries: list, info and status.

use super::print_json;
use sip_provider::StageType;
use sip_server::{ShardRequest, SipRequest, SipServer, UserCaps};

/// Runs the list command.
pub fn list(server: &SipServer, caps: &UserCaps) -> Result<(), Box<dyn std::error::Error>> {
    let resp = server.handle(caps, SipRequest::ListProviders)?;
    print_json(&resp)
}

/// Runs the info command.
pub fn info(
    server: &SipServer,
    caps: &UserCaps,
    provider: Option<String>,
    data_type: Option<String>,
    stage_type: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stage_type = stage_type.map(str::parse::<StageType>).transpose()?;
    let resp = server.handle(
        caps,
        SipRequest::GetProviderInfo {
            provider,
            data_type,
            stage_type,
        },
    )?;
    print_json(&resp)
}

/// Runs the status command.
pub fn status(
    server: &SipServer,
    caps: &UserCaps,
    shard: ShardRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let resp = server.handle(caps, SipRequest::GetStageStatus(shard))?;
    print_json(&resp)
}
