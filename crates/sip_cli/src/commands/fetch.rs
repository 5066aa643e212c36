//! Fetch command implementation.

use super::print_json;
use sip_server::{
    FetchResponse, ServerError, ServerResult, ShardRequest, SipRequest, SipResponse, SipServer,
    UserCaps,
};
use tracing::debug;

/// Fetches one page, or with `all` keeps paging until the shard reports
/// `done` or no `more` entries.
pub fn fetch_pages(
    server: &SipServer,
    caps: &UserCaps,
    shard: &ShardRequest,
    marker: &str,
    max: Option<u32>,
    all: bool,
) -> ServerResult<FetchResponse> {
    let mut marker = marker.to_string();
    let mut combined = FetchResponse {
        more: false,
        done: false,
        entries: Vec::new(),
    };

    loop {
        let resp = server.handle(
            caps,
            SipRequest::Fetch {
                shard: shard.clone(),
                marker: marker.clone(),
                max,
            },
        )?;
        let SipResponse::Fetch(page) = resp else {
            return Err(ServerError::Internal("unexpected response to fetch".into()));
        };

        debug!(entries = page.entries.len(), more = page.more, done = page.done, "fetched page");
        if let Some(last) = page.last_marker() {
            marker = last.to_string();
        }
        combined.more = page.more;
        combined.done = page.done;
        let empty = page.entries.is_empty();
        combined.entries.extend(page.entries);

        if !all || page.done || !page.more || empty {
            return Ok(combined);
        }
    }
}

/// Runs the fetch command.
pub fn run(
    server: &SipServer,
    caps: &UserCaps,
    shard: ShardRequest,
    marker: &str,
    max: Option<u32>,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let resp = fetch_pages(server, caps, &shard, marker, max, all)?;
    print_json(&resp)
}
