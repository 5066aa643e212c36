//! # SIP Server
//!
//! Request/response protocol layer over sync info providers.
//!
//! This crate provides:
//! - Provider discovery (list, describe by name or by data/stage type)
//! - Stage status (start and current position of a shard)
//! - Paged fetch, with payloads decoded by each provider's type handler
//! - Trim
//! - Consumer marker bookkeeping, per provider shard and target
//!
//! # Capabilities
//!
//! Every operation is gated on a named capability (`sip` by default).
//! Queries need read access; marker updates and trim need write access.
//! The check happens before any provider or store is touched.
//!
//! # Protocol
//!
//! Consumers page through a shard by passing back the key of the last
//! entry they received:
//! 1. `fetch` with an empty marker
//! 2. `fetch` again from the last returned key while `more` is set
//! 3. On an incremental stage, poll again later; on a full stage stop at `done`

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod caps;
mod config;
mod error;
mod handler;
mod markers;
mod messages;
mod registry;
mod server;

pub use caps::{Perm, UserCaps};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use markers::{InMemoryMarkerStore, MarkerKey, MarkerStore, ShardMarkers, TargetMarker};
pub use messages::{FetchResponse, FetchedEntry, ShardRequest, SipRequest, SipResponse};
pub use registry::ProviderRegistry;
pub use server::SipServer;
