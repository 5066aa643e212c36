//! Main protocol server.

use crate::caps::UserCaps;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::markers::{InMemoryMarkerStore, MarkerStore};
use crate::messages::{SipRequest, SipResponse};
use crate::registry::ProviderRegistry;
use sip_provider::{SiProvider, SiProviderRef};
use std::sync::Arc;

/// The SIP protocol server.
///
/// Holds the provider registry and the consumer marker store, and serves
/// protocol requests against them. Transport is left to the embedder: each
/// request arrives with the caller's capabilities already established.
///
/// # Example
///
/// ```
/// use sip_server::{SipRequest, SipResponse, SipServer, ServerConfig, UserCaps};
///
/// let server = SipServer::new(ServerConfig::default());
/// let caps = UserCaps::parse("sip=read").unwrap();
///
/// let resp = server.handle(&caps, SipRequest::ListProviders).unwrap();
/// assert_eq!(resp, SipResponse::Providers(vec![]));
/// ```
pub struct SipServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SipServer {
    /// Creates a server with an in-memory marker store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_marker_store(config, Arc::new(InMemoryMarkerStore::new()))
    }

    /// Creates a server backed by an existing marker store.
    pub fn with_marker_store(config: ServerConfig, markers: Arc<dyn MarkerStore>) -> Self {
        let registry = Arc::new(ProviderRegistry::new());
        let context = Arc::new(HandlerContext::new(config, registry, markers));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Initializes and registers a provider.
    pub fn register_provider(&self, provider: Box<dyn SiProvider>) -> ServerResult<SiProviderRef> {
        self.context.registry.register(provider)
    }

    /// Handles a request.
    pub fn handle(&self, caps: &UserCaps, request: SipRequest) -> ServerResult<SipResponse> {
        self.handler.handle(caps, request)
    }

    /// Handles a JSON-encoded request and returns the JSON-encoded response.
    pub fn handle_json(&self, caps: &UserCaps, request: &str) -> ServerResult<String> {
        let request: SipRequest = serde_json::from_str(request)
            .map_err(|e| ServerError::InvalidRequest(format!("malformed request: {e}")))?;
        let response = self.handle(caps, request)?;
        serde_json::to_string(&response).map_err(|e| ServerError::Internal(e.to_string()))
    }

    /// Names of registered providers.
    pub fn provider_names(&self) -> Vec<String> {
        self.context.registry.names()
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.context.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_provider::{build_meta_provider, MetaStores, ProviderConfig, StageType};
    use sip_store::{InMemoryChangeLog, InMemoryKeyspace, InMemoryLogSource};

    fn server() -> SipServer {
        let logs = InMemoryLogSource::new();
        let log = Arc::new(InMemoryChangeLog::new(1));
        log.append(0, "user", "alice").unwrap();
        logs.insert("p1", log);
        let stores = MetaStores {
            keyspace: Arc::new(InMemoryKeyspace::new()),
            logs: Arc::new(logs),
        };

        let server = SipServer::new(ServerConfig::default());
        server
            .register_provider(build_meta_provider(
                StageType::Incremental,
                &stores,
                ProviderConfig::new("p1").with_log_max_shards(1),
            ))
            .unwrap();
        server
    }

    #[test]
    fn server_creation() {
        let server = SipServer::new(ServerConfig::default());
        assert!(server.provider_names().is_empty());
        assert_eq!(server.config().capability, "sip");
    }

    #[test]
    fn json_round_trip() {
        let server = server();
        let caps = UserCaps::parse("sip=read").unwrap();

        let resp = server
            .handle_json(&caps, r#"{"fetch": {"provider": "meta.inc", "shard": 0}}"#)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&resp).unwrap();

        assert_eq!(value["fetch"]["entries"][0]["info"]["id"], "alice");
        assert_eq!(value["fetch"]["done"], false);
        assert_eq!(value["fetch"]["more"], false);
    }

    #[test]
    fn malformed_json_is_invalid_request() {
        let server = server();
        let caps = UserCaps::parse("sip=*").unwrap();

        let err = server.handle_json(&caps, r#"{"frobnicate": {}}"#).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
