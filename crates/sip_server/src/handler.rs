//! Request handlers for protocol operations.

use crate::caps::UserCaps;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::markers::{MarkerKey, MarkerStore, ShardMarkers, TargetMarker};
use crate::messages::{FetchResponse, FetchedEntry, ShardRequest, SipRequest, SipResponse};
use crate::registry::ProviderRegistry;
use sip_provider::{SiProviderRef, SipError, SipPos, StageInfo};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Registered providers.
    pub registry: Arc<ProviderRegistry>,
    /// Consumer marker records.
    pub markers: Arc<dyn MarkerStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        config: ServerConfig,
        registry: Arc<ProviderRegistry>,
        markers: Arc<dyn MarkerStore>,
    ) -> Self {
        Self {
            config,
            registry,
            markers,
        }
    }
}

/// Handler for protocol requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request on behalf of a caller.
    ///
    /// The caller's capabilities are checked before any provider or marker
    /// store is touched.
    pub fn handle(&self, caps: &UserCaps, request: SipRequest) -> ServerResult<SipResponse> {
        let op = request.name();
        caps.check_cap(&self.context.config.capability, request.required_perm())
            .inspect_err(|e| warn!(op, error = %e, "request rejected"))?;

        debug!(op, "handling request");
        let result = match request {
            SipRequest::ListProviders => Ok(SipResponse::Providers(self.context.registry.names())),
            SipRequest::GetProviderInfo {
                provider,
                data_type,
                stage_type,
            } => self.handle_info(provider, data_type, stage_type),
            SipRequest::GetStageStatus(req) => self.handle_stage_status(&req),
            SipRequest::GetMarkerInfo(req) => self.handle_get_markers(&req),
            SipRequest::SetMarkerInfo {
                shard,
                target_id,
                marker,
                mtime,
                check_exists,
            } => self.handle_set_marker(&shard, &target_id, marker, mtime, check_exists),
            SipRequest::RemoveMarkerInfo { shard, target_id } => {
                self.handle_remove_marker(&shard, &target_id)
            }
            SipRequest::Fetch { shard, marker, max } => self.handle_fetch(&shard, &marker, max),
            SipRequest::Trim { shard, marker } => self.handle_trim(&shard, &marker),
        };

        result.inspect_err(|e| {
            if e.is_server_error() {
                warn!(op, error = %e, "request failed");
            } else {
                debug!(op, error = %e, "request failed");
            }
        })
    }

    fn resolve(&self, provider: &str, stage: Option<&str>) -> ServerResult<(SiProviderRef, StageInfo)> {
        let provider = self.context.registry.get(provider)?;
        let stage = provider
            .info()
            .stage(stage)
            .cloned()
            .ok_or_else(|| ServerError::UnknownStage {
                provider: provider.name().to_string(),
                stage: stage.unwrap_or_default().to_string(),
            })?;
        Ok((provider, stage))
    }

    fn resolve_shard(&self, req: &ShardRequest) -> ServerResult<(SiProviderRef, StageInfo)> {
        let (provider, stage) = self.resolve(&req.provider, req.stage.as_deref())?;
        if req.shard >= stage.num_shards {
            return Err(SipError::OutOfRange {
                shard_id: req.shard,
                num_shards: stage.num_shards,
            }
            .into());
        }
        Ok((provider, stage))
    }

    fn marker_key(req: &ShardRequest, provider: &SiProviderRef, stage: &StageInfo) -> MarkerKey {
        MarkerKey::new(provider.name(), stage.id.clone(), req.shard)
    }

    fn handle_info(
        &self,
        provider: Option<String>,
        data_type: Option<String>,
        stage_type: Option<sip_provider::StageType>,
    ) -> ServerResult<SipResponse> {
        let provider = match (provider, data_type) {
            (Some(name), _) => self.context.registry.get(&name)?,
            (None, Some(data_type)) => self
                .context
                .registry
                .find(Some(&data_type), stage_type)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    ServerError::NotFound(match stage_type {
                        Some(t) => format!("no {t} provider for data type {data_type}"),
                        None => format!("no provider for data type {data_type}"),
                    })
                })?,
            (None, None) => {
                return Err(ServerError::InvalidRequest(
                    "provider name or data type required".to_string(),
                ))
            }
        };

        Ok(SipResponse::ProviderInfo(provider.info().clone()))
    }

    fn handle_stage_status(&self, req: &ShardRequest) -> ServerResult<SipResponse> {
        let (provider, stage) = self.resolve_shard(req)?;

        let start = provider.get_start_marker(req.shard)?;
        let state = provider.get_current_state(req.shard)?;

        Ok(SipResponse::StageStatus {
            start,
            current: SipPos {
                marker: state.marker,
                timestamp: state.timestamp,
            },
            disabled: stage.disabled || state.disabled,
        })
    }

    fn handle_get_markers(&self, req: &ShardRequest) -> ServerResult<SipResponse> {
        let (provider, stage) = self.resolve_shard(req)?;
        let key = Self::marker_key(req, &provider, &stage);

        let record = self.context.markers.get(&key)?.unwrap_or_else(ShardMarkers::default);
        Ok(SipResponse::MarkerInfo(record))
    }

    fn handle_set_marker(
        &self,
        req: &ShardRequest,
        target_id: &str,
        marker: String,
        mtime: Option<SystemTime>,
        check_exists: bool,
    ) -> ServerResult<SipResponse> {
        if target_id.is_empty() {
            return Err(ServerError::InvalidRequest("target_id required".to_string()));
        }
        let (provider, stage) = self.resolve_shard(req)?;
        let key = Self::marker_key(req, &provider, &stage);

        let target = TargetMarker {
            marker,
            mtime: mtime.unwrap_or_else(SystemTime::now),
        };
        self.context
            .markers
            .set_target(&key, target_id, target, check_exists)?;
        Ok(SipResponse::Ack)
    }

    fn handle_remove_marker(&self, req: &ShardRequest, target_id: &str) -> ServerResult<SipResponse> {
        let (provider, stage) = self.resolve_shard(req)?;
        let key = Self::marker_key(req, &provider, &stage);

        self.context.markers.remove_target(&key, target_id)?;
        Ok(SipResponse::Ack)
    }

    fn handle_fetch(&self, req: &ShardRequest, marker: &str, max: Option<u32>) -> ServerResult<SipResponse> {
        let (provider, _) = self.resolve(&req.provider, req.stage.as_deref())?;
        let max = self.context.config.fetch_limit(max);

        let result = provider.fetch(req.shard, marker, max)?;
        let handler = provider.type_handler();
        let entries = result
            .entries
            .into_iter()
            .map(|e| {
                Ok(FetchedEntry {
                    info: handler.decode_json(&e.data)?,
                    key: e.key,
                })
            })
            .collect::<ServerResult<Vec<_>>>()?;

        debug!(
            provider = %req.provider,
            shard = req.shard,
            count = entries.len(),
            more = result.more,
            done = result.done,
            "fetched entries"
        );
        Ok(SipResponse::Fetch(FetchResponse {
            more: result.more,
            done: result.done,
            entries,
        }))
    }

    fn handle_trim(&self, req: &ShardRequest, marker: &str) -> ServerResult<SipResponse> {
        let (provider, _) = self.resolve(&req.provider, req.stage.as_deref())?;
        provider.trim(req.shard, marker)?;
        Ok(SipResponse::Ack)
    }
}
