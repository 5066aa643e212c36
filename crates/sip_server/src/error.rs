//! Error types for the protocol layer.

use sip_provider::SipError;
use sip_store::StoreError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors returned by protocol operations.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller lacks the required capability.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No provider with this name is registered.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The provider has no stage with this id.
    #[error("unknown stage {stage:?} for provider {provider}")]
    UnknownStage {
        /// Provider name.
        provider: String,
        /// Requested stage id.
        stage: String,
    },

    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Error raised by a provider operation.
    #[error("provider error: {0}")]
    Provider(#[from] SipError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP-style status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::NotAuthorized(_) => 403,
            ServerError::UnknownProvider(_)
            | ServerError::UnknownStage { .. }
            | ServerError::NotFound(_) => 404,
            ServerError::Provider(err) if err.is_not_found() => 404,
            ServerError::Provider(err) if err.is_client_error() => 400,
            ServerError::Provider(SipError::Store(StoreError::Unavailable(_))) => 503,
            ServerError::Provider(_) | ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
