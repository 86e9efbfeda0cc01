//! Error types for the internal RPC layer.
//!
//! Every failure a caller can observe maps onto a JSON-RPC error code via
//! [`RpcError::to_rpc_error_code`]; only the code and display message travel
//! on the wire.

use crate::protocol::{
    RpcErrorObject, APPLICATION_ERROR, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use std::time::Duration;
use thiserror::Error;

/// Main error type for the internal RPC layer.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The channel layer is unconfigured or rejected the operation. Raised
    /// synchronously from the send step of `request`/`push`; fatal to that
    /// call, not to the connection.
    #[error("channel layer error: {message}")]
    ChannelLayer { message: String },

    /// No reply arrived within the timeout window. Always recoverable; the
    /// caller may retry.
    #[error("service `{service}` did not respond within {timeout:?}")]
    RequestTimeout { service: String, timeout: Duration },

    /// Structured error delivered in a Reply Envelope by the remote side.
    #[error("remote error {}: {}", .0.code, .0.message)]
    Remote(RpcErrorObject),

    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    /// Declared application failure raised inside an invoked method,
    /// distinguished on the wire from unexpected internal errors.
    #[error("{message}")]
    Api { message: String },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// The receive loop is gone while a request was still waiting on it.
    #[error("connection closed while waiting for a reply")]
    ConnectionClosed,
}

impl RpcError {
    /// Declared application failure with a method-specific message.
    pub fn api(message: impl Into<String>) -> Self {
        RpcError::Api {
            message: message.into(),
        }
    }

    pub fn channel(message: impl Into<String>) -> Self {
        RpcError::ChannelLayer {
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        RpcError::InvalidParams {
            message: message.into(),
        }
    }

    /// Map this error to the JSON-RPC error code it is reported under.
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            RpcError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            RpcError::InvalidRequest { .. } => INVALID_REQUEST,
            RpcError::InvalidParams { .. } => INVALID_PARAMS,
            RpcError::Api { .. } => APPLICATION_ERROR,
            RpcError::Json { .. } => PARSE_ERROR,
            RpcError::Remote(err) => err.code,

            // All other errors are internal errors
            _ => INTERNAL_ERROR,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::RequestTimeout { .. })
    }
}

/// Result type alias using [`RpcError`].
pub type Result<T> = std::result::Result<T, RpcError>;
