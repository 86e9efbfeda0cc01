//! Dispatch of inbound Call Envelopes.
//!
//! The dispatcher owns the frozen method registry and turns a raw payload
//! into `Some(reply)` or `None`. `None` means the call was a push: pushes
//! never produce a reply, even on error, so failures on a pushed call are
//! only observable in this service's logs.

use crate::protocol::{
    RpcRequest, RpcResponse, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
use crate::registry::{ApiContext, MethodRegistry};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Resolves inbound calls through a [`MethodRegistry`].
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    context: ApiContext,
}

impl Dispatcher {
    pub fn new(registry: MethodRegistry, service: &str) -> Self {
        let registry = Arc::new(registry);
        let context = ApiContext::new(Arc::from(service), registry.method_names());
        Self { registry, context }
    }

    /// Handle a raw Call Envelope payload.
    ///
    /// Returns the Reply Envelope to send back, or `None` when the call was a
    /// push. The error taxonomy follows JSON-RPC 2.0: unparseable payloads
    /// get a parse error with no correlated id, structurally invalid requests
    /// an invalid-request error tied to whatever id is present, and failures
    /// past that point are correlated normally.
    pub async fn handle(&self, payload: Value) -> Option<RpcResponse> {
        let Some(raw) = payload.as_object() else {
            debug!("inbound payload is not an object");
            return Some(RpcResponse::error(None, PARSE_ERROR, "Parse error"));
        };
        let id = raw.get("id").and_then(Value::as_u64);

        let request: RpcRequest = match serde_json::from_value(payload.clone()) {
            Ok(request) => request,
            Err(e) => {
                return Some(RpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid Request: {e}"),
                ));
            }
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(RpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Invalid Request: unsupported jsonrpc version `{}`", request.jsonrpc),
            ));
        }

        let Some(handler) = self.registry.lookup(&request.method) else {
            if request.is_push() {
                warn!(method = %request.method, "dropping push for unknown method");
                return None;
            }
            return Some(RpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("method not found: {}", request.method),
            ));
        };

        let params = request
            .params
            .unwrap_or_else(|| Value::Object(Default::default()));
        if !params.is_object() {
            // Params expand as keyword arguments, so they must be a mapping.
            if request.id.is_none() {
                warn!(method = %request.method, "dropping push with non-object params");
                return None;
            }
            return Some(RpcResponse::error(
                request.id,
                INVALID_PARAMS,
                "params must be an object",
            ));
        }

        match handler(self.context.clone(), params).await {
            Ok(result) => request.id.map(|id| RpcResponse::success(Some(id), result)),
            Err(e) => {
                if request.id.is_none() {
                    error!(method = %request.method, error = %e, "pushed call failed");
                    return None;
                }
                Some(RpcResponse::error(
                    request.id,
                    e.to_rpc_error_code(),
                    e.to_string(),
                ))
            }
        }
    }
}
