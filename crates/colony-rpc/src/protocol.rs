//! Wire envelopes for internal RPC traffic.
//!
//! Two layers of framing travel over the channel layer: an outer
//! [`TransportMessage`] that tags a message as internal-RPC traffic and names
//! the originating service, and an inner JSON-RPC 2.0 payload: a
//! [`RpcRequest`] for calls, a [`RpcResponse`] for replies. The presence of
//! `id` on a request is what distinguishes a request (reply expected) from a
//! push (fire-and-forget).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only JSON-RPC version this layer speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Discriminator separating internal-RPC traffic from other pub/sub messages
/// sharing the same channel layer.
pub const MESSAGE_TYPE: &str = "internal_json_rpc";

// JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Declared application failures raised inside an invoked method.
pub const APPLICATION_ERROR: i32 = -32000;

/// JSON-RPC 2.0 request (a Call Envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Present for requests, absent for pushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl RpcRequest {
    /// Create a request that expects a correlated reply.
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(id),
        }
    }

    /// Create a push: no id, no reply, no delivery confirmation.
    pub fn push(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: None,
        }
    }

    pub fn is_push(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response (a Reply Envelope).
///
/// Exactly one of `result`/`error` is present; the constructors below are the
/// only way this type is built, so the exclusivity holds throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
    #[serde(default)]
    pub id: Option<u64>,
}

impl RpcResponse {
    /// Create a success reply correlated to `id`.
    pub fn success(id: Option<u64>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error reply correlated to `id` (when one could be read off
    /// the offending payload).
    pub fn error(id: Option<u64>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object carried in an error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outer envelope for everything this layer puts on the channel layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Message discriminator; inbound messages with any other value are not
    /// for this layer and get ignored.
    #[serde(rename = "type")]
    pub kind: String,
    /// Name of the originating service. Replies to a call are addressed back
    /// to this service's group.
    pub service: String,
    /// Inner [`RpcRequest`] or [`RpcResponse`], kept as raw JSON until the
    /// receive loop classifies it.
    pub payload: Value,
}

impl TransportMessage {
    pub fn new(service: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            service: service.into(),
            payload,
        }
    }

    pub fn is_internal_rpc(&self) -> bool {
        self.kind == MESSAGE_TYPE
    }
}

/// A payload with a top-level `result` or `error` key is a Reply Envelope;
/// anything else is treated as a Call Envelope.
pub fn payload_is_reply(payload: &Value) -> bool {
    payload
        .as_object()
        .map(|obj| obj.contains_key("result") || obj.contains_key("error"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_roundtrip() {
        let req = RpcRequest::new("get_user", json!({"user_id": "u-1"}), 7);
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: RpcRequest = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.jsonrpc, "2.0");
        assert_eq!(decoded.method, "get_user");
        assert_eq!(decoded.params, Some(json!({"user_id": "u-1"})));
        assert_eq!(decoded.id, Some(7));
        assert!(!decoded.is_push());
    }

    #[test]
    fn test_push_omits_id() {
        let req = RpcRequest::push("notify", json!({"event": "ready"}));
        assert!(req.is_push());

        let encoded = serde_json::to_string(&req).unwrap();
        assert!(!encoded.contains("\"id\""));
    }

    #[test]
    fn test_error_reply_roundtrip() {
        let resp = RpcResponse::error(Some(3), METHOD_NOT_FOUND, "method not found: nope");
        let encoded = serde_json::to_string(&resp).unwrap();
        let decoded: RpcResponse = serde_json::from_str(&encoded).unwrap();

        assert!(decoded.result.is_none());
        let err = decoded.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert_eq!(err.message, "method not found: nope");
        assert_eq!(decoded.id, Some(3));
    }

    #[test]
    fn test_success_reply_never_serializes_error() {
        let resp = RpcResponse::success(Some(1), json!({"ok": true}));
        let encoded = serde_json::to_string(&resp).unwrap();
        assert!(encoded.contains("\"result\""));
        assert!(!encoded.contains("\"error\""));
    }

    #[test]
    fn test_payload_classification() {
        assert!(payload_is_reply(&json!({"jsonrpc": "2.0", "result": 1, "id": 1})));
        assert!(payload_is_reply(
            &json!({"jsonrpc": "2.0", "error": {"code": -32603, "message": "x"}, "id": 1})
        ));
        assert!(!payload_is_reply(
            &json!({"jsonrpc": "2.0", "method": "ping", "id": 1})
        ));
        assert!(!payload_is_reply(&json!([1, 2, 3])));
    }

    #[test]
    fn test_transport_message_discriminator() {
        let msg = TransportMessage::new("login", json!({"method": "ping"}));
        assert!(msg.is_internal_rpc());

        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], json!("internal_json_rpc"));
        assert_eq!(encoded["service"], json!("login"));

        let foreign: TransportMessage =
            serde_json::from_value(json!({"type": "presence", "service": "x", "payload": {}}))
                .unwrap();
        assert!(!foreign.is_internal_rpc());
    }
}
