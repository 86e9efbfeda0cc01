//! Internal connection: request/push RPC between services over the channel
//! layer.
//!
//! One connection per service process. `connect` allocates the process's
//! receive channel, joins the service's group, and spawns the receive loop;
//! the loop is the only place dispatch and reply-resolution happen, so all
//! correlation-table resolution is serialized through it even while many
//! requests are outstanding from arbitrary tasks.
//!
//! There is no reconnection: a connection is born connected, the transition
//! happens once, and a torn-down process starts over.

use crate::config::ConnectionConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, RpcError};
use crate::protocol::{payload_is_reply, RpcErrorObject, RpcRequest, TransportMessage, INTERNAL_ERROR};
use crate::registry::MethodRegistry;
use crate::transport::ChannelLayer;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outcome delivered to a waiting `request` call.
type ReplyOutcome = std::result::Result<Value, RpcErrorObject>;

struct ConnectionInner {
    service: String,
    channel: String,
    layer: Arc<dyn ChannelLayer>,
    dispatcher: Dispatcher,
    /// Correlation table mapping request ids to pending reply slots. Entries
    /// are removed exactly once, on resolution, timeout, or caller
    /// cancellation.
    pending: Mutex<HashMap<u64, oneshot::Sender<ReplyOutcome>>>,
    next_id: AtomicU64,
}

impl ConnectionInner {
    fn group_name(service: &str) -> String {
        format!("{}_{}", ConnectionConfig::GROUP_PREFIX, service)
    }

    async fn send_payload(&self, service: &str, payload: Value) -> Result<()> {
        let message = TransportMessage::new(self.service.clone(), payload);
        self.layer
            .group_send(&Self::group_name(service), message)
            .await
    }

    async fn handle_message(&self, message: TransportMessage) {
        if !message.is_internal_rpc() {
            debug!(kind = %message.kind, "ignoring non-RPC transport message");
            return;
        }

        if payload_is_reply(&message.payload) {
            self.resolve_reply(message.payload);
        } else if let Some(reply) = self.dispatcher.handle(message.payload).await {
            let payload = match serde_json::to_value(&reply) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(error = %e, "failed to encode reply envelope");
                    return;
                }
            };
            if let Err(e) = self.send_payload(&message.service, payload).await {
                warn!(service = %message.service, error = %e, "failed to deliver reply");
            }
        }
    }

    /// Resolve the pending request a Reply Envelope correlates to. Late,
    /// duplicate, and unknown replies are dropped silently.
    fn resolve_reply(&self, payload: Value) {
        let Some(id) = payload.get("id").and_then(Value::as_u64) else {
            debug!("dropping reply without a usable id");
            return;
        };
        let sender = self
            .pending
            .lock()
            .expect("pending table poisoned")
            .remove(&id);
        let Some(sender) = sender else {
            debug!(id, "dropping reply with no pending request");
            return;
        };

        let outcome = if let Some(raw) = payload.get("error") {
            match serde_json::from_value::<RpcErrorObject>(raw.clone()) {
                Ok(err) => Err(err),
                Err(_) => Err(RpcErrorObject {
                    code: INTERNAL_ERROR,
                    message: "malformed error object in reply".to_string(),
                    data: None,
                }),
            }
        } else {
            Ok(payload.get("result").cloned().unwrap_or(Value::Null))
        };
        // The waiter may have timed out already.
        let _ = sender.send(outcome);
    }
}

/// Removes the correlation entry when the `request` future exits, whichever
/// way it exits. Resolution already removed it on the success path, so the
/// remove is a no-op there.
struct PendingGuard<'a> {
    inner: &'a ConnectionInner,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .pending
            .lock()
            .expect("pending table poisoned")
            .remove(&self.id);
    }
}

/// Connection of one service process to the internal RPC mesh.
pub struct InternalConnection {
    inner: Arc<ConnectionInner>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl InternalConnection {
    /// Connect a service: allocate a channel, join `internal_<service>`, and
    /// start the receive loop.
    pub async fn connect(
        service: impl Into<String>,
        registry: MethodRegistry,
        layer: Arc<dyn ChannelLayer>,
    ) -> Result<Self> {
        let service = service.into();
        let channel = layer.new_channel(ConnectionConfig::CHANNEL_PREFIX).await?;
        layer
            .group_add(&ConnectionInner::group_name(&service), &channel)
            .await?;

        let dispatcher = Dispatcher::new(registry, &service);
        let inner = Arc::new(ConnectionInner {
            service,
            channel,
            layer,
            dispatcher,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });

        let receive_task = tokio::spawn(Self::receive_loop(inner.clone()));
        info!(service = %inner.service, channel = %inner.channel, "internal connection established");

        Ok(Self {
            inner,
            receive_task: Mutex::new(Some(receive_task)),
        })
    }

    /// Leave the service group and stop the receive loop. Requests still
    /// outstanding are not drained; each fails by its own timeout.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(task) = self
            .receive_task
            .lock()
            .expect("receive task slot poisoned")
            .take()
        {
            task.abort();
        }
        self.inner
            .layer
            .group_discard(
                &ConnectionInner::group_name(&self.inner.service),
                &self.inner.channel,
            )
            .await?;
        info!(service = %self.inner.service, "internal connection closed");
        Ok(())
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service
    }

    /// Number of requests currently awaiting a reply.
    pub fn outstanding_requests(&self) -> usize {
        self.inner
            .pending
            .lock()
            .expect("pending table poisoned")
            .len()
    }

    /// Call `method` on `service` and wait for the correlated reply, bounded
    /// by the default timeout.
    pub async fn request(&self, service: &str, method: &str, params: Value) -> Result<Value> {
        self.request_timeout(service, method, params, ConnectionConfig::REQUEST_TIMEOUT)
            .await
    }

    /// Same as [`request`](Self::request) with an explicit timeout window.
    pub async fn request_timeout(
        &self,
        service: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .expect("pending table poisoned")
            .insert(id, tx);
        let _guard = PendingGuard {
            inner: &*self.inner,
            id,
        };

        let request = RpcRequest::new(method, params, id);
        self.inner
            .send_payload(service, serde_json::to_value(&request)?)
            .await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(err))) => Err(RpcError::Remote(err)),
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_) => Err(RpcError::RequestTimeout {
                service: service.to_string(),
                timeout,
            }),
        }
    }

    /// Call `method` on `service` with no reply and no correlation state.
    /// Returns as soon as the broadcast is handed to the channel layer; no
    /// confirmation of delivery or processing exists.
    pub async fn push(&self, service: &str, method: &str, params: Value) -> Result<()> {
        let request = RpcRequest::push(method, params);
        self.inner
            .send_payload(service, serde_json::to_value(&request)?)
            .await
    }

    async fn receive_loop(inner: Arc<ConnectionInner>) {
        loop {
            let message = match inner.layer.receive(&inner.channel).await {
                Ok(message) => message,
                Err(e) => {
                    // A connection without its loop can no longer hear
                    // anything; crash-and-restart is the recovery path.
                    error!(service = %inner.service, error = %e, "receive loop terminated");
                    break;
                }
            };
            inner.handle_message(message).await;
        }
    }
}

impl Drop for InternalConnection {
    fn drop(&mut self) {
        if let Some(task) = self
            .receive_task
            .lock()
            .expect("receive task slot poisoned")
            .take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MethodRegistryBuilder;
    use crate::transport::LocalChannelLayer;
    use serde_json::json;

    async fn connect(layer: &Arc<LocalChannelLayer>, service: &str) -> InternalConnection {
        let shared: Arc<dyn ChannelLayer> = layer.clone();
        InternalConnection::connect(service, MethodRegistryBuilder::new().build(), shared)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_ids_are_monotonic_per_connection() {
        let layer = Arc::new(LocalChannelLayer::new());
        let conn = connect(&layer, "alpha").await;

        assert_eq!(conn.inner.next_id.fetch_add(1, Ordering::Relaxed), 1);
        assert_eq!(conn.inner.next_id.fetch_add(1, Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_unknown_reply_is_dropped_silently() {
        let layer = Arc::new(LocalChannelLayer::new());
        let conn = connect(&layer, "alpha").await;

        // A reply for an id nobody is waiting on.
        conn.inner
            .resolve_reply(json!({"jsonrpc": "2.0", "result": 1, "id": 999}));
        assert_eq!(conn.outstanding_requests(), 0);
    }

    #[tokio::test]
    async fn test_foreign_message_types_are_ignored() {
        let layer = Arc::new(LocalChannelLayer::new());
        let conn = connect(&layer, "alpha").await;

        let foreign = TransportMessage {
            kind: "presence".to_string(),
            service: "other".to_string(),
            payload: json!({"method": "ping", "id": 1}),
        };
        // Must neither dispatch nor touch the correlation table.
        conn.inner.handle_message(foreign).await;
        assert_eq!(conn.outstanding_requests(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_group() {
        let layer = Arc::new(LocalChannelLayer::new());
        let conn = connect(&layer, "alpha").await;
        conn.disconnect().await.unwrap();

        // Further broadcasts to the service group go nowhere.
        layer
            .group_send(
                "internal_alpha",
                TransportMessage::new("x", json!({"method": "ping"})),
            )
            .await
            .unwrap();
    }
}
