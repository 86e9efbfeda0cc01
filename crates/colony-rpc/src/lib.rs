//! Colony internal RPC - request/response calls between services over a
//! pub/sub channel layer.
//!
//! Services in a colony deployment do not dial each other directly; every
//! process owns one receive channel on a shared pub/sub transport and joins
//! the group named after its service. A call is a JSON-RPC 2.0 envelope
//! broadcast to the target service's group; the reply comes back the same
//! way, correlated by a per-connection request id. This crate turns that
//! broadcast primitive into `request` (wait for a reply, bounded by a
//! timeout) and `push` (fire-and-forget), with a method registry that any
//! module can contribute to before the connection opens.
//!
//! Delivery is best effort: no durability, no ordering across methods, no
//! exactly-once. A request that gets no reply fails by timeout and may be
//! retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use colony_rpc::{InternalConnection, LocalChannelLayer, MethodRegistryBuilder};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn demo() -> colony_rpc::Result<()> {
//! let layer = Arc::new(LocalChannelLayer::new());
//!
//! let registry = MethodRegistryBuilder::new()
//!     .register("get_user", |_ctx, params| async move {
//!         Ok(json!({ "id": params["user_id"], "active": true }))
//!     })
//!     .build();
//! let login = InternalConnection::connect("login", registry, layer.clone()).await?;
//!
//! let me = InternalConnection::connect(
//!     "profile",
//!     MethodRegistryBuilder::new().build(),
//!     layer,
//! ).await?;
//! let user = me.request("login", "get_user", json!({"user_id": "u-1"})).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

// Re-export commonly used types
pub use config::ConnectionConfig;
pub use connection::InternalConnection;
pub use dispatch::Dispatcher;
pub use error::{Result, RpcError};
pub use protocol::{RpcErrorObject, RpcRequest, RpcResponse, TransportMessage};
pub use registry::{ApiContext, MethodRegistry, MethodRegistryBuilder, MethodResult};
pub use transport::{ChannelLayer, LocalChannelLayer};
