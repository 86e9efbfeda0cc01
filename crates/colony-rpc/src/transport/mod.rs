//! Pub/sub channel layer consumed by internal connections.
//!
//! The RPC layer never talks to a broker directly; it goes through
//! [`ChannelLayer`], a minimal group-broadcast interface. A channel is a
//! private receive endpoint belonging to one process; a group is a named set
//! of channels, and sending to a group delivers to every member. Delivery is
//! best effort and at most once.

mod local;

pub use local::LocalChannelLayer;

use crate::error::Result;
use crate::protocol::TransportMessage;
use async_trait::async_trait;

/// Minimal pub/sub transport interface.
///
/// Implementations must be safe to share across tasks; `receive` on a given
/// channel is only ever driven by that channel's owning connection.
#[async_trait]
pub trait ChannelLayer: Send + Sync + 'static {
    /// Allocate a fresh process-private channel; the returned name is unique
    /// within this layer.
    async fn new_channel(&self, prefix: &str) -> Result<String>;

    /// Add a channel to a group, creating the group if needed.
    async fn group_add(&self, group: &str, channel: &str) -> Result<()>;

    /// Remove a channel from a group. Removing a non-member is a no-op.
    async fn group_discard(&self, group: &str, channel: &str) -> Result<()>;

    /// Broadcast a message to every channel in a group. A group with no
    /// members swallows the message.
    async fn group_send(&self, group: &str, message: TransportMessage) -> Result<()>;

    /// Receive the next message on a channel, suspending until one arrives.
    async fn receive(&self, channel: &str) -> Result<TransportMessage>;
}
