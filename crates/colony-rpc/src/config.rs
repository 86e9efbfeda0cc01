//! Centralized configuration constants for the internal RPC layer.

use std::time::Duration;

/// Tunables for an internal connection.
pub struct ConnectionConfig;

impl ConnectionConfig {
    /// Default bounded wait for a `request` reply.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Prefix for service group names: service `login` is addressed as
    /// `internal_login`.
    pub const GROUP_PREFIX: &'static str = "internal";

    /// Prefix passed to the channel layer when allocating this process's
    /// receive channel.
    pub const CHANNEL_PREFIX: &'static str = "internal";
}

/// Tunables for the in-process channel layer.
pub struct LocalLayerConfig;

impl LocalLayerConfig {
    /// Per-channel buffer; a full channel drops further deliveries rather
    /// than blocking the sender.
    pub const CHANNEL_CAPACITY: usize = 100;
}
