//! In-process channel layer.
//!
//! Backs the [`ChannelLayer`] interface with tokio mpsc channels and a group
//! membership table. Useful for tests and for running several services inside
//! one process; a real deployment substitutes a broker-backed layer behind
//! the same trait.

use super::ChannelLayer;
use crate::config::LocalLayerConfig;
use crate::error::{Result, RpcError};
use crate::protocol::TransportMessage;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

struct LocalChannel {
    tx: mpsc::Sender<TransportMessage>,
    // One receive-loop per channel; the async mutex serializes stray extra
    // callers instead of splitting delivery between them.
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<TransportMessage>>>,
}

/// In-process [`ChannelLayer`] backed by tokio mpsc channels.
pub struct LocalChannelLayer {
    capacity: usize,
    next_channel: AtomicU64,
    channels: Mutex<HashMap<String, LocalChannel>>,
    groups: Mutex<HashMap<String, HashSet<String>>>,
}

impl LocalChannelLayer {
    pub fn new() -> Self {
        Self::with_capacity(LocalLayerConfig::CHANNEL_CAPACITY)
    }

    /// Layer with a custom per-channel buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            next_channel: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LocalChannelLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelLayer for LocalChannelLayer {
    async fn new_channel(&self, prefix: &str) -> Result<String> {
        let seq = self.next_channel.fetch_add(1, Ordering::Relaxed);
        let name = format!("{prefix}.{seq}");

        let (tx, rx) = mpsc::channel(self.capacity);
        let mut channels = self.channels.lock().expect("channel table poisoned");
        channels.insert(
            name.clone(),
            LocalChannel {
                tx,
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
            },
        );
        Ok(name)
    }

    async fn group_add(&self, group: &str, channel: &str) -> Result<()> {
        {
            let channels = self.channels.lock().expect("channel table poisoned");
            if !channels.contains_key(channel) {
                return Err(RpcError::channel(format!("unknown channel `{channel}`")));
            }
        }
        let mut groups = self.groups.lock().expect("group table poisoned");
        groups
            .entry(group.to_string())
            .or_default()
            .insert(channel.to_string());
        Ok(())
    }

    async fn group_discard(&self, group: &str, channel: &str) -> Result<()> {
        let mut groups = self.groups.lock().expect("group table poisoned");
        if let Some(members) = groups.get_mut(group) {
            members.remove(channel);
            if members.is_empty() {
                groups.remove(group);
            }
        }
        Ok(())
    }

    async fn group_send(&self, group: &str, message: TransportMessage) -> Result<()> {
        let senders: Vec<(String, mpsc::Sender<TransportMessage>)> = {
            let groups = self.groups.lock().expect("group table poisoned");
            let Some(members) = groups.get(group) else {
                // Nobody listening; broadcast semantics make this a no-op.
                return Ok(());
            };
            let channels = self.channels.lock().expect("channel table poisoned");
            members
                .iter()
                .filter_map(|name| {
                    channels
                        .get(name)
                        .map(|ch| (name.clone(), ch.tx.clone()))
                })
                .collect()
        };

        for (name, tx) in senders {
            // At-most-once: a full or closed channel loses the message.
            if let Err(e) = tx.try_send(message.clone()) {
                debug!(channel = %name, group = %group, error = %e, "dropping message");
            }
        }
        Ok(())
    }

    async fn receive(&self, channel: &str) -> Result<TransportMessage> {
        let rx = {
            let channels = self.channels.lock().expect("channel table poisoned");
            channels
                .get(channel)
                .map(|ch| ch.rx.clone())
                .ok_or_else(|| RpcError::channel(format!("unknown channel `{channel}`")))?
        };
        let mut rx = rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| RpcError::channel(format!("channel `{channel}` closed")))
    }
}
