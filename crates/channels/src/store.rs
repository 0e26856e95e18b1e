use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use switchboard_common::types::{Channel, ChannelStatus};

use crate::{Error, Result};

/// Persistent storage for channel configurations and status.
///
/// Status and `last_activity_at` writes come only from the connection event
/// pump; the HTTP surface never mutates them directly.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Channel>>;
    async fn get(&self, channel_id: &str) -> Result<Option<Channel>>;
    async fn upsert(&self, channel: Channel) -> Result<()>;
    async fn delete(&self, channel_id: &str) -> Result<()>;
    async fn set_status(&self, channel_id: &str, status: ChannelStatus, at: i64) -> Result<()>;
    async fn set_auto_reply(&self, channel_id: &str, enabled: bool) -> Result<()>;
    async fn assign_agent(&self, channel_id: &str, agent_id: Option<String>) -> Result<()>;
    /// Clear `assigned_agent_id` on every channel referencing `agent_id`.
    /// Used by the agent-delete cascade.
    async fn clear_agent(&self, agent_id: &str) -> Result<()>;
}

/// In-memory channel store.
#[derive(Default)]
pub struct MemoryChannelStore {
    channels: RwLock<HashMap<String, Channel>>,
}

impl MemoryChannelStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_channel<T>(&self, channel_id: &str, f: impl FnOnce(&mut Channel) -> T) -> Result<T> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels
            .get_mut(channel_id)
            .map(f)
            .ok_or_else(|| Error::unknown_channel(channel_id))
    }
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn list(&self) -> Result<Vec<Channel>> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<Channel> = channels.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn get(&self, channel_id: &str) -> Result<Option<Channel>> {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        Ok(channels.get(channel_id).cloned())
    }

    async fn upsert(&self, channel: Channel) -> Result<()> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.insert(channel.id.clone(), channel);
        Ok(())
    }

    async fn delete(&self, channel_id: &str) -> Result<()> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.remove(channel_id);
        Ok(())
    }

    async fn set_status(&self, channel_id: &str, status: ChannelStatus, at: i64) -> Result<()> {
        self.with_channel(channel_id, |ch| {
            ch.status = status;
            ch.last_activity_at = Some(at);
        })
    }

    async fn set_auto_reply(&self, channel_id: &str, enabled: bool) -> Result<()> {
        self.with_channel(channel_id, |ch| ch.auto_reply_enabled = enabled)
    }

    async fn assign_agent(&self, channel_id: &str, agent_id: Option<String>) -> Result<()> {
        self.with_channel(channel_id, |ch| ch.assigned_agent_id = agent_id)
    }

    async fn clear_agent(&self, agent_id: &str) -> Result<()> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        for ch in channels.values_mut() {
            if ch.assigned_agent_id.as_deref() == Some(agent_id) {
                ch.assigned_agent_id = None;
            }
        }
        Ok(())
    }
}
