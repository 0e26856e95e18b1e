//! AI agent profiles and their registry.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};

use switchboard_channels::ChannelStore;

use crate::{Error, Result};

/// Configuration of one AI agent (provider, model, system prompt).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    /// Channels this agent is assigned to. The channel store's
    /// `assigned_agent_id` is authoritative; this is filled in from it when
    /// profiles are served, never stored.
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

impl AgentProfile {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: switchboard_common::new_id("agent"),
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            prompt: prompt.into(),
            channel_ids: Vec::new(),
        }
    }
}

/// Registry of AI agent profiles.
///
/// Deletion removes the profile before cascading the channel-assignment
/// clear, and the router re-resolves the profile at generation time, so a
/// message can never be routed to a deleted agent.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentProfile>>,
}

impl AgentRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn upsert(&self, agent: AgentProfile) {
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        agents.insert(agent.id.clone(), agent);
    }

    #[must_use]
    pub fn get(&self, agent_id: &str) -> Option<AgentProfile> {
        let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
        agents.get(agent_id).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<AgentProfile> {
        let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<AgentProfile> = agents.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Delete an agent and clear its channel assignments.
    pub async fn delete(&self, agent_id: &str, channels: &dyn ChannelStore) -> Result<()> {
        let removed = {
            let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
            agents.remove(agent_id).is_some()
        };
        if !removed {
            return Err(Error::unknown_agent(agent_id));
        }
        channels.clear_agent(agent_id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        switchboard_channels::MemoryChannelStore,
        switchboard_common::types::{Channel, ChannelType},
    };

    #[tokio::test]
    async fn delete_cascades_to_channel_assignments() {
        let channels = MemoryChannelStore::new();
        let registry = AgentRegistry::new();

        let agent = AgentProfile::new("Support bot", "openai", "gpt-4o-mini", "be helpful");
        let agent_id = agent.id.clone();
        registry.upsert(agent);

        let mut channel = Channel::new("Support WA", ChannelType::WhatsApp);
        channel.assigned_agent_id = Some(agent_id.clone());
        let channel_id = channel.id.clone();
        channels.upsert(channel).await.unwrap();

        registry.delete(&agent_id, channels.as_ref()).await.unwrap();

        assert!(registry.get(&agent_id).is_none());
        let channel = channels.get(&channel_id).await.unwrap().unwrap();
        assert_eq!(channel.assigned_agent_id, None);
    }

    #[tokio::test]
    async fn delete_unknown_agent_errors() {
        let channels = MemoryChannelStore::new();
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.delete("agent-missing", channels.as_ref()).await,
            Err(Error::UnknownAgent { .. })
        ));
    }

    #[test]
    fn list_is_sorted_and_cloned() {
        let registry = AgentRegistry::new();
        registry.upsert(AgentProfile::new("B", "openai", "gpt", ""));
        registry.upsert(AgentProfile::new("A", "deepseek", "chat", ""));
        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert!(list[0].id <= list[1].id);
    }
}
