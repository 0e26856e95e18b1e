use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use switchboard_common::types::ChannelType;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auto_reply: AutoReplyConfig,
    /// Channels brought up at boot.
    pub channels: Vec<BootChannel>,
    /// Agent profiles registered at boot.
    pub agents: Vec<BootAgent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// Conversation store location. `data_dir = None` keeps everything in
/// memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReplyConfig {
    /// Budget for one reply generation attempt, in seconds.
    pub generation_timeout_secs: u64,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: 30,
        }
    }
}

/// One channel declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default = "default_true")]
    pub auto_reply: bool,
    /// Name of a `[[agents]]` entry to assign to this channel.
    #[serde(default)]
    pub agent: Option<String>,
}

/// One agent profile declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootAgent {
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub prompt: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg: SwitchboardConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.auto_reply.generation_timeout_secs, 30);
        assert!(cfg.store.data_dir.is_none());
        assert!(cfg.channels.is_empty());
    }

    #[test]
    fn boot_channels_parse() {
        let cfg: SwitchboardConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [store]
            data_dir = "/var/lib/switchboard"

            [[agents]]
            name = "Support bot"
            provider = "openai"
            model = "gpt-4o-mini"
            prompt = "be helpful"

            [[channels]]
            name = "Support WA"
            type = "whatsapp"
            agent = "Support bot"

            [[channels]]
            name = "Site widget"
            type = "widget"
            auto_reply = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.channels.len(), 2);
        assert_eq!(cfg.channels[0].channel_type, ChannelType::WhatsApp);
        assert!(cfg.channels[0].auto_reply);
        assert_eq!(cfg.channels[0].agent.as_deref(), Some("Support bot"));
        assert!(!cfg.channels[1].auto_reply);
        assert_eq!(cfg.agents[0].model, "gpt-4o-mini");
    }
}
