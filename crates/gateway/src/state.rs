use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use {
    switchboard_auto_reply::{AgentProfile, AgentRegistry, ReplyGenerator},
    switchboard_channels::{
        ChannelStore, ConnectionEventSink, ConnectionFactory, ConnectionRegistry,
        MemoryChannelStore,
    },
    switchboard_common::types::Channel,
    switchboard_config::SwitchboardConfig,
    switchboard_router::{MessageRouter, RouterConfig, TranslatorRegistry},
    switchboard_store::ConversationStore,
    switchboard_whatsapp::WhatsAppTranslator,
    switchboard_widget::WidgetTranslator,
};

/// Shared state behind every API handler.
#[derive(Clone)]
pub struct AppState {
    pub channels: Arc<dyn ChannelStore>,
    pub store: Arc<ConversationStore>,
    pub agents: Arc<AgentRegistry>,
    pub router: Arc<MessageRouter>,
    pub registry: Arc<ConnectionRegistry>,
}

/// Wire the full stack from a config: store, agent registry, router,
/// connection registry, and the channels declared in the config file.
pub async fn wire(
    config: &SwitchboardConfig,
    generator: Arc<dyn ReplyGenerator>,
    factory: Arc<dyn ConnectionFactory>,
) -> anyhow::Result<AppState> {
    let store = match &config.store.data_dir {
        Some(dir) => ConversationStore::open(dir.clone()).await?,
        None => ConversationStore::in_memory(),
    };
    let channels = MemoryChannelStore::new();
    let agents = AgentRegistry::new();

    let mut translators = TranslatorRegistry::new();
    translators.register(Box::new(WhatsAppTranslator));
    translators.register(Box::new(WidgetTranslator));

    let router = MessageRouter::new(
        Arc::clone(&store),
        Arc::clone(&channels) as Arc<dyn ChannelStore>,
        Arc::clone(&agents),
        generator,
        translators,
        RouterConfig {
            generation_timeout: Duration::from_secs(config.auto_reply.generation_timeout_secs),
        },
    );
    let registry = ConnectionRegistry::new(
        factory,
        Arc::clone(&channels) as Arc<dyn ChannelStore>,
        Arc::clone(&router) as Arc<dyn ConnectionEventSink>,
    );
    router.attach_registry(Arc::clone(&registry));

    let state = AppState {
        channels: channels as Arc<dyn ChannelStore>,
        store,
        agents,
        router,
        registry,
    };
    boot_from_config(&state, config).await?;
    Ok(state)
}

/// Register the agents and channels the config declares, and bring the
/// channels up. A channel that fails to start is logged and left offline
/// rather than aborting boot.
async fn boot_from_config(state: &AppState, config: &SwitchboardConfig) -> anyhow::Result<()> {
    for boot in &config.agents {
        let agent = AgentProfile::new(&boot.name, &boot.provider, &boot.model, &boot.prompt);
        info!(agent_id = %agent.id, name = %agent.name, "registering agent from config");
        state.agents.upsert(agent);
    }

    for boot in &config.channels {
        let mut channel = Channel::new(&boot.name, boot.channel_type);
        channel.auto_reply_enabled = boot.auto_reply;
        if let Some(agent_name) = &boot.agent {
            let agent_id = state
                .agents
                .list()
                .into_iter()
                .find(|a| &a.name == agent_name)
                .map(|a| a.id);
            if agent_id.is_none() {
                warn!(channel = %boot.name, agent = %agent_name, "unknown agent in config");
            }
            channel.assigned_agent_id = agent_id;
        }
        let channel_id = channel.id.clone();
        state.channels.upsert(channel).await?;

        match state.registry.start(&channel_id).await {
            Ok(Some(handle)) => {
                info!(
                    channel_id,
                    token = %handle.token,
                    "channel awaiting pairing scan",
                );
            },
            Ok(None) => info!(channel_id, "channel started"),
            Err(e) => warn!(channel_id, error = %e, "channel failed to start"),
        }
    }
    Ok(())
}
