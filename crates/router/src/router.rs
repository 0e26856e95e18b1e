use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use {
    switchboard_auto_reply::{AgentRegistry, ReplyGenerator, generate_with_timeout},
    switchboard_channels::{
        ChannelStore, ConnectionEventSink, ConnectionRegistry,
    },
    switchboard_common::types::{
        Channel, ChannelStatus, Message, OutboundMessage, Sender,
    },
    switchboard_store::{AppendOutcome, ConversationStore},
};

use crate::{Error, Result, TranslatorRegistry};

/// Transport ids remembered per conversation before the oldest are evicted.
/// Providers only redeliver recent events; anything older is caught by the
/// store's transport-id dedup.
const SEEN_CAP: usize = 512;

/// Recently routed transport ids for one conversation, oldest-first.
#[derive(Default)]
struct SeenIds {
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenIds {
    /// Insert an id. Returns false when it was already present.
    fn insert(&mut self, id: &str) -> bool {
        if !self.set.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > SEEN_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.set.len()
    }
}

/// Router tunables.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Budget for one auto-reply generation attempt.
    pub generation_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(30),
        }
    }
}

/// Receives inbound events from every channel connection, normalizes them
/// into the canonical message shape, appends to the owning conversation,
/// and routes outbound replies back through the correct connection.
///
/// Safe under concurrent invocation from multiple channel workers; ordering
/// within one conversation equals arrival order at the router.
pub struct MessageRouter {
    store: Arc<ConversationStore>,
    channels: Arc<dyn ChannelStore>,
    agents: Arc<AgentRegistry>,
    generator: Arc<dyn ReplyGenerator>,
    translators: TranslatorRegistry,
    /// Set once during wiring; the registry itself holds this router as its
    /// event sink.
    registry: OnceLock<Arc<ConnectionRegistry>>,
    /// Transport message ids recently routed, per conversation. Bounded
    /// in-memory fast path; the store's transport-id dedup is the durable
    /// backstop.
    seen: Mutex<HashMap<String, SeenIds>>,
    config: RouterConfig,
}

impl MessageRouter {
    #[must_use]
    pub fn new(
        store: Arc<ConversationStore>,
        channels: Arc<dyn ChannelStore>,
        agents: Arc<AgentRegistry>,
        generator: Arc<dyn ReplyGenerator>,
        translators: TranslatorRegistry,
        config: RouterConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            channels,
            agents,
            generator,
            translators,
            registry: OnceLock::new(),
            seen: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Attach the connection registry after construction (the registry takes
    /// this router as its sink, so the two are wired in two steps).
    pub fn attach_registry(&self, registry: Arc<ConnectionRegistry>) {
        let _ = self.registry.set(registry);
    }

    fn registry(&self) -> Result<&Arc<ConnectionRegistry>> {
        self.registry.get().ok_or(Error::RegistryNotAttached)
    }

    /// Route one inbound provider payload. Returns the appended message, or
    /// `None` when the event was a duplicate redelivery.
    ///
    /// Errors are returned for callers that care (the webhook surface); the
    /// event-sink path logs and drops them instead.
    pub async fn ingest(
        &self,
        channel_id: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Message>> {
        let channel = self
            .channels
            .get(channel_id)
            .await?
            .ok_or_else(|| Error::unknown_channel(channel_id))?;

        let normalized = self.translators.translate(channel.channel_type, payload)?;

        let conversation = self
            .store
            .find_or_create(channel_id, &normalized.contact_id, normalized.contact_name.as_deref())
            .await?;

        if !self.first_sighting(&conversation.id, &normalized.transport_message_id) {
            debug!(
                channel_id,
                conversation_id = %conversation.id,
                transport_message_id = %normalized.transport_message_id,
                "duplicate redelivery discarded",
            );
            return Ok(None);
        }

        let mut message = Message::new(&conversation.id, Sender::Contact, normalized.content);
        message.sender_id = Some(normalized.contact_id.clone());
        message.transport_message_id = Some(normalized.transport_message_id.clone());

        if self.store.append(message.clone()).await? == AppendOutcome::Duplicate {
            return Ok(None);
        }
        info!(
            channel_id,
            conversation_id = %conversation.id,
            message_id = %message.id,
            "inbound message appended",
        );

        self.maybe_auto_reply(&channel, &conversation.id, &message).await;
        Ok(Some(message))
    }

    /// Send a reply out through the conversation's channel and append it.
    ///
    /// The only path to an actual wire send. A human (`Sender::Agent`)
    /// outbound flags the conversation as manually handled, permanently
    /// disabling auto-reply for it.
    pub async fn send_outbound(
        &self,
        conversation_id: &str,
        content: &str,
        sender: Sender,
        sender_id: Option<&str>,
    ) -> Result<Message> {
        if sender == Sender::Contact {
            return Err(Error::malformed("outbound sender must be agent or ai"));
        }

        let conversation = self
            .store
            .get(conversation_id)
            .await
            .ok_or_else(|| Error::unknown_conversation(conversation_id))?;

        let outbound = OutboundMessage {
            channel_id: conversation.channel_id.clone(),
            to: conversation.contact_id.clone(),
            content: content.to_string(),
        };
        let receipt = self
            .registry()?
            .send(&conversation.channel_id, &outbound)
            .await?;

        let mut message = Message::new(conversation_id, sender, content);
        message.sender_id = sender_id.map(str::to_string);
        message.transport_message_id = Some(receipt.transport_message_id.clone());
        self.store.append(message.clone()).await?;

        if sender == Sender::Agent && !conversation.ai_disabled {
            self.store.set_ai_disabled(conversation_id, true).await?;
            info!(conversation_id, "manual takeover: auto-reply disabled");
        }

        debug!(
            conversation_id,
            message_id = %message.id,
            transport_message_id = %receipt.transport_message_id,
            "outbound message sent",
        );
        Ok(message)
    }

    /// Re-enable auto-reply for a conversation (explicit admin action).
    pub async fn enable_auto_reply(&self, conversation_id: &str) -> Result<()> {
        self.store.set_ai_disabled(conversation_id, false).await?;
        info!(conversation_id, "auto-reply re-enabled");
        Ok(())
    }

    fn first_sighting(&self, conversation_id: &str, transport_message_id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.entry(conversation_id.to_string())
            .or_default()
            .insert(transport_message_id)
    }

    async fn maybe_auto_reply(&self, channel: &Channel, conversation_id: &str, trigger: &Message) {
        if !channel.auto_reply_enabled {
            return;
        }
        // Re-read the conversation: the takeover flag is conversation-scoped
        // and may have flipped since the inbound was translated.
        let Some(conversation) = self.store.get(conversation_id).await else {
            return;
        };
        if conversation.ai_disabled {
            debug!(conversation_id, "manually handled, skipping auto-reply");
            return;
        }
        let Some(agent_id) = channel.assigned_agent_id.as_deref() else {
            debug!(channel_id = %channel.id, "auto-reply enabled but no agent assigned");
            return;
        };
        // Resolve at generation time so a deleted agent can never be routed to.
        let Some(agent) = self.agents.get(agent_id) else {
            debug!(channel_id = %channel.id, agent_id, "assigned agent no longer exists");
            return;
        };

        let reply = generate_with_timeout(
            self.generator.as_ref(),
            &conversation,
            trigger,
            &agent,
            self.config.generation_timeout,
        )
        .await;

        match reply {
            Ok(text) => {
                if let Err(e) = self
                    .send_outbound(conversation_id, &text, Sender::Ai, Some(agent_id))
                    .await
                {
                    warn!(conversation_id, error = %e, "auto-reply send failed");
                }
            },
            // Generation failure is logged and swallowed: the customer simply
            // gets no automatic reply this turn, a human can still step in.
            Err(e) => {
                warn!(conversation_id, agent_id, error = %e, "auto-reply generation failed");
            },
        }
    }
}

#[async_trait]
impl ConnectionEventSink for MessageRouter {
    async fn on_inbound(&self, channel_id: &str, payload: serde_json::Value) {
        if let Err(e) = self.ingest(channel_id, &payload).await {
            // Malformed or unroutable payloads are dropped, never crash the
            // router or other channels.
            warn!(channel_id, error = %e, "dropping inbound event");
        }
    }

    async fn on_status_change(&self, channel_id: &str, status: ChannelStatus) {
        info!(channel_id, ?status, "channel status changed");
    }
}
