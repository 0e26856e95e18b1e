//! Canonical data model shared by the connector, router, and store.

use serde::{Deserialize, Serialize};

// ── Channels ────────────────────────────────────────────────────────────────

/// Supported messaging surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    WhatsApp,
    Telegram,
    Facebook,
    Widget,
    WeChat,
    MiChat,
}

impl ChannelType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Facebook => "facebook",
            Self::Widget => "widget",
            Self::WeChat => "wechat",
            Self::MiChat => "michat",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Self::WhatsApp),
            "telegram" => Ok(Self::Telegram),
            "facebook" => Ok(Self::Facebook),
            "widget" => Ok(Self::Widget),
            "wechat" => Ok(Self::WeChat),
            "michat" => Ok(Self::MiChat),
            other => Err(format!("unknown channel type: {other}")),
        }
    }
}

/// Connection status of a channel, as shown to operators.
///
/// Transitions are driven exclusively by connection events, never by the
/// HTTP surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[default]
    Offline,
    Connecting,
    Online,
    Error,
}

/// A configured external messaging surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub status: ChannelStatus,
    /// Unix ms of the last connection event on this channel.
    pub last_activity_at: Option<i64>,
    /// AI agent assigned to auto-reply on this channel, if any.
    pub assigned_agent_id: Option<String>,
    pub auto_reply_enabled: bool,
}

impl Channel {
    #[must_use]
    pub fn new(name: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            id: crate::new_id("ch"),
            name: name.into(),
            channel_type,
            status: ChannelStatus::Offline,
            last_activity_at: None,
            assigned_agent_id: None,
            auto_reply_enabled: true,
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────────────

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Contact,
    Agent,
    Ai,
}

/// Delivery progression for an outbound message. Transitions are monotonic:
/// sent → delivered → read, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Whether moving to `next` is a forward transition.
    #[must_use]
    pub fn can_advance_to(&self, next: Self) -> bool {
        next > *self
    }
}

/// A single message in a conversation. Immutable once created except for
/// `delivery_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub content: String,
    /// Unix ms at creation.
    pub created_at: i64,
    /// Process-wide sequence number; tie-break when `created_at` collides.
    pub seq: u64,
    pub delivery_status: DeliveryStatus,
    /// Transport-level message id, when the channel reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_message_id: Option<String>,
}

impl Message {
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        sender: Sender,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: crate::new_id("msg"),
            conversation_id: conversation_id.into(),
            sender,
            sender_id: None,
            content: content.into(),
            created_at: crate::now_ms(),
            seq: crate::next_seq(),
            delivery_status: DeliveryStatus::Sent,
            transport_message_id: None,
        }
    }

    /// Sort key: timestamp first, sequence number as tie-break.
    #[must_use]
    pub fn order_key(&self) -> (i64, u64) {
        (self.created_at, self.seq)
    }
}

// ── Conversations ───────────────────────────────────────────────────────────

/// The ordered thread of messages with one contact over one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel_id: String,
    pub contact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    pub unread_count: u32,
    /// Id of the tail message, if any.
    pub last_message_id: Option<String>,
    /// Manual-takeover flag: once a human agent replies, auto-reply is off
    /// for this conversation until explicitly re-enabled.
    pub ai_disabled: bool,
}

impl Conversation {
    #[must_use]
    pub fn new(channel_id: impl Into<String>, contact_id: impl Into<String>) -> Self {
        Self {
            id: crate::new_id("conv"),
            channel_id: channel_id.into(),
            contact_id: contact_id.into(),
            contact_name: None,
            unread_count: 0,
            last_message_id: None,
            ai_disabled: false,
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

/// An outbound message handed to a channel connection for an actual wire send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel_id: String,
    /// Channel-specific recipient reference (JID, open-id, widget session…).
    pub to: String,
    pub content: String,
}

/// Receipt returned by a channel transport after a successful send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub transport_message_id: String,
    pub delivered_at: i64,
}
