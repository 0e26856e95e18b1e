use std::sync::Arc;

use {async_trait::async_trait, tokio::sync::mpsc};

use switchboard_common::types::{
    Channel, ChannelStatus, ChannelType, DeliveryReceipt, OutboundMessage,
};

use crate::Result;

// ── Connection events (pub/sub) ─────────────────────────────────────────────

/// Events emitted by a live channel connection.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// A raw provider payload arrived on the wire. Translation into the
    /// canonical message shape happens in the router.
    Inbound {
        channel_id: String,
        payload: serde_json::Value,
    },
    /// The connection changed status (connecting, online, error, …).
    StatusChanged {
        channel_id: String,
        status: ChannelStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

/// Sink for connection events; the router provides the concrete
/// implementation. Implementations must never panic on malformed input.
#[async_trait]
pub trait ConnectionEventSink: Send + Sync {
    /// An inbound provider payload arrived on `channel_id`.
    async fn on_inbound(&self, channel_id: &str, payload: serde_json::Value);

    /// The connection for `channel_id` transitioned to `status`.
    async fn on_status_change(&self, channel_id: &str, status: ChannelStatus);
}

// ── Pairing ─────────────────────────────────────────────────────────────────

/// Handle returned when a QR-based channel starts pairing: the QR payload to
/// present and how long it stays valid.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PairingHandle {
    pub token: String,
    pub expires_in_seconds: u64,
}

/// Pairing adapter for QR-based channels. Confirmation is asynchronous: an
/// external scan event calls [`PairingSupport::confirm`].
#[async_trait]
pub trait PairingSupport: Send + Sync {
    /// Current (or fresh) pairing token. Fails once the session is paired.
    async fn pairing_token(&self) -> Result<PairingHandle>;

    /// Confirm a scan of `token`. Flips the channel online on success.
    async fn confirm(&self, token: &str) -> Result<()>;
}

// ── Core connection trait ───────────────────────────────────────────────────

/// One live transport-level link to a channel's backend.
///
/// Owned exclusively by the [`crate::ConnectionRegistry`]; at most one
/// instance exists per channel id at any time.
#[async_trait]
pub trait ChannelConnection: Send + Sync {
    fn channel_id(&self) -> &str;

    fn channel_type(&self) -> ChannelType;

    /// Open the transport session. For QR-based channels this starts pairing
    /// and returns the pairing handle; confirmation arrives asynchronously.
    async fn connect(&self) -> Result<Option<PairingHandle>>;

    /// Tear down the transport session.
    async fn disconnect(&self) -> Result<()>;

    /// Send a message over the wire. Only valid while [`ChannelStatus::Online`];
    /// otherwise fails with [`crate::Error::NotConnected`] without touching
    /// the transport and without queueing.
    async fn send(&self, outbound: &OutboundMessage) -> Result<DeliveryReceipt>;

    fn status(&self) -> ChannelStatus;

    /// Take the connection's event receiver. Single consumer: the registry
    /// takes it when spawning the event pump; later calls return `None`.
    fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>>;

    /// Pairing adapter, for channels that authenticate by QR scan.
    fn pairing(&self) -> Option<&dyn PairingSupport> {
        None
    }
}

/// Builds transport-specific connections for the registry.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(&self, channel: &Channel) -> Result<Arc<dyn ChannelConnection>>;
}
