//! Transport seam between the connection supervisor and the WhatsApp wire
//! protocol. Tests plug in a scripted implementation.

use {async_trait::async_trait, tokio::sync::mpsc};

use {switchboard_channels::Result, switchboard_common::types::DeliveryReceipt};

/// Events a transport session emits after it has been opened.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Authenticated and ready to exchange messages.
    Connected { phone_number: Option<String> },
    /// Session dropped. `logged_out` means the credentials were revoked on
    /// the phone; the session must not be reopened automatically.
    Disconnected { logged_out: bool, reason: String },
    /// A message arrived from a contact.
    Inbound {
        message_id: String,
        from: String,
        sender_name: Option<String>,
        text: String,
    },
}

/// One opened transport session.
pub struct Session {
    /// QR material to present when the session has no stored credentials.
    /// `None` means the transport will authenticate from existing state.
    pub qr: Option<String>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// The WhatsApp wire protocol, reduced to what the connection needs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session. Each call starts a fresh protocol handshake.
    async fn open(&self) -> Result<Session>;

    /// Deliver one text message. Only meaningful while the current session
    /// is connected.
    async fn deliver(&self, to: &str, content: &str) -> Result<DeliveryReceipt>;

    /// Tear the current session down.
    async fn close(&self) -> Result<()>;
}

/// Placeholder transport for deployments without a WhatsApp protocol stack.
/// Every open fails, so channels using it come up in the error state instead
/// of crashing the gateway.
pub struct UnconfiguredTransport;

#[async_trait]
impl Transport for UnconfiguredTransport {
    async fn open(&self) -> Result<Session> {
        Err(switchboard_channels::Error::connect(
            "whatsapp transport not configured",
        ))
    }

    async fn deliver(&self, _to: &str, _content: &str) -> Result<DeliveryReceipt> {
        Err(switchboard_channels::Error::send(
            "whatsapp transport not configured",
        ))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
