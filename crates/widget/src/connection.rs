use std::sync::{Arc, Mutex};

use {async_trait::async_trait, tokio::sync::mpsc, tracing::debug};

use {
    switchboard_channels::{
        ChannelConnection, ConnectionEvent, ConnectionFactory, Error, PairingHandle, Result,
    },
    switchboard_common::{
        new_id, now_ms,
        types::{Channel, ChannelStatus, ChannelType, DeliveryReceipt, OutboundMessage},
    },
};

const EVENT_BUFFER: usize = 64;

/// A reply waiting for the widget frontend to pick it up.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutboxEntry {
    pub id: String,
    pub to: String,
    pub content: String,
    pub queued_at: i64,
}

/// Connection for the embedded web chat widget.
pub struct WidgetConnection {
    channel_id: String,
    status: Mutex<ChannelStatus>,
    outbox: Mutex<Vec<OutboxEntry>>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
}

impl WidgetConnection {
    #[must_use]
    pub fn new(channel_id: impl Into<String>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Arc::new(Self {
            channel_id: channel_id.into(),
            status: Mutex::new(ChannelStatus::Offline),
            outbox: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Drain the replies queued for `visitor_id`. The embedding application
    /// calls this from whatever poll or push path serves its frontend.
    pub fn drain_outbox(&self, visitor_id: &str) -> Vec<OutboxEntry> {
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        let (drained, kept): (Vec<_>, Vec<_>) =
            outbox.drain(..).partition(|entry| entry.to == visitor_id);
        *outbox = kept;
        drained
    }

    async fn emit_status(&self, status: ChannelStatus) {
        let _ = self
            .events_tx
            .send(ConnectionEvent::StatusChanged {
                channel_id: self.channel_id.clone(),
                status,
                detail: None,
            })
            .await;
    }
}

#[async_trait]
impl ChannelConnection for WidgetConnection {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Widget
    }

    async fn connect(&self) -> Result<Option<PairingHandle>> {
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            *status = ChannelStatus::Online;
        }
        self.emit_status(ChannelStatus::Online).await;
        Ok(None)
    }

    async fn disconnect(&self) -> Result<()> {
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            *status = ChannelStatus::Offline;
        }
        self.emit_status(ChannelStatus::Offline).await;
        Ok(())
    }

    async fn send(&self, outbound: &OutboundMessage) -> Result<DeliveryReceipt> {
        if self.status() != ChannelStatus::Online {
            return Err(Error::not_connected(&self.channel_id));
        }
        let entry = OutboxEntry {
            id: new_id("wmsg"),
            to: outbound.to.clone(),
            content: outbound.content.clone(),
            queued_at: now_ms(),
        };
        let receipt = DeliveryReceipt {
            transport_message_id: entry.id.clone(),
            delivered_at: entry.queued_at,
        };
        debug!(channel_id = %self.channel_id, to = %entry.to, "reply queued for widget");
        let mut outbox = self.outbox.lock().unwrap_or_else(|e| e.into_inner());
        outbox.push(entry);
        Ok(receipt)
    }

    fn status(&self) -> ChannelStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.events_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Builds [`WidgetConnection`]s for the registry.
#[derive(Default)]
pub struct WidgetFactory;

#[async_trait]
impl ConnectionFactory for WidgetFactory {
    async fn create(&self, channel: &Channel) -> Result<Arc<dyn ChannelConnection>> {
        Ok(WidgetConnection::new(&channel.id) as Arc<dyn ChannelConnection>)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_goes_straight_online() {
        let conn = WidgetConnection::new("ch-widget");
        assert_eq!(conn.status(), ChannelStatus::Offline);
        conn.connect().await.unwrap();
        assert_eq!(conn.status(), ChannelStatus::Online);
        conn.disconnect().await.unwrap();
        assert_eq!(conn.status(), ChannelStatus::Offline);
    }

    #[tokio::test]
    async fn send_parks_replies_per_visitor() {
        let conn = WidgetConnection::new("ch-widget");
        conn.connect().await.unwrap();

        for (to, content) in [("v-1", "hello"), ("v-2", "hi"), ("v-1", "again")] {
            conn.send(&OutboundMessage {
                channel_id: "ch-widget".into(),
                to: to.into(),
                content: content.into(),
            })
            .await
            .unwrap();
        }

        let drained = conn.drain_outbox("v-1");
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].content, "hello");
        assert_eq!(drained[1].content, "again");
        assert!(conn.drain_outbox("v-1").is_empty());
        assert_eq!(conn.drain_outbox("v-2").len(), 1);
    }

    #[tokio::test]
    async fn send_while_offline_is_rejected() {
        let conn = WidgetConnection::new("ch-widget");
        let err = conn
            .send(&OutboundMessage {
                channel_id: "ch-widget".into(),
                to: "v-1".into(),
                content: "hello".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
        assert!(conn.drain_outbox("v-1").is_empty());
    }
}
