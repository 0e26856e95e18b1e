use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    tokio::sync::{Mutex, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use switchboard_common::{now_ms, types::DeliveryReceipt, types::OutboundMessage};

use crate::{
    ChannelStore, Error, Result,
    connection::{
        ChannelConnection, ConnectionEvent, ConnectionEventSink, ConnectionFactory, PairingHandle,
    },
};

/// Bound on `disconnect()` during removal. Teardown past this point is
/// abandoned, not awaited.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct ConnectionSlot {
    connection: Arc<dyn ChannelConnection>,
    cancel: CancellationToken,
}

/// Owns the set of live channel connections, keyed by channel id.
///
/// Invariant: at most one live connection per channel id. Concurrent
/// `get_or_create` calls for the same id serialize on the slot map and
/// return the same instance.
pub struct ConnectionRegistry {
    slots: Mutex<HashMap<String, ConnectionSlot>>,
    factory: Arc<dyn ConnectionFactory>,
    channels: Arc<dyn ChannelStore>,
    sink: Arc<dyn ConnectionEventSink>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        channels: Arc<dyn ChannelStore>,
        sink: Arc<dyn ConnectionEventSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
            factory,
            channels,
            sink,
        })
    }

    /// Get the live connection for `channel_id`, creating it (and spawning
    /// its event pump) on first use.
    pub async fn get_or_create(&self, channel_id: &str) -> Result<Arc<dyn ChannelConnection>> {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(channel_id) {
            return Ok(Arc::clone(&slot.connection));
        }

        let channel = self
            .channels
            .get(channel_id)
            .await?
            .ok_or_else(|| Error::unknown_channel(channel_id))?;

        let connection = self.factory.create(&channel).await?;
        let cancel = CancellationToken::new();

        if let Some(events) = connection.take_events() {
            tokio::spawn(pump_events(
                events,
                Arc::clone(&self.sink),
                Arc::clone(&self.channels),
                cancel.clone(),
            ));
        } else {
            warn!(channel_id, "connection has no event stream to pump");
        }

        info!(channel_id, channel_type = %channel.channel_type, "created channel connection");
        slots.insert(
            channel_id.to_string(),
            ConnectionSlot {
                connection: Arc::clone(&connection),
                cancel,
            },
        );
        Ok(connection)
    }

    /// Live connection for `channel_id`, if one exists. Never creates.
    pub async fn get(&self, channel_id: &str) -> Option<Arc<dyn ChannelConnection>> {
        let slots = self.slots.lock().await;
        slots.get(channel_id).map(|s| Arc::clone(&s.connection))
    }

    /// Create the connection if needed and open its transport session.
    /// Returns the pairing handle for QR-based channels.
    pub async fn start(&self, channel_id: &str) -> Result<Option<PairingHandle>> {
        let connection = self.get_or_create(channel_id).await?;
        connection.connect().await
    }

    /// Send through the live connection for `channel_id`. This is the only
    /// path to an actual wire send.
    pub async fn send(
        &self,
        channel_id: &str,
        outbound: &OutboundMessage,
    ) -> Result<DeliveryReceipt> {
        let connection = self
            .get(channel_id)
            .await
            .ok_or_else(|| Error::not_connected(channel_id))?;
        connection.send(outbound).await
    }

    /// Tear down and release the slot for `channel_id`.
    ///
    /// Disconnect is awaited with a bounded timeout; a dirty teardown is
    /// logged but never blocks removal.
    pub async fn remove(&self, channel_id: &str) -> Result<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.remove(channel_id)
        };

        let Some(slot) = slot else {
            debug!(channel_id, "remove: no live connection");
            return Ok(());
        };

        match tokio::time::timeout(TEARDOWN_TIMEOUT, slot.connection.disconnect()).await {
            Ok(Ok(())) => info!(channel_id, "connection disconnected"),
            Ok(Err(e)) => warn!(channel_id, error = %e, "disconnect failed during removal"),
            Err(_) => warn!(channel_id, "disconnect timed out during removal"),
        }
        slot.cancel.cancel();
        Ok(())
    }

    /// Ids of all live connections.
    pub async fn live_ids(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        slots.keys().cloned().collect()
    }

    /// Tear down every live connection (process shutdown).
    pub async fn shutdown(&self) {
        let ids = self.live_ids().await;
        for id in ids {
            if let Err(e) = self.remove(&id).await {
                warn!(channel_id = %id, error = %e, "teardown failed during shutdown");
            }
        }
    }
}

/// Forward connection events into the channel store and the router sink.
async fn pump_events(
    mut events: mpsc::Receiver<ConnectionEvent>,
    sink: Arc<dyn ConnectionEventSink>,
    channels: Arc<dyn ChannelStore>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ConnectionEvent::Inbound { channel_id, payload } => {
                        sink.on_inbound(&channel_id, payload).await;
                    },
                    ConnectionEvent::StatusChanged { channel_id, status, detail } => {
                        debug!(channel_id, ?status, ?detail, "channel status changed");
                        if let Err(e) = channels.set_status(&channel_id, status, now_ms()).await {
                            warn!(channel_id, error = %e, "failed to persist status change");
                        }
                        sink.on_status_change(&channel_id, status).await;
                    },
                }
            }
        }
    }
}
