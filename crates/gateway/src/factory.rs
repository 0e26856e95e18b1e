use std::sync::Arc;

use async_trait::async_trait;

use {
    switchboard_channels::{ChannelConnection, ConnectionFactory, Error, Result},
    switchboard_common::types::{Channel, ChannelType},
    switchboard_whatsapp::{Transport, WhatsAppConnection},
    switchboard_widget::WidgetConnection,
};

/// Builds the right connection for a channel based on its type.
///
/// WhatsApp needs a transport per channel; the builder closure decides how
/// that transport is constructed (real protocol stack in production, a
/// scripted one in tests).
pub struct SwitchboardFactory {
    whatsapp_transport: Arc<dyn Fn(&Channel) -> Arc<dyn Transport> + Send + Sync>,
}

impl SwitchboardFactory {
    #[must_use]
    pub fn new(
        whatsapp_transport: Arc<dyn Fn(&Channel) -> Arc<dyn Transport> + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self { whatsapp_transport })
    }
}

#[async_trait]
impl ConnectionFactory for SwitchboardFactory {
    async fn create(&self, channel: &Channel) -> Result<Arc<dyn ChannelConnection>> {
        match channel.channel_type {
            ChannelType::WhatsApp => {
                let transport = (self.whatsapp_transport)(channel);
                Ok(WhatsAppConnection::new(&channel.id, transport) as Arc<dyn ChannelConnection>)
            },
            ChannelType::Widget => {
                Ok(WidgetConnection::new(&channel.id) as Arc<dyn ChannelConnection>)
            },
            other => Err(Error::connect(format!(
                "no transport available for channel type {other}"
            ))),
        }
    }
}
