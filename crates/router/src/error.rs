use switchboard_common::types::ChannelType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown conversation: {conversation_id}")]
    UnknownConversation { conversation_id: String },

    #[error("unknown channel: {channel_id}")]
    UnknownChannel { channel_id: String },

    /// Provider payload did not translate into the canonical message shape.
    /// Dropped with a warning at the inbound boundary, never fatal.
    #[error("malformed payload: {message}")]
    Malformed { message: String },

    #[error("no payload translator registered for channel type {0}")]
    NoTranslator(ChannelType),

    /// The router was used before the connection registry was attached.
    #[error("connection registry not attached")]
    RegistryNotAttached,

    #[error(transparent)]
    Channel(#[from] switchboard_channels::Error),

    #[error(transparent)]
    Store(#[from] switchboard_store::Error),
}

impl Error {
    #[must_use]
    pub fn unknown_conversation(conversation_id: impl std::fmt::Display) -> Self {
        Self::UnknownConversation {
            conversation_id: conversation_id.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_channel(channel_id: impl std::fmt::Display) -> Self {
        Self::UnknownChannel {
            channel_id: channel_id.to_string(),
        }
    }

    #[must_use]
    pub fn malformed(message: impl std::fmt::Display) -> Self {
        Self::Malformed {
            message: message.to_string(),
        }
    }
}
