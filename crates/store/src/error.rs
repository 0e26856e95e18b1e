/// Crate-wide result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown conversation: {conversation_id}")]
    UnknownConversation { conversation_id: String },

    #[error("unknown message: {message_id}")]
    UnknownMessage { message_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error("journal task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    #[must_use]
    pub fn unknown_conversation(conversation_id: impl std::fmt::Display) -> Self {
        Self::UnknownConversation {
            conversation_id: conversation_id.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_message(message_id: impl std::fmt::Display) -> Self {
        Self::UnknownMessage {
            message_id: message_id.to_string(),
        }
    }
}
