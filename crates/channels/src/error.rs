use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across connection traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport initialization failed or credentials were rejected.
    #[error("channel connect failed: {message}")]
    Connect { message: String },

    /// The pairing token's validity window elapsed before confirmation.
    #[error("pairing token expired")]
    PairingExpired,

    /// Pairing confirmation carried a bad token or arrived in the wrong state.
    #[error("pairing rejected: {message}")]
    PairingRejected { message: String },

    /// Send attempted while the channel is not online. Never silently queued.
    #[error("channel {channel_id} is not connected")]
    NotConnected { channel_id: String },

    /// The transport accepted the connection but rejected this message.
    #[error("send failed: {message}")]
    Send { message: String },

    /// A requested channel id is not registered.
    #[error("unknown channel: {channel_id}")]
    UnknownChannel { channel_id: String },

    /// The session was revoked (logout / auth revocation). Re-pairing required.
    #[error("channel session terminated: {message}")]
    Terminated { message: String },

    /// Wrapped source error from an external dependency.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn connect(message: impl std::fmt::Display) -> Self {
        Self::Connect {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn pairing_rejected(message: impl std::fmt::Display) -> Self {
        Self::PairingRejected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn not_connected(channel_id: impl std::fmt::Display) -> Self {
        Self::NotConnected {
            channel_id: channel_id.to_string(),
        }
    }

    #[must_use]
    pub fn send(message: impl std::fmt::Display) -> Self {
        Self::Send {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_channel(channel_id: impl std::fmt::Display) -> Self {
        Self::UnknownChannel {
            channel_id: channel_id.to_string(),
        }
    }

    #[must_use]
    pub fn terminated(message: impl std::fmt::Display) -> Self {
        Self::Terminated {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
