pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown agent: {agent_id}")]
    UnknownAgent { agent_id: String },

    #[error(transparent)]
    Channel(#[from] switchboard_channels::Error),
}

impl Error {
    #[must_use]
    pub fn unknown_agent(agent_id: impl std::fmt::Display) -> Self {
        Self::UnknownAgent {
            agent_id: agent_id.to_string(),
        }
    }
}

/// Failure of one generation attempt. Swallowed (logged) at the auto-reply
/// boundary; an AI failure never blocks the human agent path.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: std::time::Duration },

    #[error("provider error: {message}")]
    Provider { message: String },
}

impl GenerationError {
    #[must_use]
    pub fn provider(message: impl std::fmt::Display) -> Self {
        Self::Provider {
            message: message.to_string(),
        }
    }
}
