//! Error-to-HTTP mapping for the API surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// An API error: status code plus a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<switchboard_channels::Error> for ApiError {
    fn from(e: switchboard_channels::Error) -> Self {
        use switchboard_channels::Error as E;
        let status = match &e {
            E::UnknownChannel { .. } => StatusCode::NOT_FOUND,
            E::PairingExpired => StatusCode::GONE,
            E::PairingRejected { .. } | E::NotConnected { .. } => StatusCode::CONFLICT,
            E::Connect { .. } | E::Send { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<switchboard_store::Error> for ApiError {
    fn from(e: switchboard_store::Error) -> Self {
        use switchboard_store::Error as E;
        let status = match &e {
            E::UnknownConversation { .. } | E::UnknownMessage { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<switchboard_router::Error> for ApiError {
    fn from(e: switchboard_router::Error) -> Self {
        use switchboard_router::Error as E;
        match e {
            E::Channel(inner) => inner.into(),
            E::Store(inner) => inner.into(),
            E::UnknownConversation { .. } | E::UnknownChannel { .. } => {
                Self::not_found(e.to_string())
            },
            E::Malformed { .. } | E::NoTranslator(_) => Self::bad_request(e.to_string()),
            E::RegistryNotAttached => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            },
        }
    }
}

impl From<switchboard_auto_reply::Error> for ApiError {
    fn from(e: switchboard_auto_reply::Error) -> Self {
        use switchboard_auto_reply::Error as E;
        match e {
            E::UnknownAgent { .. } => Self::not_found(e.to_string()),
            E::Channel(inner) => inner.into(),
        }
    }
}
