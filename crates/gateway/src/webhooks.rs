//! Inbound webhooks for channels whose providers push over HTTP.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    tracing::debug,
};

use switchboard_common::types::ChannelType;

use crate::{error::ApiError, state::AppState};

/// Receive one provider payload for `channel_id`. The channel type in the
/// path guards against payloads posted to the wrong channel.
pub async fn receive(
    State(state): State<AppState>,
    Path((channel_type, channel_id)): Path<(String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let channel_type: ChannelType = channel_type
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;
    let channel = state
        .channels
        .get(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("unknown channel: {channel_id}")))?;
    if channel.channel_type != channel_type {
        return Err(ApiError::bad_request(format!(
            "channel {channel_id} is {}, not {channel_type}",
            channel.channel_type
        )));
    }

    match state.router.ingest(&channel_id, &payload).await? {
        Some(message) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "accepted": true, "message": message })),
        )),
        None => {
            debug!(channel_id, "duplicate webhook delivery");
            Ok((
                StatusCode::OK,
                Json(serde_json::json!({ "accepted": false, "duplicate": true })),
            ))
        },
    }
}
