//! Channel management and pairing endpoints.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    serde::Deserialize,
    tracing::info,
};

use switchboard_common::types::{Channel, ChannelType};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default = "default_true")]
    pub auto_reply: bool,
    #[serde(default)]
    pub agent_id: Option<String>,
}

fn default_true() -> bool {
    true
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Channel>>, ApiError> {
    Ok(Json(state.channels.list().await?))
}

/// Create a channel and bring its connection up. The response carries the
/// pairing handle when the channel authenticates by QR scan.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateChannel>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if let Some(agent_id) = &body.agent_id
        && state.agents.get(agent_id).is_none()
    {
        return Err(ApiError::not_found(format!("unknown agent: {agent_id}")));
    }

    let mut channel = Channel::new(&body.name, body.channel_type);
    channel.auto_reply_enabled = body.auto_reply;
    channel.assigned_agent_id = body.agent_id.clone();
    let channel_id = channel.id.clone();
    state.channels.upsert(channel).await?;

    let pairing = state.registry.start(&channel_id).await?;
    info!(channel_id, channel_type = %body.channel_type, "channel created");

    let channel = state
        .channels
        .get(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("unknown channel: {channel_id}")))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "channel": channel, "pairing": pairing })),
    ))
}

/// Tear the connection down and delete the channel configuration.
pub async fn remove(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .channels
        .get(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("unknown channel: {channel_id}")))?;
    state.registry.remove(&channel_id).await?;
    state.channels.delete(&channel_id).await?;
    info!(channel_id, "channel removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn status(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let channel = state
        .channels
        .get(&channel_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("unknown channel: {channel_id}")))?;
    let live = state.registry.get(&channel_id).await.is_some();
    Ok(Json(serde_json::json!({
        "id": channel.id,
        "status": channel.status,
        "last_activity_at": channel.last_activity_at,
        "live": live,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AssignAgent {
    /// `null` clears the assignment.
    pub agent_id: Option<String>,
}

pub async fn assign_agent(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<AssignAgent>,
) -> Result<StatusCode, ApiError> {
    if let Some(agent_id) = &body.agent_id
        && state.agents.get(agent_id).is_none()
    {
        return Err(ApiError::not_found(format!("unknown agent: {agent_id}")));
    }
    state.channels.assign_agent(&channel_id, body.agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetAutoReply {
    pub enabled: bool,
}

pub async fn set_auto_reply(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<SetAutoReply>,
) -> Result<StatusCode, ApiError> {
    state.channels.set_auto_reply(&channel_id, body.enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pairing_token(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<switchboard_channels::PairingHandle>, ApiError> {
    let connection = state
        .registry
        .get(&channel_id)
        .await
        .ok_or_else(|| ApiError::conflict(format!("channel not connected: {channel_id}")))?;
    let pairing = connection
        .pairing()
        .ok_or_else(|| ApiError::bad_request("channel does not support pairing"))?;
    Ok(Json(pairing.pairing_token().await?))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPairing {
    pub token: String,
}

pub async fn confirm_pairing(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<ConfirmPairing>,
) -> Result<StatusCode, ApiError> {
    let connection = state
        .registry
        .get(&channel_id)
        .await
        .ok_or_else(|| ApiError::conflict(format!("channel not connected: {channel_id}")))?;
    let pairing = connection
        .pairing()
        .ok_or_else(|| ApiError::bad_request("channel does not support pairing"))?;
    pairing.confirm(&body.token).await?;
    Ok(StatusCode::NO_CONTENT)
}
