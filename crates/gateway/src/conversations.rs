//! Conversation listing, history, outbound sends, and read state.

use {
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
    },
    serde::Deserialize,
};

use switchboard_common::types::{Conversation, DeliveryStatus, Message, Sender};
use switchboard_store::ConversationFilter;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub channel_id: Option<String>,
    pub unread_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Conversation>> {
    let filter = ConversationFilter {
        channel_id: query.channel_id,
        unread_only: query.unread_only,
        ai_disabled: None,
    };
    Json(state.store.list(&filter).await)
}

pub async fn messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    state
        .store
        .messages(&conversation_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("unknown conversation: {conversation_id}")))
}

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    pub content: String,
    /// Id of the human agent sending the reply, for attribution.
    #[serde(default)]
    pub sender_id: Option<String>,
}

/// A human reply. Flips the conversation to manual handling.
pub async fn send(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state
        .router
        .send_outbound(
            &conversation_id,
            &body.content,
            Sender::Agent,
            body.sender_id.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.mark_read(&conversation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_ai(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.router.enable_auto_reply(&conversation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct UpdateDelivery {
    pub status: DeliveryStatus,
}

/// Advance a message's delivery status. Regressions are ignored.
pub async fn update_delivery(
    State(state): State<AppState>,
    Path((conversation_id, message_id)): Path<(String, String)>,
    Json(body): Json<UpdateDelivery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let advanced = state
        .store
        .update_delivery_status(&conversation_id, &message_id, body.status)
        .await?;
    Ok(Json(serde_json::json!({ "advanced": advanced })))
}
