//! AI agent profile endpoints.

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    },
    serde::Deserialize,
    tracing::info,
};

use switchboard_auto_reply::AgentProfile;

use crate::{error::ApiError, state::AppState};

/// List agents with their current channel assignments. The channel store is
/// authoritative for `channel_ids`, so it is joined in here rather than
/// mirrored on write.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<AgentProfile>>, ApiError> {
    let channels = state.channels.list().await?;
    let mut agents = state.agents.list();
    for agent in &mut agents {
        agent.channel_ids = channels
            .iter()
            .filter(|c| c.assigned_agent_id.as_deref() == Some(agent.id.as_str()))
            .map(|c| c.id.clone())
            .collect();
    }
    Ok(Json(agents))
}

#[derive(Debug, Deserialize)]
pub struct CreateAgent {
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub prompt: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateAgent>,
) -> (StatusCode, Json<AgentProfile>) {
    let agent = AgentProfile::new(&body.name, &body.provider, &body.model, &body.prompt);
    info!(agent_id = %agent.id, name = %agent.name, "agent created");
    state.agents.upsert(agent.clone());
    (StatusCode::CREATED, Json(agent))
}

/// Delete an agent. Channel assignments pointing at it are cleared in the
/// same operation, so no later inbound can route to it.
pub async fn remove(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.agents.delete(&agent_id, state.channels.as_ref()).await?;
    info!(agent_id, "agent deleted");
    Ok(StatusCode::NO_CONTENT)
}
