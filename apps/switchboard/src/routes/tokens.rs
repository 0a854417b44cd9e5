use axum::{extract::State, Json};
use serde::Deserialize;

use crate::state::{AppState, RoomGrant};

use super::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub user_name: String,
    pub room_name: String,
}

/// POST /create-token - Credential a user for the main room of a call.
pub async fn create_token(
    State(state): State<AppState>,
    Json(payload): Json<CreateTokenRequest>,
) -> ApiResult<RoomGrant> {
    let user = payload.user_name.trim();
    let room = payload.room_name.trim();
    if user.len() < 3 || user.len() > 30 {
        return Err(ApiError::BadRequest(
            "userName must be between 3 and 30 characters".into(),
        ));
    }
    if room.len() < 3 || room.len() > 50 {
        return Err(ApiError::BadRequest(
            "roomName must be between 3 and 50 characters".into(),
        ));
    }
    let grant = state.issue_user_token(room, user)?;
    Ok(Json(grant))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTokenRequest {
    pub room_name: String,
}

/// POST /agent-token - Credential an agent for whichever room needs one.
pub async fn agent_token(
    State(state): State<AppState>,
    Json(payload): Json<AgentTokenRequest>,
) -> ApiResult<RoomGrant> {
    let room = payload.room_name.trim();
    if room.is_empty() {
        return Err(ApiError::BadRequest("roomName must not be empty".into()));
    }
    let grant = state.issue_agent_token(room).await?;
    Ok(Json(grant))
}
