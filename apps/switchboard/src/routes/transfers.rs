use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::state::{AppState, CompletedTransfer, StartedTransfer, TransferStatus};

use super::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWarmTransferRequest {
    pub room_name: String,
    #[serde(default)]
    pub agent_identity: Option<String>,
}

/// POST /start-warm-transfer - Open the support room and credential the
/// requesting agent for it.
pub async fn start_warm_transfer(
    State(state): State<AppState>,
    Json(payload): Json<StartWarmTransferRequest>,
) -> ApiResult<StartedTransfer> {
    if payload.room_name.trim().is_empty() {
        return Err(ApiError::BadRequest("roomName must not be empty".into()));
    }
    let started =
        state.start_warm_transfer(&payload.room_name, payload.agent_identity.as_deref())?;
    Ok(Json(started))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransferRequest {
    pub room_name: String,
}

/// POST /complete-transfer - Move the main room's users to the support room.
pub async fn complete_transfer(
    State(state): State<AppState>,
    Json(payload): Json<CompleteTransferRequest>,
) -> ApiResult<CompletedTransfer> {
    if payload.room_name.trim().is_empty() {
        return Err(ApiError::BadRequest("roomName must not be empty".into()));
    }
    let completed = state.complete_transfer(&payload.room_name).await?;
    Ok(Json(completed))
}

/// GET /warm-transfer-status/{room}
pub async fn warm_transfer_status(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> ApiResult<TransferStatus> {
    Ok(Json(state.warm_transfer_status(&room)))
}
