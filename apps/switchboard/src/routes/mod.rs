mod sse;
mod tokens;
mod transfers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::registry::RegistryError;
use crate::state::{AppState, TransferError};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/create-token", post(tokens::create_token))
        .route("/agent-token", post(tokens::agent_token))
        .route("/start-warm-transfer", post(transfers::start_warm_transfer))
        .route("/complete-transfer", post(transfers::complete_transfer))
        .route(
            "/warm-transfer-status/:room",
            get(transfers::warm_transfer_status),
        )
        .route("/subscribe-transfer/:identity", get(sse::subscribe_transfer))
        .route("/subscribe-room/:room", get(sse::subscribe_room))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ApiErrorBody {
                    error: "bad_request",
                    message,
                }),
            )
                .into_response(),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody {
                    error: "internal",
                    message,
                }),
            )
                .into_response(),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::NoPendingTransfer => ApiError::BadRequest(err.to_string()),
            TransferError::Token(_) | TransferError::Directory(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
