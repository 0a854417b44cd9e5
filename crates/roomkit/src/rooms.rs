use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::token::{TokenError, TokenMinter};

const SERVICE_TOKEN_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum RoomServiceError {
    #[error("room service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("room service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParticipantInfo {
    pub sid: String,
    pub identity: String,
    pub name: String,
}

impl ParticipantInfo {
    /// Identity to address this participant by: the registered identity,
    /// falling back to the display name and then the server-assigned sid.
    pub fn effective_identity(&self) -> &str {
        if !self.identity.is_empty() {
            &self.identity
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.sid
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParticipantsResponse {
    participants: Vec<ParticipantInfo>,
}

/// Twirp-style client for the media server's RoomService endpoints, using a
/// per-call admin token scoped to the room in question.
#[derive(Clone)]
pub struct RoomServiceClient {
    http: Client,
    base_url: String,
    minter: TokenMinter,
}

impl RoomServiceClient {
    pub fn new(url: &str, minter: TokenMinter) -> Self {
        Self {
            http: Client::new(),
            base_url: http_base_url(url),
            minter,
        }
    }

    pub async fn list_participants(
        &self,
        room: &str,
    ) -> Result<Vec<ParticipantInfo>, RoomServiceError> {
        let response = self
            .call("ListParticipants", room, &serde_json::json!({ "room": room }))
            .await?;
        let listing: ListParticipantsResponse = response.json().await?;
        debug!(room, participants = listing.participants.len(), "listed room participants");
        Ok(listing.participants)
    }

    /// Create-if-absent; the service treats an existing room as success.
    pub async fn create_room(&self, room: &str) -> Result<(), RoomServiceError> {
        self.call("CreateRoom", room, &serde_json::json!({ "name": room }))
            .await?;
        debug!(room, "ensured room exists");
        Ok(())
    }

    async fn call(
        &self,
        method: &str,
        room: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, RoomServiceError> {
        let token = self.minter.admin_token(room, SERVICE_TOKEN_TTL)?;
        let url = format!("{}/twirp/livekit.RoomService/{method}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RoomServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

/// Media server URLs are usually advertised with a websocket scheme; the room
/// service speaks HTTP on the same host.
pub fn http_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("ws://") {
        format!("http://{rest}")
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_schemes_rewrite_to_http() {
        assert_eq!(http_base_url("wss://media.example.com"), "https://media.example.com");
        assert_eq!(http_base_url("ws://localhost:7880/"), "http://localhost:7880");
        assert_eq!(http_base_url("https://media.example.com/"), "https://media.example.com");
        assert_eq!(http_base_url("media.example.com"), "https://media.example.com");
    }

    #[test]
    fn effective_identity_falls_back_through_name_and_sid() {
        let full = ParticipantInfo {
            sid: "PA_1".into(),
            identity: "carol".into(),
            name: "Carol".into(),
        };
        assert_eq!(full.effective_identity(), "carol");

        let named = ParticipantInfo {
            sid: "PA_2".into(),
            name: "Carol".into(),
            ..ParticipantInfo::default()
        };
        assert_eq!(named.effective_identity(), "Carol");

        let bare = ParticipantInfo {
            sid: "PA_3".into(),
            ..ParticipantInfo::default()
        };
        assert_eq!(bare.effective_identity(), "PA_3");
    }
}
