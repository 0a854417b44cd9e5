use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("api credentials are not configured")]
    MissingCredentials,
}

/// Room-scoped permissions carried in the `video` claim. Unset options are
/// omitted from the wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_publish: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_subscribe: Option<bool>,
}

impl VideoGrant {
    /// Grant letting `identity` join `room` as a full publishing participant.
    pub fn join(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            room_join: Some(true),
            can_publish: Some(true),
            can_subscribe: Some(true),
            ..Self::default()
        }
    }

    /// Grant for server-side room service calls scoped to `room`.
    pub fn admin(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            room_admin: Some(true),
            room_create: Some(true),
            room_list: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    nbf: i64,
    exp: i64,
    video: VideoGrant,
}

/// Signs HS256 access tokens for the media server. `iss` is the API key, the
/// grant rides in the `video` claim.
#[derive(Clone)]
pub struct TokenMinter {
    api_key: String,
    api_secret: String,
}

impl TokenMinter {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Token permitting `identity` to join `room`, valid for `ttl`.
    pub fn join_token(
        &self,
        room: &str,
        identity: &str,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.mint(identity, VideoGrant::join(room), ttl)
    }

    /// Short-lived token authorizing room service calls for `room`.
    pub fn admin_token(&self, room: &str, ttl: Duration) -> Result<String, TokenError> {
        self.mint(&self.api_key, VideoGrant::admin(room), ttl)
    }

    fn mint(&self, identity: &str, video: VideoGrant, ttl: Duration) -> Result<String, TokenError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(TokenError::MissingCredentials);
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let claims = Claims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            nbf: now,
            exp: now + ttl.as_secs() as i64,
            video,
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )?)
    }
}
