use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub user_token_ttl_seconds: u64,
    pub support_token_ttl_seconds: u64,
    pub sse_keepalive_seconds: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("SWITCHBOARD_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);
        let livekit_url =
            env::var("LIVEKIT_URL").unwrap_or_else(|_| "http://localhost:7880".to_string());
        let livekit_api_key = env::var("LIVEKIT_API_KEY")
            .context("missing required environment variable: LIVEKIT_API_KEY")?;
        let livekit_api_secret = env::var("LIVEKIT_API_SECRET")
            .context("missing required environment variable: LIVEKIT_API_SECRET")?;
        let user_token_ttl_seconds = env::var("USER_TOKEN_TTL")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(600);
        let support_token_ttl_seconds = env::var("SUPPORT_TOKEN_TTL")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(3600);
        let sse_keepalive_seconds = env::var("SSE_KEEPALIVE_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(20);

        Ok(Self {
            port,
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            user_token_ttl_seconds,
            support_token_ttl_seconds,
            sse_keepalive_seconds,
        })
    }
}
