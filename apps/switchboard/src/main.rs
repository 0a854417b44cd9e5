mod config;
mod livekit;
mod registry;
mod routes;
mod state;
mod store;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use roomkit::{RoomServiceClient, TokenMinter};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};

use crate::{config::Config, routes::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::from_env()?;
    let minter = TokenMinter::new(cfg.livekit_api_key.clone(), cfg.livekit_api_secret.clone());
    let rooms = RoomServiceClient::new(&cfg.livekit_url, minter.clone());

    let state = AppState::new(Arc::new(minter), Arc::new(rooms))
        .with_token_ttls(
            Duration::from_secs(cfg.user_token_ttl_seconds),
            Duration::from_secs(cfg.support_token_ttl_seconds),
        )
        .with_sse_keepalive(Duration::from_secs(cfg.sse_keepalive_seconds));

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!(
        "switchboard listening on {addr}, media service at {}",
        cfg.livekit_url
    );
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
