use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bizops_api::{build_router, config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up BACKEND_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting BizOps API in {:?} mode", config.environment);
    if !config.facebook.is_configured() {
        tracing::warn!("Facebook app credentials missing; /api/facebook/callback will report an error");
    }
    if !config.zalo.is_configured() {
        tracing::warn!("Zalo app credentials missing; /api/zalo/callback will report an error");
    }

    let port = config.server.port;
    let state = AppState::from_config(config).await.context("initializing application state")?;
    let app = build_router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("BizOps API listening on http://{}", bind_addr);

    // Peer addresses feed the per-client rate limiter when no proxy header is present
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
