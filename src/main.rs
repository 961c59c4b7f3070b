use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use moveeasy::api::{build_router, AppState};
use moveeasy::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    moveeasy::init_tracing();
    let config = ServerConfig::parse();

    let state = AppState::from_config(&config).context("invalid configuration")?;
    info!(
        vehicles = state.simulator.vehicles().len(),
        loop_seconds = state.simulator.period(),
        store = state.store.is_available(),
        require_auth = state.require_auth,
        "Starting MoveEasy API"
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;

    info!("Server is running on http://{}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
