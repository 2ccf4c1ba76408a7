//! Bastion Server: application entry point.

use std::net::SocketAddr;

use anyhow::Context;
use bastion_db::DbManager;
use bastion_server::{AppState, ServerConfig, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bastion=info".parse()?))
        .json()
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;
    tracing::info!(bind = %config.bind_addr, "Starting Bastion server");

    let db = DbManager::connect(&config.db)
        .await
        .context("connecting to SurrealDB")?;
    bastion_db::run_migrations(db.client())
        .await
        .context("running migrations")?;

    let state = AppState::new(db.client().clone(), config.auth.clone())
        .context("building application state")?;
    let app = router(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Bastion server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
    }
}
