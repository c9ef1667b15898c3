use std::sync::Arc;

use anyhow::Context;
use vete_api::config::AppConfig;
use vete_api::database::DatabaseManager;
use vete_api::revalidate::TracingRevalidator;
use vete_api::{app, init_tracing, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, AUTH_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!("Starting vete-api in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("AUTH_JWT_SECRET must be set");
    }
    if config.security.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET not set; cron endpoints will refuse every request");
    }

    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open appointment store")?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, store, Arc::new(TracingRevalidator));
    state.spawn_background_tasks();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("vete-api listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
