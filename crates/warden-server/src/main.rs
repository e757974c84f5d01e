//! Warden server entry point.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use warden_auth::AuthService;
use warden_db::DbManager;
use warden_server::Settings;
use warden_server::config::DEFAULT_CONFIG_FILE;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("WARDEN_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
    let settings = Settings::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .json()
        .init();

    tracing::info!(config = %config_path, "Starting Warden server");

    let db = DbManager::connect(&settings.db)
        .await
        .context("connecting to SurrealDB")?;

    let service = AuthService::new(db.identities(), db.sessions(), settings.auth.clone())?;
    let app = warden_server::router(Arc::new(service));

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Warden server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
