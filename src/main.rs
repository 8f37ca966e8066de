mod api;
mod config;
mod error;
mod services;
mod session;
mod state;
mod views;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    if config.gemini.has_credential() {
        tracing::info!(model = %config.gemini.model, "Using Google Gemini model");
    } else {
        tracing::warn!(
            "No valid Gemini API key configured (set PALM__GEMINI__API_KEY); \
             the server will start but palm readings will fail"
        );
    }

    services::uploads::ensure_storage_dir(&config.uploads.dir).await?;
    tracing::info!(dir = %config.uploads.dir.display(), "Upload directory ready");

    let state = AppState::new(config.clone());

    let app = api::router(&state)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
