pub mod advisor; // Generative-model wrappers (OCR, summaries, diet and meal plans)
pub mod api; // HTTP router, endpoints, server lifecycle
pub mod config;
pub mod core_state; // Shared application state
pub mod db;
pub mod geo;
pub mod hospitals; // Hospital Locator + place-search providers
pub mod models;
pub mod notify; // Notification Gateway + SMS providers
pub mod reminders; // Reminder service + scheduler
pub mod sos; // Two-phase SOS orchestrator

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;

/// Load `.env`, install logging, and serve until Ctrl-C.
pub async fn run() -> Result<(), String> {
    // Load .env before the subscriber so RUST_LOG can come from it.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    match &dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("Could not read .env file: {e}"),
    }

    serve(AppConfig::from_env()).await
}

/// Start the API server and run until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<(), String> {
    let addr = config.socket_addr();
    let core = Arc::new(CoreState::from_config(config).map_err(|e| e.to_string())?);
    core.log_startup_summary();

    let server = api::start_server(core.clone(), addr).await?;
    tracing::info!(addr = %server.info.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    server.stop().await;

    // Pending timers die with the runtime; they are not restored on restart.
    let abandoned = core.reminders.scheduler().total_pending();
    if abandoned > 0 {
        tracing::warn!(abandoned, "Shutting down with pending reminder jobs");
    }
    Ok(())
}
