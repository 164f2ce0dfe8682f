//! Z-Ledger Service - internal HTTP API for entitlements and credits
//!
//! This is the main entry point for the z-ledger service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use z_ledger_service::{
    build_engine, create_router, spawn_background_tasks, AppState, ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,z_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Z-Ledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        store_backend = ?config.store_backend,
        data_dir = %config.data_dir,
        commit_timeout_ms = config.commit_timeout_ms,
        day_offset_minutes = config.day_offset_minutes,
        notifications_configured = %config.notification_webhook_url.is_some(),
        "Service configuration loaded"
    );

    let engine = Arc::new(build_engine(&config)?);

    // Build app state
    let state = AppState::new(engine, config.clone());
    spawn_background_tasks(&state);

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
