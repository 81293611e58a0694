//! Tea Rotation Service - HTTP API for the team tea rotation
//!
//! This is the main entry point for the tea rotation service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tea_rotation_service::{create_router, AppState, ServiceConfig};
use tea_rotation_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tea_rotation=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tea Rotation Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_url.is_some(),
        jwt_configured = %config.jwt_secret.is_some(),
        candidate_count = config.candidate_count,
        deprioritized = config.deprioritized_user_ids.len(),
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Open the configured store. Falls back to memory when no database is set.
async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres-backend")]
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL store");
            let store =
                tea_rotation_store::PgStore::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres-backend"))]
        Some(_) => Err("DATABASE_URL is set but the postgres-backend feature is disabled".into()),
        None => {
            tracing::warn!("DATABASE_URL not set - using in-memory store, data is not persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
