/// Server setup and initialization
///
/// Wires together the document backend, the project store, and HTTP routes.
/// The store is built once here and handed to the router state; nothing is global.

use crate::{
    api::{create_project_routes, create_tracking_routes, AppState},
    config::{BackendKind, Config},
    project::ProjectStore,
    storage::{DocumentBackend, MemoryBackend, SqliteBackend},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application from configuration
///
/// Opens the configured backend and builds the project store around it.
pub async fn create_app(config: Config) -> Result<Router> {
    let backend: Arc<dyn DocumentBackend> = match config.database.backend {
        BackendKind::Sqlite => {
            tracing::info!("📁 Ensuring data directory exists: {}", config.database.data_dir);
            std::fs::create_dir_all(&config.database.data_dir)
                .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

            let path = config.database.sqlite_path();
            tracing::info!("🗄️ Opening project database: {}", path.display());
            let backend = SqliteBackend::connect(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open project database: {}", e))?;
            Arc::new(backend)
        }
        BackendKind::Memory => {
            tracing::warn!("🧪 Using in-memory backend, projects are lost on restart");
            Arc::new(MemoryBackend::new())
        }
    };

    let settings = config.store.settings();
    tracing::info!(
        "⚙️ Project store: timeout {:?}, {} write attempts",
        settings.backend_timeout,
        settings.retry.max_attempts
    );
    let store = ProjectStore::new(backend, settings);

    let app = create_router(store);
    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Build the HTTP router around an already constructed store
pub fn create_router(store: ProjectStore) -> Router {
    let state = AppState { store };

    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Project management API routes
        .merge(create_project_routes())
        // Scan tracking routes
        .merge(create_tracking_routes())
        .with_state(state)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting qrtrack server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
