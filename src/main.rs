/// qrtrack server entry point
///
/// Loads configuration from the environment and starts the HTTP server.

use qrtrack::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Project management API at /api/projects/* and /api/save-project
/// - Scan tracking redirect at /api/track/{id}
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:5000 and data/projects.db)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
