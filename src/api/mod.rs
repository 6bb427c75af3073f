/// HTTP API Layer
///
/// REST endpoints in front of the project store:
/// - Project CRUD and colour customisation
/// - Scan tracking redirect and scan counters
/// - Store error to status code mapping

// Project management endpoints (POST/GET/PUT/DELETE)
pub mod projects;

// Scan tracking redirect and counters
pub mod tracking;

pub mod error;

// Re-export router builders
pub use error::ApiError;
pub use projects::{create_project_routes, AppState};
pub use tracking::create_tracking_routes;
