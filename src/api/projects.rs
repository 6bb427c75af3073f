/// Project management REST API endpoints
///
/// CRUD over QR projects. Handlers only translate between JSON and the project
/// store; validation, id assignment and conflict handling live in the store.

use crate::api::error::ApiError;
use crate::project::{Customization, NewProject, Project, ProjectPatch, ProjectStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};

/// Application state containing shared resources
#[derive(Clone, Debug)]
pub struct AppState {
    /// Project store, constructed once at startup
    pub store: ProjectStore,
}

/// Create project management routes
pub fn create_project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", post(create_project).get(list_projects))
        .route("/api/save-project", post(save_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/{id}/customize", put(customize_project))
        // Read-only aliases kept for links printed by older clients
        .route("/api/save-project/{id}", get(get_project))
        .route("/api/customize/{id}", get(get_project))
}

/// Create a new project, failing if the id is taken
///
/// POST /api/projects
/// Body: { "name": "...", "text": "...", "time": "...", "qrImage": "..." }
async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.store.create(input).await?;
    tracing::info!("🆕 Created project: {} ({})", project.id, project.name);
    Ok((StatusCode::CREATED, Json(project)))
}

/// Create or replace a project (scan count is carried over)
///
/// POST /api/save-project
async fn save_project(
    State(state): State<AppState>,
    Json(input): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.store.save(input).await?;
    tracing::info!("💾 Saved project: {} ({})", project.id, project.name);
    Ok((StatusCode::CREATED, Json(project)))
}

/// List all projects, newest first
///
/// GET /api/projects
/// Returns: { "projects": [ ... ] }
async fn list_projects(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let projects = state.store.list_projects().await?;
    Ok(Json(json!({ "projects": projects })))
}

/// GET /api/projects/{id}
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.store.get(&id).await?))
}

/// Replace name and text
///
/// PUT /api/projects/{id}
/// Body: { "name": "...", "text": "..." }
async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, ApiError> {
    let project = state.store.update(&id, patch).await?;
    tracing::info!("✏️ Updated project: {} ({})", project.id, project.name);
    Ok(Json(project))
}

/// Change QR and background colours
///
/// PUT /api/projects/{id}/customize
/// Body: { "qrColor": "#112233", "bgColor": "#ffffff" }
async fn customize_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(custom): Json<Customization>,
) -> Result<Json<Project>, ApiError> {
    let project = state.store.customize(&id, custom).await?;
    tracing::info!("🎨 Customized project: {}", project.id);
    Ok(Json(project))
}

/// DELETE /api/projects/{id}
async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete(&id).await?;
    tracing::info!("🗑️ Deleted project: {}", id);
    Ok(Json(json!({ "message": format!("Project '{}' deleted successfully", id) })))
}
