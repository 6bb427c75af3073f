/// qrtrack: project storage and scan tracking for QR code generation
///
/// Persists QR projects in a document store and counts scans through a
/// redirect endpoint, with conflict-safe counter updates.

// Core configuration and setup
pub mod config;

// Document storage layer - backend trait, SQLite and in-memory containers
pub mod storage;

// Project model and store - CRUD, upserts, compare-and-swap scan counter
pub mod project;

// HTTP API layer - REST endpoints and the tracking redirect
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use project::{NewProject, Project, ProjectStore, StoreError};
pub use server::{create_app, create_router, start_server};
pub use storage::{DocumentBackend, MemoryBackend, SqliteBackend};
