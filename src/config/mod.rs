/// Configuration management for the qrtrack server
///
/// Handles server binding, backend selection, and store tuning. Every value has
/// an environment override for container deployment; unparseable values fall back
/// to the default.

use crate::project::{RetryPolicy, StoreSettings};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Document backend configuration
    pub database: DatabaseConfig,
    /// Project store behaviour
    pub store: StoreConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Which document backend holds the projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `{data_dir}/projects.db`
    Sqlite,
    /// Process memory, lost on restart
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Document backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: BackendKind,
    /// Directory holding the sqlite file (default: "data")
    pub data_dir: String,
}

impl DatabaseConfig {
    pub fn sqlite_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("projects.db")
    }
}

/// Project store tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Timeout for each backend call
    pub backend_timeout_ms: u64,
    /// Compare-and-swap attempts before giving up on a contended project
    pub retry_attempts: usize,
    pub retry_base_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
    /// Require a rendered `qrImage` on create and save
    pub require_qr_image: bool,
}

impl StoreConfig {
    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            backend_timeout: Duration::from_millis(self.backend_timeout_ms),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_backoff_ms: self.retry_base_backoff_ms,
                max_backoff_ms: self.retry_max_backoff_ms,
            },
            require_qr_image: self.require_qr_image,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("QRTRACK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("QRTRACK_PORT", 5000),
            },
            database: DatabaseConfig {
                backend: env_or("QRTRACK_BACKEND", BackendKind::Sqlite),
                data_dir: std::env::var("QRTRACK_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            store: StoreConfig {
                backend_timeout_ms: env_or("QRTRACK_BACKEND_TIMEOUT_MS", 5000),
                retry_attempts: env_or("QRTRACK_RETRY_ATTEMPTS", 5),
                retry_base_backoff_ms: env_or("QRTRACK_RETRY_BASE_MS", 10),
                retry_max_backoff_ms: env_or("QRTRACK_RETRY_MAX_MS", 200),
                require_qr_image: env_or("QRTRACK_REQUIRE_QR_IMAGE", false),
            },
        }
    }
}
