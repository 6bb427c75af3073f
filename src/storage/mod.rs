/// Document storage layer
///
/// A schemaless document container addressed by id. Project documents are plain
/// JSON objects carrying a string `id` and a `type` discriminator; every write
/// hands back a fresh version token used for optimistic concurrency.
///
/// The container is partitioned by `/id`, so the partition key of a document is
/// always its id.

// SQLite-backed container (default for deployments)
pub mod sqlite;

// In-process container for tests and throwaway runs
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Opaque version identifier assigned by the backend on every write
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    /// Generate a token that has never been handed out before
    pub fn fresh() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordering applied to discriminator queries, by backend-assigned creation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently created first
    #[default]
    CreatedDesc,
    /// Oldest first
    CreatedAsc,
}

/// Collection-scoped query over the `type` discriminator
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    pub doc_type: String,
    pub order: SortOrder,
}

impl DocumentQuery {
    pub fn by_type(doc_type: impl Into<String>, order: SortOrder) -> Self {
        Self {
            doc_type: doc_type.into(),
            order,
        }
    }
}

/// Failures reported by a document backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("document already exists: {id}")]
    AlreadyExists { id: String },

    /// The version token presented with a conditional write is stale.
    #[error("version token is stale for document {id}")]
    VersionConflict { id: String },

    /// The document itself cannot be stored (e.g. it has no string id).
    #[error("document rejected: {0}")]
    Rejected(String),

    /// Timeouts, I/O failures, exhausted pools, locked databases.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Keyed document container consumed by the project store
///
/// Implementations must make each single call atomic: a conditional replace
/// either fully commits with a new token or leaves the document untouched.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Short tag used in diagnostics ("sqlite", "memory")
    fn backend_tag(&self) -> &'static str;

    /// Insert a new document, failing if the id is already taken
    async fn create(&self, doc: Value) -> Result<VersionToken, BackendError>;

    /// Create or fully replace a document
    async fn upsert(&self, doc: Value) -> Result<VersionToken, BackendError>;

    /// Read a document together with its current version token
    async fn read(&self, partition_key: &str, id: &str)
        -> Result<(Value, VersionToken), BackendError>;

    /// Replace a document only if its version token still matches `expected`
    async fn conditional_replace(
        &self,
        doc: Value,
        expected: &VersionToken,
    ) -> Result<VersionToken, BackendError>;

    /// Remove a document, failing with `NotFound` when it does not exist
    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), BackendError>;

    /// All documents with the given discriminator, in the requested order
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Value>, BackendError>;
}

/// Extract the string id of a document
pub(crate) fn document_id(doc: &Value) -> Result<String, BackendError> {
    doc.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BackendError::Rejected("document has no string id".to_string()))
}

/// Extract the discriminator of a document ("" when absent)
pub(crate) fn document_type(doc: &Value) -> String {
    doc.get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
