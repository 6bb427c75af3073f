/// Project store error taxonomy
///
/// The store returns these and never logs; the HTTP layer maps them to status codes.

use crate::storage::BackendError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or malformed caller input. Not retried.
    #[error("{0}")]
    Validation(String),

    /// No project with this id (or the stored document is not a usable project).
    #[error("project not found: {id}")]
    NotFound { id: String },

    /// Strict create against an id that already exists.
    #[error("project already exists: {id}")]
    Conflict { id: String },

    /// The compare-and-swap loop ran out of attempts.
    #[error("project {id} kept changing underneath {attempts} write attempts")]
    Concurrency { id: String, attempts: usize },

    /// Timeout or transient backend failure; safe for the caller to retry.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A listed project document could not be decoded.
    #[error("stored project {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("backend error: {0}")]
    Backend(#[source] BackendError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for failures a caller may reasonably retry as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Concurrency { .. })
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { id } => StoreError::NotFound { id },
            BackendError::AlreadyExists { id } => StoreError::Conflict { id },
            BackendError::Unavailable(reason) => StoreError::BackendUnavailable(reason),
            other => StoreError::Backend(other),
        }
    }
}
