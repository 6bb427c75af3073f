/// Project store
///
/// The only owner of project documents. Every backend call is bounded by a
/// timeout, and every write to an existing document (update, customise, upsert,
/// scan increment) goes through one compare-and-swap loop keyed on the backend's
/// version token, so concurrent scans are never lost to a read-modify-write race.

use crate::project::error::{StoreError, StoreResult};
use crate::project::types::{Customization, NewProject, Project, ProjectPatch, PROJECT_TYPE};
use crate::storage::{
    document_type, BackendError, DocumentBackend, DocumentQuery, SortOrder, VersionToken,
};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Bounded retry schedule for version conflicts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): exponential, capped, jittered into [d/2, d]
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let ceiling = self
            .base_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let millis = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
        Duration::from_millis(millis)
    }
}

/// Store behaviour knobs
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Upper bound for any single backend call
    pub backend_timeout: Duration,
    pub retry: RetryPolicy,
    /// Reject creates and saves that carry no rendered image
    pub require_qr_image: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            require_qr_image: false,
        }
    }
}

/// Project CRUD and scan tracking on top of a document backend
#[derive(Clone)]
pub struct ProjectStore {
    backend: Arc<dyn DocumentBackend>,
    settings: StoreSettings,
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore")
            .field("backend", &self.backend.backend_tag())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ProjectStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, settings: StoreSettings) -> Self {
        Self { backend, settings }
    }

    pub fn with_defaults(backend: Arc<dyn DocumentBackend>) -> Self {
        Self::new(backend, StoreSettings::default())
    }

    /// Strict create: assigns an id when none is given, fails on an existing id
    pub async fn create(&self, input: NewProject) -> StoreResult<Project> {
        input
            .validate(self.settings.require_qr_image)
            .map_err(StoreError::Validation)?;
        let id = input.id.clone().unwrap_or_else(generate_id);
        let project = input.into_project(id);

        self.bounded("create", self.backend.create(to_document(&project)?))
            .await?;
        Ok(project)
    }

    /// Upsert: create, or replace an existing project while keeping its scan count
    pub async fn save(&self, input: NewProject) -> StoreResult<Project> {
        input
            .validate(self.settings.require_qr_image)
            .map_err(StoreError::Validation)?;
        let id = input.id.clone().unwrap_or_else(generate_id);
        let mut project = input.into_project(id.clone());

        let attempts = self.max_attempts();
        for attempt in 1..=attempts {
            let written = match self.bounded("read", self.backend.read(&id, &id)).await {
                Ok((existing, token)) => {
                    if document_type(&existing) != PROJECT_TYPE {
                        return Err(StoreError::Conflict { id: id.clone() });
                    }
                    project.scan_count = scan_count_of(&existing);
                    self.bounded(
                        "replace",
                        self.backend
                            .conditional_replace(to_document(&project)?, &token),
                    )
                    .await
                }
                Err(BackendError::NotFound { .. }) => {
                    project.scan_count = 0;
                    self.bounded("create", self.backend.create(to_document(&project)?))
                        .await
                }
                Err(e) => return Err(e.into()),
            };

            match written {
                Ok(_) => return Ok(project),
                // Someone else created, changed or removed it in between; start over.
                Err(
                    BackendError::VersionConflict { .. }
                    | BackendError::AlreadyExists { .. }
                    | BackendError::NotFound { .. },
                ) => self.pause(attempt, attempts).await,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Concurrency { id, attempts })
    }

    pub async fn get(&self, id: &str) -> StoreResult<Project> {
        let (project, _) = self.read_project(id).await?;
        Ok(project)
    }

    /// Every document with the given discriminator, newest first by default
    pub async fn list_by_type(&self, doc_type: &str, order: SortOrder) -> StoreResult<Vec<Project>> {
        let query = DocumentQuery::by_type(doc_type, order);
        let docs = self.bounded("query", self.backend.query(&query)).await?;

        docs.into_iter()
            .filter(|doc| document_type(doc) == doc_type)
            .map(|doc| {
                let id = doc
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown>")
                    .to_string();
                serde_json::from_value::<Project>(doc).map_err(|e| StoreError::Corrupt {
                    id,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    pub async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        self.list_by_type(PROJECT_TYPE, SortOrder::default()).await
    }

    /// Replace name and text, refreshing `time`; id, type and scan count are untouched
    pub async fn update(&self, id: &str, patch: ProjectPatch) -> StoreResult<Project> {
        patch.validate().map_err(StoreError::Validation)?;
        self.modify(id, |project| {
            project.name = patch.name.clone();
            project.text = patch.text.clone();
            project.time = now_timestamp();
        })
        .await
    }

    /// Replace the QR and background colours
    pub async fn customize(&self, id: &str, custom: Customization) -> StoreResult<Project> {
        custom.validate().map_err(StoreError::Validation)?;
        self.modify(id, |project| custom.apply(project)).await
    }

    /// Remove a project; unknown ids and documents of another type are `NotFound`
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let (doc, _) = self.bounded("read", self.backend.read(id, id)).await?;
        if document_type(&doc) != PROJECT_TYPE {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        self.bounded("delete", self.backend.delete(id, id)).await?;
        Ok(())
    }

    /// Count one scan and return the text to redirect to
    pub async fn increment_scan_count(&self, id: &str) -> StoreResult<String> {
        let project = self
            .modify(id, |project| {
                project.scan_count = project.scan_count.saturating_add(1);
            })
            .await?;
        Ok(project.text)
    }

    /// Current scan count, 0 for documents that never recorded one
    pub async fn get_scan_count(&self, id: &str) -> StoreResult<u64> {
        let (doc, _) = self.bounded("read", self.backend.read(id, id)).await?;
        if document_type(&doc) != PROJECT_TYPE {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(scan_count_of(&doc))
    }

    /// Read-apply-conditional-write, retried on version conflicts
    async fn modify<F>(&self, id: &str, mut apply: F) -> StoreResult<Project>
    where
        F: FnMut(&mut Project) + Send,
    {
        let attempts = self.max_attempts();
        for attempt in 1..=attempts {
            let (mut project, token) = self.read_project(id).await?;
            apply(&mut project);

            let replaced = self
                .bounded(
                    "replace",
                    self.backend
                        .conditional_replace(to_document(&project)?, &token),
                )
                .await;
            match replaced {
                Ok(_) => return Ok(project),
                Err(BackendError::VersionConflict { .. }) => self.pause(attempt, attempts).await,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Concurrency {
            id: id.to_string(),
            attempts,
        })
    }

    /// Fetch and decode; missing, foreign or malformed documents are `NotFound`
    async fn read_project(&self, id: &str) -> StoreResult<(Project, VersionToken)> {
        let (doc, token) = self.bounded("read", self.backend.read(id, id)).await?;
        if document_type(&doc) != PROJECT_TYPE {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        let project = serde_json::from_value::<Project>(doc)
            .map_err(|_| StoreError::NotFound { id: id.to_string() })?;
        Ok((project, token))
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        let limit = self.settings.backend_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Unavailable(format!(
                "{} on {} backend timed out after {}ms",
                op,
                self.backend.backend_tag(),
                limit.as_millis()
            ))),
        }
    }

    async fn pause(&self, attempt: usize, attempts: usize) {
        if attempt < attempts {
            tokio::time::sleep(self.settings.retry.backoff(attempt)).await;
        }
    }

    fn max_attempts(&self) -> usize {
        self.settings.retry.max_attempts.max(1)
    }
}

fn to_document(project: &Project) -> StoreResult<Value> {
    serde_json::to_value(project)
        .map_err(|e| StoreError::Backend(BackendError::Rejected(e.to_string())))
}

fn scan_count_of(doc: &Value) -> u64 {
    doc.get("scanCount").and_then(Value::as_u64).unwrap_or(0)
}

/// `<unix-millis>-<9 base36 chars>`
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// RFC 3339 with millisecond precision and a `Z` suffix
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
