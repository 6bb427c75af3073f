/// In-process document container
///
/// Holds documents in a mutex-guarded map. Every call can be slowed down by a
/// fixed latency to imitate a network round trip, which is how tests force
/// concurrent callers to interleave and how backend timeouts are exercised.

use super::{
    document_id, document_type, BackendError, DocumentBackend, DocumentQuery, SortOrder,
    VersionToken,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug)]
struct Entry {
    doc: Value,
    etag: VersionToken,
    seq: u64,
}

#[derive(Debug, Default)]
struct Container {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

impl Container {
    fn allocate_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Mutex-guarded map keyed by document id
#[derive(Debug, Default)]
pub struct MemoryBackend {
    container: Mutex<Container>,
    latency: Duration,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches the container
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            container: Mutex::new(Container::default()),
            latency,
        }
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.container.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, doc: Value) -> Result<VersionToken, BackendError> {
        let id = document_id(&doc)?;
        self.round_trip().await;
        let mut container = self.container.lock().await;
        if container.entries.contains_key(&id) {
            return Err(BackendError::AlreadyExists { id });
        }
        let etag = VersionToken::fresh();
        let seq = container.allocate_seq();
        container.entries.insert(
            id,
            Entry {
                doc,
                etag: etag.clone(),
                seq,
            },
        );
        Ok(etag)
    }

    async fn upsert(&self, doc: Value) -> Result<VersionToken, BackendError> {
        let id = document_id(&doc)?;
        self.round_trip().await;
        let mut container = self.container.lock().await;
        let etag = VersionToken::fresh();
        // Replacing keeps the creation sequence so recency ordering is stable.
        let seq = match container.entries.get(&id) {
            Some(existing) => existing.seq,
            None => container.allocate_seq(),
        };
        container.entries.insert(
            id,
            Entry {
                doc,
                etag: etag.clone(),
                seq,
            },
        );
        Ok(etag)
    }

    async fn read(
        &self,
        partition_key: &str,
        id: &str,
    ) -> Result<(Value, VersionToken), BackendError> {
        self.round_trip().await;
        let container = self.container.lock().await;
        match container.entries.get(id) {
            Some(entry) if partition_key == id => Ok((entry.doc.clone(), entry.etag.clone())),
            _ => Err(BackendError::NotFound { id: id.to_string() }),
        }
    }

    async fn conditional_replace(
        &self,
        doc: Value,
        expected: &VersionToken,
    ) -> Result<VersionToken, BackendError> {
        let id = document_id(&doc)?;
        self.round_trip().await;
        let mut container = self.container.lock().await;
        let entry = container
            .entries
            .get_mut(&id)
            .ok_or_else(|| BackendError::NotFound { id: id.clone() })?;
        if &entry.etag != expected {
            return Err(BackendError::VersionConflict { id });
        }
        let etag = VersionToken::fresh();
        entry.doc = doc;
        entry.etag = etag.clone();
        Ok(etag)
    }

    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), BackendError> {
        self.round_trip().await;
        let mut container = self.container.lock().await;
        if partition_key != id || container.entries.remove(id).is_none() {
            return Err(BackendError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Value>, BackendError> {
        self.round_trip().await;
        let container = self.container.lock().await;
        let mut matching: Vec<&Entry> = container
            .entries
            .values()
            .filter(|entry| document_type(&entry.doc) == query.doc_type)
            .collect();
        match query.order {
            SortOrder::CreatedDesc => matching.sort_by(|a, b| b.seq.cmp(&a.seq)),
            SortOrder::CreatedAsc => matching.sort_by(|a, b| a.seq.cmp(&b.seq)),
        }
        Ok(matching.into_iter().map(|entry| entry.doc.clone()).collect())
    }
}
