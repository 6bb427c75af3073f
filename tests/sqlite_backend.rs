//! SQLite document container
//!
//! Exercises the backend contract directly (create, upsert, conditional replace,
//! delete, query ordering) and runs the project store on top of a real file.

use qrtrack::project::{NewProject, ProjectStore, RetryPolicy, StoreSettings, PROJECT_TYPE};
use qrtrack::storage::{BackendError, DocumentBackend, DocumentQuery, SortOrder, SqliteBackend};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn file_backend(dir: &TempDir) -> SqliteBackend {
    SqliteBackend::connect(&dir.path().join("projects.db"))
        .await
        .unwrap()
}

#[tokio::test]
async fn create_read_and_duplicate() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    let token = backend
        .create(json!({"id": "p1", "type": PROJECT_TYPE, "name": "a"}))
        .await
        .unwrap();

    let (doc, read_token) = backend.read("p1", "p1").await.unwrap();
    assert_eq!(doc["name"], "a");
    assert_eq!(read_token, token);

    let err = backend
        .create(json!({"id": "p1", "type": PROJECT_TYPE, "name": "b"}))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::AlreadyExists { ref id } if id == "p1"));

    assert!(matches!(
        backend.read("nope", "nope").await,
        Err(BackendError::NotFound { .. })
    ));
}

#[tokio::test]
async fn documents_without_id_are_rejected() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    assert!(matches!(
        backend.create(json!({"type": PROJECT_TYPE})).await,
        Err(BackendError::Rejected(_))
    ));
}

#[tokio::test]
async fn conditional_replace_checks_the_token() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    let v1 = backend
        .create(json!({"id": "p1", "type": PROJECT_TYPE, "scanCount": 0}))
        .await
        .unwrap();
    let v2 = backend
        .conditional_replace(json!({"id": "p1", "type": PROJECT_TYPE, "scanCount": 1}), &v1)
        .await
        .unwrap();
    assert_ne!(v1, v2);

    let stale = backend
        .conditional_replace(json!({"id": "p1", "type": PROJECT_TYPE, "scanCount": 9}), &v1)
        .await
        .unwrap_err();
    assert!(matches!(stale, BackendError::VersionConflict { .. }));

    let missing = backend
        .conditional_replace(json!({"id": "p2", "type": PROJECT_TYPE}), &v2)
        .await
        .unwrap_err();
    assert!(matches!(missing, BackendError::NotFound { .. }));

    let (doc, _) = backend.read("p1", "p1").await.unwrap();
    assert_eq!(doc["scanCount"], 1);
}

#[tokio::test]
async fn upsert_rotates_token_and_keeps_order() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    let first = backend
        .upsert(json!({"id": "a", "type": PROJECT_TYPE, "rev": 1}))
        .await
        .unwrap();
    backend
        .create(json!({"id": "b", "type": PROJECT_TYPE}))
        .await
        .unwrap();
    let second = backend
        .upsert(json!({"id": "a", "type": PROJECT_TYPE, "rev": 2}))
        .await
        .unwrap();
    assert_ne!(first, second);

    let newest_first = backend
        .query(&DocumentQuery::by_type(PROJECT_TYPE, SortOrder::CreatedDesc))
        .await
        .unwrap();
    let ids: Vec<&str> = newest_first
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(newest_first[1]["rev"], 2);
}

#[tokio::test]
async fn query_filters_by_discriminator() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    backend.create(json!({"id": "x", "type": PROJECT_TYPE})).await.unwrap();
    backend.create(json!({"id": "y", "type": "other"})).await.unwrap();
    backend.create(json!({"id": "z"})).await.unwrap();

    let projects = backend
        .query(&DocumentQuery::by_type(PROJECT_TYPE, SortOrder::CreatedAsc))
        .await
        .unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["id"], "x");
}

#[tokio::test]
async fn delete_reports_missing_ids() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    backend.create(json!({"id": "gone", "type": PROJECT_TYPE})).await.unwrap();
    backend.delete("gone", "gone").await.unwrap();
    assert!(matches!(
        backend.delete("gone", "gone").await,
        Err(BackendError::NotFound { .. })
    ));
}

#[tokio::test]
async fn projects_survive_reconnect() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = ProjectStore::with_defaults(Arc::new(file_backend(&dir).await));
        let project = store
            .create(NewProject::new("demo", "https://example.com", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        store.increment_scan_count(&project.id).await.unwrap();
        project.id
    };

    let store = ProjectStore::with_defaults(Arc::new(file_backend(&dir).await));
    let project = store.get(&id).await.unwrap();
    assert_eq!(project.name, "demo");
    assert_eq!(project.scan_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = ProjectStore::new(
        Arc::new(file_backend(&dir).await),
        StoreSettings {
            retry: RetryPolicy {
                max_attempts: 64,
                base_backoff_ms: 1,
                max_backoff_ms: 20,
            },
            ..StoreSettings::default()
        },
    );
    let project = store
        .create(NewProject::new("demo", "https://example.com", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let id = project.id.clone();
        handles.push(tokio::spawn(async move {
            store.increment_scan_count(&id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.get_scan_count(&project.id).await.unwrap(), 10);
}

#[tokio::test]
async fn in_memory_database_outlives_idle_periods() {
    let backend = SqliteBackend::in_memory().await.unwrap();
    backend.create(json!({"id": "kept", "type": PROJECT_TYPE})).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    for i in 0..20 {
        backend
            .upsert(json!({"id": format!("n{}", i), "type": PROJECT_TYPE}))
            .await
            .unwrap();
    }
    let all = backend
        .query(&DocumentQuery::by_type(PROJECT_TYPE, SortOrder::CreatedAsc))
        .await
        .unwrap();
    assert_eq!(all.len(), 21);
    assert_eq!(all[0]["id"], "kept");
}
