//! HTTP API end to end
//!
//! Serves the router on an ephemeral port over the in-memory backend and drives
//! it with a real HTTP client.

use qrtrack::project::{ProjectStore, StoreSettings};
use qrtrack::{create_router, MemoryBackend};
use reqwest::{redirect, Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_server(store: ProjectStore) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(store);
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_default() -> (String, Client) {
    let store = ProjectStore::with_defaults(Arc::new(MemoryBackend::new()));
    let base = spawn_server(store).await;
    let client = Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap();
    (base, client)
}

async fn create_demo(base: &str, client: &Client) -> Value {
    let response = client
        .post(format!("{}/api/projects", base))
        .json(&json!({
            "name": "demo",
            "text": "https://example.com",
            "time": "2024-01-01T00:00:00Z"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_check_is_ok() {
    let (base, client) = spawn_default().await;
    let response = client.get(format!("{}/healthz", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn create_and_fetch_project() {
    let (base, client) = spawn_default().await;
    let created = create_demo(&base, &client).await;
    assert_eq!(created["scanCount"], 0);
    assert_eq!(created["type"], "qr_project");
    let id = created["id"].as_str().unwrap();

    let fetched: Value = client
        .get(format!("{}/api/projects/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn missing_fields_are_bad_request() {
    let (base, client) = spawn_default().await;
    let response = client
        .post(format!("{}/api/projects", base))
        .json(&json!({ "name": "demo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("text"));
}

#[tokio::test]
async fn duplicate_id_is_conflict_but_save_upserts() {
    let (base, client) = spawn_default().await;
    let body = json!({
        "id": "launch",
        "name": "launch",
        "text": "https://example.com",
        "time": "2024-01-01T00:00:00Z"
    });
    let first = client
        .post(format!("{}/api/projects", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let again = client
        .post(format!("{}/api/projects", base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let saved = client
        .post(format!("{}/api/save-project", base))
        .json(&json!({
            "id": "launch",
            "name": "launch day",
            "text": "https://example.com/launch",
            "time": "2024-01-02T00:00:00Z",
            "qrColor": "#ff0000"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::CREATED);
    let saved: Value = saved.json().await.unwrap();
    assert_eq!(saved["name"], "launch day");
    assert_eq!(saved["qrColor"], "#ff0000");
    assert_eq!(saved["bgColor"], "#ffffff");
}

#[tokio::test]
async fn track_redirects_and_counts() {
    let (base, client) = spawn_default().await;
    let created = create_demo(&base, &client).await;
    let id = created["id"].as_str().unwrap();

    for _ in 0..3 {
        let response = client
            .get(format!("{}/api/track/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()["location"].to_str().unwrap(),
            "https://example.com"
        );
    }

    let scans: Value = client
        .get(format!("{}/api/projects/{}/scans", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(scans["scanCount"], 3);

    let unknown = client
        .get(format!("{}/api/track/unknown", base))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_customize_list_and_delete() {
    let (base, client) = spawn_default().await;
    let created = create_demo(&base, &client).await;
    let id = created["id"].as_str().unwrap();

    let updated = client
        .put(format!("{}/api/projects/{}", base, id))
        .json(&json!({ "name": "renamed", "text": "https://example.org" }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated: Value = updated.json().await.unwrap();
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["text"], "https://example.org");

    let bad_patch = client
        .put(format!("{}/api/projects/{}", base, id))
        .json(&json!({ "name": "renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_patch.status(), StatusCode::BAD_REQUEST);

    let customized: Value = client
        .put(format!("{}/api/projects/{}/customize", base, id))
        .json(&json!({ "bgColor": "#101010" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(customized["bgColor"], "#101010");

    let second = create_demo(&base, &client).await;
    let listed: Value = client
        .get(format!("{}/api/projects", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed["projects"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], second["id"]);

    let deleted = client
        .delete(format!("{}/api/projects/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = client
        .get(format!("{}/api/projects/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let deleted_again = client
        .delete(format!("{}/api/projects/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted_again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn slow_backend_is_service_unavailable() {
    let store = ProjectStore::new(
        Arc::new(MemoryBackend::with_latency(Duration::from_millis(300))),
        StoreSettings {
            backend_timeout: Duration::from_millis(20),
            ..StoreSettings::default()
        },
    );
    let base = spawn_server(store).await;
    let response = reqwest::get(format!("{}/api/projects/anything", base))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn multi_line_text_redirects_with_escapes() {
    let (base, client) = spawn_default().await;
    let created: Value = client
        .post(format!("{}/api/projects", base))
        .json(&json!({
            "name": "note",
            "text": "hello\nworld",
            "time": "2024-01-01T00:00:00Z"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let response = client
        .get(format!("{}/api/track/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "hello%0Aworld"
    );

    let scans: Value = client
        .get(format!("{}/api/projects/{}/scans", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(scans["scanCount"], 1);
}

#[tokio::test]
async fn null_fields_are_bad_request() {
    let (base, client) = spawn_default().await;
    let response = client
        .post(format!("{}/api/projects", base))
        .json(&json!({
            "name": null,
            "text": "https://example.com",
            "time": "2024-01-01T00:00:00Z"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn legacy_read_aliases_return_the_project() {
    let (base, client) = spawn_default().await;
    let created = create_demo(&base, &client).await;
    let id = created["id"].as_str().unwrap();

    for path in ["save-project", "customize"] {
        let response = client
            .get(format!("{}/api/{}/{}", base, path, id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Value = response.json().await.unwrap();
        assert_eq!(fetched, created);
    }

    let missing = client
        .get(format!("{}/api/customize/unknown", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
