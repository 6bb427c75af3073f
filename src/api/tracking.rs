/// Scan tracking endpoints
///
/// A printed QR code points at /api/track/{id}; each hit counts one scan and
/// redirects the scanner to the project's text.

use crate::api::{error::ApiError, projects::AppState};
use crate::project::StoreError;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::{json, Value};

/// Bytes escaped in a redirect target. `%` is left alone so existing escapes
/// pass through unchanged; non-ASCII is always escaped.
const LOCATION_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

pub fn create_tracking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/track/{id}", get(track_scan))
        .route("/api/projects/{id}/scans", get(scan_count))
}

/// Count a scan and redirect
///
/// GET /api/track/{id}
/// Returns: 302 Found, Location: <project text>
async fn track_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let target = state.store.increment_scan_count(&id).await?;
    tracing::info!("📈 Scan tracked: {} -> {}", id, target);

    let location = redirect_location(&target).map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        reason: format!("text is not a usable redirect target: {}", e),
    })?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// Percent-encode the project text into a `Location` header value
fn redirect_location(target: &str) -> Result<HeaderValue, header::InvalidHeaderValue> {
    HeaderValue::from_str(&utf8_percent_encode(target, LOCATION_ESCAPES).to_string())
}

/// GET /api/projects/{id}/scans
/// Returns: { "id": "...", "scanCount": 3 }
async fn scan_count(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let count = state.store.get_scan_count(&id).await?;
    Ok(Json(json!({ "id": id, "scanCount": count })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_urls_are_untouched() {
        let location = redirect_location("https://example.com/a?b=1&c=%20").unwrap();
        assert_eq!(location, "https://example.com/a?b=1&c=%20");
    }

    #[test]
    fn unsafe_bytes_are_escaped() {
        assert_eq!(redirect_location("hello\nworld").unwrap(), "hello%0Aworld");
        assert_eq!(redirect_location("a b<c>").unwrap(), "a%20b%3Cc%3E");
        assert_eq!(redirect_location("café").unwrap(), "caf%C3%A9");
    }
}
