//! Static file serving.
//!
//! Headers (Cache-Control policy, keep-alive, index ETag) are set here;
//! the body, range requests, and `If-Modified-Since` ride on
//! `tower_http::services::ServeFile`, which streams from disk with 206
//! support. Bytes are read on every serve — only membership and metadata
//! come from the index.

use std::collections::HashMap;

use axum::body::{boxed, Body};
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::util::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error};

use crate::state::AppState;
use crate::static_index::cache_control_for;

/// Serve a static file. The router has already classified the path as
/// static; anything that fails to resolve ends up a 404 from `ServeFile`.
pub async fn serve(state: &AppState, req: Request<Body>) -> Response {
    let url_path = req.uri().path().to_string();
    debug!(path = %url_path, "static file request");

    // No traversal out of the static root.
    if url_path.split('/').any(|segment| segment == "..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let file_path = state
        .config
        .static_root()
        .join(url_path.trim_start_matches('/'));

    let entry = state
        .static_index
        .as_ref()
        .and_then(|index| index.get(&url_path))
        .cloned();

    if let (Some(entry), Some(if_none_match)) = (
        &entry,
        req.headers()
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok()),
    ) {
        if if_none_match == entry.etag {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Ok(etag) = HeaderValue::from_str(&entry.etag) {
                response.headers_mut().insert(header::ETAG, etag);
            }
            return response;
        }
    }

    let cache_control = match &state.static_index {
        Some(index) => index.cache_control(&url_path),
        None => cache_control_for(&url_path, &HashMap::new()),
    };

    let mut response = match ServeFile::new(&file_path).oneshot(req).await {
        Ok(response) => response.map(boxed),
        Err(e) => {
            error!(path = %file_path.display(), error = %e, "failed to serve static file");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("keep-alive"),
        HeaderValue::from_static("timeout=5, max=1000"),
    );
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Some(entry) = &entry {
        if let Ok(etag) = HeaderValue::from_str(&entry.etag) {
            headers.insert(header::ETAG, etag);
        }
    }

    response
}
