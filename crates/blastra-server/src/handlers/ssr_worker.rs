//! Worker-HTTP render attempt.
//!
//! Forwards the request path to the next pool worker over HTTP. Any
//! transport failure returns `None` so the caller can fall back to
//! direct execution.

use axum::body::{boxed, Body, Full};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use tracing::{debug, error};

use super::ssr::{SsrContext, FORWARDED_HEADERS};

/// Try rendering via the worker pool. `None` means "not handled".
pub(crate) async fn handle_worker_ssr(
    ctx: &SsrContext,
    req: &Request<Body>,
    cache_key: &str,
) -> Option<Response> {
    let endpoint = ctx.pool.worker_endpoint()?;
    if endpoint.is_empty() {
        return None;
    }

    let path = req.uri().path();
    debug!(path, %endpoint, "attempting SSR via worker pool");

    let mut request = ctx.client.get(format!("{endpoint}{path}"));
    for name in FORWARDED_HEADERS {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            request = request.header(name, value);
        }
    }

    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(path, error = %e, "worker request failed");
            return None;
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            error!(path, error = %e, "failed to read worker response");
            return None;
        }
    };

    // Cache by status before handing the body to the client.
    if status == StatusCode::NOT_FOUND {
        if let Some(cache) = &ctx.not_found_cache {
            cache.set(cache_key, body.clone()).await;
        }
    } else if status == StatusCode::OK {
        if let Some(cache) = &ctx.ssr_cache {
            cache.set(cache_key, body.clone()).await;
        }
    }

    let mut response = Response::new(boxed(Full::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in upstream_headers.iter() {
        // The body is already fully decoded; hop-by-hop framing must not
        // leak through.
        if name == header::TRANSFER_ENCODING {
            continue;
        }
        headers.append(name, value.clone());
    }
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/html; charset=utf-8"),
        );
    }

    Some(response)
}
