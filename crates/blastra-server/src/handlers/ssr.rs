//! The SSR decision ladder.
//!
//! Positive cache probe, negative (404) cache probe, worker-HTTP attempt,
//! direct-exec fallback — the first step that produces a response wins,
//! and every request gets exactly one response.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{boxed, Body, Full};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use blastra_cache::CacheProvider;
use blastra_core::error::{AppError, ErrorKind};
use blastra_core::result::AppResult;
use blastra_core::traits::WorkerDispatch;
use blastra_core::types::CacheEntry;

use crate::httpdate::{format_http_date, parse_http_date};

use super::{ssr_direct, ssr_worker};

/// Budget for one worker HTTP attempt before falling back to direct exec.
pub(crate) const WORKER_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Request headers forwarded to workers. Everything else stays behind.
pub(crate) const FORWARDED_HEADERS: [&str; 4] =
    ["accept", "accept-language", "cookie", "user-agent"];

/// Everything the SSR pipeline needs, shared across requests.
#[derive(Debug)]
pub struct SsrContext {
    pub(crate) ssr_cache: Option<Arc<CacheProvider>>,
    pub(crate) not_found_cache: Option<Arc<CacheProvider>>,
    pub(crate) ssr_command: Vec<String>,
    pub(crate) max_age: u32,
    pub(crate) cwd: PathBuf,
    pub(crate) pool: Arc<dyn WorkerDispatch>,
    pub(crate) client: reqwest::Client,
}

impl SsrContext {
    pub fn new(
        ssr_cache: Option<Arc<CacheProvider>>,
        not_found_cache: Option<Arc<CacheProvider>>,
        ssr_command: Vec<String>,
        max_age: u32,
        cwd: PathBuf,
        pool: Arc<dyn WorkerDispatch>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(WORKER_REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "failed to build worker HTTP client", e)
            })?;

        Ok(Self {
            ssr_cache,
            not_found_cache,
            ssr_command,
            max_age,
            cwd,
            pool,
            client,
        })
    }

    /// Serve one SSR request. Never errors; always writes a response.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let path = req.uri().path().to_string();
        debug!(%path, "received SSR request");
        let cache_key = path.as_str();

        if let Some(cache) = &self.ssr_cache {
            if let Some(entry) = cache.get(cache_key).await {
                debug!(%path, "serving cached SSR response");
                return self.cached_response(&req, entry, StatusCode::OK);
            }
        }

        if let Some(cache) = &self.not_found_cache {
            if let Some(entry) = cache.get(cache_key).await {
                debug!(%path, "serving cached 404 response");
                return self.cached_response(&req, entry, StatusCode::NOT_FOUND);
            }
        }

        if let Some(response) = ssr_worker::handle_worker_ssr(self, &req, cache_key).await {
            return response;
        }

        ssr_direct::handle_direct_ssr(self, &req, cache_key).await
    }

    /// Shape a cache hit, honoring `If-None-Match` and `If-Modified-Since`.
    fn cached_response(&self, req: &Request<Body>, entry: CacheEntry, status: StatusCode) -> Response {
        let etag_on_304 = status == StatusCode::OK;

        if let Some(if_none_match) = header_str(req, header::IF_NONE_MATCH) {
            if if_none_match == entry.etag {
                return not_modified(etag_on_304.then_some(entry.etag.as_str()));
            }
        }

        if let Some(since) = header_str(req, header::IF_MODIFIED_SINCE).and_then(parse_http_date) {
            if entry.last_updated <= since {
                debug!(path = req.uri().path(), "returning 304 Not Modified");
                return not_modified(etag_on_304.then_some(entry.etag.as_str()));
            }
        }

        html_response(
            status,
            entry.content,
            self.max_age,
            entry.last_updated,
            Some(&entry.etag),
        )
    }
}

pub(crate) fn header_str<'a, B>(req: &'a Request<B>, name: header::HeaderName) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

fn not_modified(etag: Option<&str>) -> Response {
    match etag {
        Some(etag) => {
            (StatusCode::NOT_MODIFIED, [(header::ETAG, etag.to_string())]).into_response()
        }
        None => StatusCode::NOT_MODIFIED.into_response(),
    }
}

/// Standard SSR response shape: HTML content type, public caching with
/// the configured max-age, and a `Last-Modified` validator.
pub(crate) fn html_response(
    status: StatusCode,
    body: Bytes,
    max_age: u32,
    last_modified: DateTime<Utc>,
    etag: Option<&str>,
) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CACHE_CONTROL, format!("public, max-age={max_age}"))
        .header(header::LAST_MODIFIED, format_http_date(&last_modified));
    if let Some(etag) = etag {
        builder = builder.header(header::ETAG, etag);
    }
    builder
        .body(boxed(Full::from(body)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
