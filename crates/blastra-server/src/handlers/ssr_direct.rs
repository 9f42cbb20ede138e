//! Direct-exec render fallback.
//!
//! Invoked when no worker endpoint is available: runs the configured SSR
//! command once with the request path as its final argument and parses
//! the JSON render result from stdout.

use std::process::Stdio;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error};

use super::ssr::{header_str, html_response, SsrContext};
use crate::httpdate::parse_http_date;

/// Shape of the render command's stdout.
#[derive(Debug, Deserialize)]
struct SsrOutput {
    #[serde(default)]
    html: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: u16,
}

/// Render by spawning the SSR command. Always produces a response.
pub(crate) async fn handle_direct_ssr(
    ctx: &SsrContext,
    req: &Request<Body>,
    cache_key: &str,
) -> Response {
    let path = req.uri().path();
    debug!(path, "worker pool not active, executing SSR command directly");

    let Some((program, args)) = ctx.ssr_command.split_first() else {
        error!("SSR command is empty");
        return internal_error();
    };

    let output = Command::new(program)
        .args(args)
        .arg(path)
        .current_dir(&ctx.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            error!(path, error = %e, "error starting SSR command");
            return internal_error();
        }
    };

    if !output.status.success() {
        error!(
            path,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "SSR command exited with error"
        );
        return internal_error();
    }

    let rendered: SsrOutput = match serde_json::from_slice(&output.stdout) {
        Ok(rendered) => rendered,
        Err(e) => {
            error!(
                path,
                error = %e,
                stdout = %String::from_utf8_lossy(&output.stdout),
                "failed to parse SSR JSON response"
            );
            return internal_error();
        }
    };

    if !rendered.error.is_empty() {
        error!(path, code = rendered.code, error = %rendered.error, "SSR returned error");
        let status = if rendered.code == 0 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::from_u16(rendered.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        };
        return plain_error(&rendered.error, status);
    }

    let content = Bytes::from(rendered.html);
    let now = Utc::now();

    if rendered.code == StatusCode::NOT_FOUND.as_u16() {
        if let Some(cache) = &ctx.not_found_cache {
            cache.set(cache_key, content.clone()).await;
        }
        return html_response(StatusCode::NOT_FOUND, content, ctx.max_age, now, None);
    }

    if let Some(cache) = &ctx.ssr_cache {
        cache.set(cache_key, content.clone()).await;
    }

    // Compared against the just-minted timestamp, so only a client whose
    // clock runs ahead of ours can ever match. Kept for compatibility.
    if let Some(since) = header_str(req, header::IF_MODIFIED_SINCE).and_then(parse_http_date) {
        if now <= since {
            debug!(path, "returning 304 Not Modified");
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }

    html_response(StatusCode::OK, content, ctx.max_age, now, None)
}

fn internal_error() -> Response {
    plain_error("Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR)
}

/// Plain-text error in the classic `http.Error` shape.
fn plain_error(message: &str, status: StatusCode) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{message}\n"),
    )
        .into_response()
}
