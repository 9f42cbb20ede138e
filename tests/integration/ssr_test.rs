//! SSR pipeline: direct exec, worker attempt, cache interplay.

use std::net::TcpListener;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use http::StatusCode;

use blastra_worker::{PortAllocator, WorkerPool};

use super::helpers::{shell_render, TestApp, TestAppOptions};

#[tokio::test]
async fn direct_exec_renders_and_caches() {
    let app = TestApp::new(TestAppOptions::default()).await;

    let res = app.get("/product/1", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"<html>rendered</html>");
    assert!(res.header("last-modified").is_some());

    let cached = app
        .ssr_cache
        .as_ref()
        .unwrap()
        .get("/product/1")
        .await
        .expect("positive cache entry");
    assert_eq!(cached.content, Bytes::from_static(b"<html>rendered</html>"));
}

#[tokio::test]
async fn direct_exec_404_lands_in_the_negative_tier() {
    let app = TestApp::new(TestAppOptions {
        ssr_command: shell_render(r#"{"html":"404 not found","code":404}"#),
        ..TestAppOptions::default()
    })
    .await;

    let res = app.get("/x", &[]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(&res.body[..], b"404 not found");
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));

    assert!(app
        .not_found_cache
        .as_ref()
        .unwrap()
        .get("/x")
        .await
        .is_some());
    assert!(app.ssr_cache.as_ref().unwrap().get("/x").await.is_none());
}

#[tokio::test]
async fn cached_pages_serve_304_on_matching_etag() {
    let app = TestApp::new(TestAppOptions::default()).await;

    app.ssr_cache
        .as_ref()
        .unwrap()
        .set("/p", Bytes::from_static(b"body"))
        .await;
    let etag = app
        .ssr_cache
        .as_ref()
        .unwrap()
        .get("/p")
        .await
        .unwrap()
        .etag;

    let res = app.get("/p", &[("if-none-match", &etag)]).await;
    assert_eq!(res.status, StatusCode::NOT_MODIFIED);
    assert!(res.body.is_empty());
    assert!(res.header("content-type").is_none());
}

#[tokio::test]
async fn cached_404_serves_404_with_validators() {
    let app = TestApp::new(TestAppOptions::default()).await;

    app.not_found_cache
        .as_ref()
        .unwrap()
        .set("/gone", Bytes::from_static(b"nope"))
        .await;

    let res = app.get("/gone", &[]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(&res.body[..], b"nope");
    assert!(res.header("etag").is_some());
}

#[tokio::test]
async fn upstream_error_is_reflected_with_its_code() {
    let app = TestApp::new(TestAppOptions {
        ssr_command: shell_render(r#"{"html":"","error":"render exploded","code":503}"#),
        ..TestAppOptions::default()
    })
    .await;

    let res = app.get("/boom", &[]).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(&res.body[..], b"render exploded\n");
    assert_eq!(res.header("content-type"), Some("text/plain; charset=utf-8"));
}

#[tokio::test]
async fn upstream_error_without_code_is_a_500() {
    let app = TestApp::new(TestAppOptions {
        ssr_command: shell_render(r#"{"html":"","error":"bad"}"#),
        ..TestAppOptions::default()
    })
    .await;
    let res = app.get("/boom", &[]).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn non_json_render_output_is_a_500() {
    let app = TestApp::new(TestAppOptions {
        ssr_command: shell_render("this is not json"),
        ..TestAppOptions::default()
    })
    .await;
    let res = app.get("/page", &[]).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&res.body[..], b"Internal Server Error\n");
}

#[tokio::test]
async fn failing_render_command_is_a_500() {
    let app = TestApp::new(TestAppOptions {
        ssr_command: vec!["/bin/sh".into(), "-c".into(), "exit 3".into()],
        ..TestAppOptions::default()
    })
    .await;
    let res = app.get("/page", &[]).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
}

/// Bind a throwaway upstream that plays the part of a render worker.
async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind upstream");
    listener.set_nonblocking(true).expect("nonblocking");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .expect("upstream server")
            .serve(router.into_make_service())
            .await
            .expect("upstream serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn worker_endpoint_renders_and_caches() {
    let upstream = spawn_upstream(Router::new().route(
        "/page",
        get(|| async { ([("x-render-source", "worker")], "from-worker") }),
    ))
    .await;

    let ports = Arc::new(PortAllocator::new(17000));
    let pool = WorkerPool::start(
        &external_pool_config(vec![upstream]),
        ports,
    )
    .await
    .expect("external pool");

    let app = TestApp::new(TestAppOptions {
        pool: Some(Arc::new(pool)),
        ..TestAppOptions::default()
    })
    .await;

    let res = app.get("/page", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"from-worker");
    // Upstream headers are copied through; missing content type defaults.
    assert_eq!(res.header("x-render-source"), Some("worker"));
    assert!(res.header("content-type").is_some());

    assert!(app.ssr_cache.as_ref().unwrap().get("/page").await.is_some());
}

#[tokio::test]
async fn worker_404_feeds_the_negative_tier() {
    let upstream = spawn_upstream(Router::new().route(
        "/missing",
        get(|| async { (StatusCode::NOT_FOUND, "worker 404") }),
    ))
    .await;

    let ports = Arc::new(PortAllocator::new(17100));
    let pool = WorkerPool::start(&external_pool_config(vec![upstream]), ports)
        .await
        .expect("external pool");

    let app = TestApp::new(TestAppOptions {
        pool: Some(Arc::new(pool)),
        ..TestAppOptions::default()
    })
    .await;

    let res = app.get("/missing", &[]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(app
        .not_found_cache
        .as_ref()
        .unwrap()
        .get("/missing")
        .await
        .is_some());
    assert!(app.ssr_cache.as_ref().unwrap().get("/missing").await.is_none());
}

#[tokio::test]
async fn unreachable_worker_falls_back_to_direct_exec() {
    // Grab a port and immediately release it so nothing listens there.
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        format!("http://{}", listener.local_addr().expect("addr"))
    };

    let ports = Arc::new(PortAllocator::new(17200));
    let pool = WorkerPool::start(&external_pool_config(vec![dead]), ports)
        .await
        .expect("external pool");

    let app = TestApp::new(TestAppOptions {
        pool: Some(Arc::new(pool)),
        ..TestAppOptions::default()
    })
    .await;

    let res = app.get("/page", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"<html>rendered</html>");
}

fn external_pool_config(urls: Vec<String>) -> blastra_core::config::WorkerPoolConfig {
    blastra_core::config::WorkerPoolConfig {
        count: 0,
        cwd: ".".into(),
        command: String::new(),
        args: Vec::new(),
        external_urls: urls,
        stream_stdio: false,
        stderr_tail_lines: 8,
        ready_pattern: String::new(),
        ready_timeout: std::time::Duration::from_secs(1),
        node_options_extra: String::new(),
        debug_env: String::new(),
        force_color: false,
    }
}
