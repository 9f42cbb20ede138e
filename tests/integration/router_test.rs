//! Router classification: health probes, static serving, rate limiting.

use std::time::Instant;

use http::StatusCode;

use super::helpers::{TestApp, TestAppOptions};

const APP_JS: &[u8] = b"console.log('blastra');";

fn with_static() -> TestAppOptions {
    TestAppOptions {
        static_files: vec![
            ("index.html", b"<html>home</html>" as &[u8]),
            ("app.js", APP_JS),
            ("assets/logo.png", &[7u8; 64]),
        ],
        ..TestAppOptions::default()
    }
}

#[tokio::test]
async fn liveness_always_answers() {
    let app = TestApp::new(TestAppOptions::default()).await;
    let res = app.get("/live", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"OK");
}

#[tokio::test]
async fn readiness_flips_with_the_flag() {
    let app = TestApp::new(TestAppOptions::default()).await;

    let res = app.get("/ready", &[]).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);

    app.health.set_ready();
    let res = app.get("/ready", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"Ready");
}

#[tokio::test]
async fn static_files_are_served_with_policy_headers() {
    let app = TestApp::new(with_static()).await;

    let res = app.get("/app.js", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], APP_JS);
    assert_eq!(
        res.header("cache-control"),
        Some("public, max-age=31536000, immutable")
    );
    assert_eq!(res.header("accept-ranges"), Some("bytes"));
    assert_eq!(res.header("connection"), Some("keep-alive"));
    assert!(res.header("etag").is_some());
    assert!(res
        .header("content-type")
        .is_some_and(|ct| ct.contains("javascript")));
}

#[tokio::test]
async fn html_gets_revalidation_policy() {
    let app = TestApp::new(with_static()).await;
    let res = app.get("/index.html", &[]).await;
    assert_eq!(
        res.header("cache-control"),
        Some("public, max-age=0, must-revalidate")
    );
}

#[tokio::test]
async fn asset_prefix_is_immutable_regardless_of_extension() {
    let app = TestApp::new(with_static()).await;
    let res = app.get("/assets/logo.png", &[]).await;
    assert_eq!(
        res.header("cache-control"),
        Some("public, max-age=31536000, immutable")
    );
}

#[tokio::test]
async fn static_etag_supports_if_none_match() {
    let app = TestApp::new(with_static()).await;

    let first = app.get("/app.js", &[]).await;
    let etag = first.header("etag").expect("etag").to_string();

    let revalidated = app.get("/app.js", &[("if-none-match", &etag)]).await;
    assert_eq!(revalidated.status, StatusCode::NOT_MODIFIED);
    assert!(revalidated.body.is_empty());
}

#[tokio::test]
async fn range_requests_return_exact_slices() {
    let app = TestApp::new(with_static()).await;

    let res = app.get("/app.js", &[("range", "bytes=2-5")]).await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.body.len(), 4);
    assert_eq!(&res.body[..], &APP_JS[2..=5]);
}

#[tokio::test]
async fn unknown_paths_fall_through_to_ssr() {
    let app = TestApp::new(with_static()).await;

    let res = app.get("/some/page", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], b"<html>rendered</html>");
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.header("cache-control"), Some("public, max-age=60"));
}

#[tokio::test]
async fn stat_fallback_classifies_without_the_index() {
    let app = TestApp::new(TestAppOptions {
        preload_index: false,
        ..with_static()
    })
    .await;

    let res = app.get("/app.js", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(&res.body[..], APP_JS);

    let res = app.get("/not/static", &[]).await;
    assert_eq!(&res.body[..], b"<html>rendered</html>");
}

#[tokio::test]
async fn ssr_path_is_shaped_but_static_is_not() {
    let app = TestApp::new(TestAppOptions {
        rate_limit: Some(5), // 200ms between permits per IP
        ..with_static()
    })
    .await;

    // Static serving bypasses the limiter entirely.
    let start = Instant::now();
    for _ in 0..5 {
        let res = app.get("/app.js", &[]).await;
        assert_eq!(res.status, StatusCode::OK);
    }
    assert!(start.elapsed() < std::time::Duration::from_millis(150));

    // SSR requests from one IP are spaced by the interval.
    let start = Instant::now();
    for _ in 0..3 {
        let res = app
            .get("/page", &[("x-forwarded-for", "ignored-without-trust")])
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }
    assert!(start.elapsed() >= std::time::Duration::from_millis(400));
}
