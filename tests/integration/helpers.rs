//! Shared test helpers for integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};
use tower::util::ServiceExt;

use blastra_cache::memory::InMemoryCache;
use blastra_cache::CacheProvider;
use blastra_core::config::{CacheConfig, Configuration};
use blastra_core::traits::{CacheBackend, WorkerDispatch};
use blastra_server::handlers::ssr::SsrContext;
use blastra_server::health::Health;
use blastra_server::middleware::rate_limit::IpRateLimiter;
use blastra_server::static_index::StaticFileIndex;
use blastra_server::{app, AppState};
use blastra_worker::WorkerPool;

/// A memory-only provider for tests.
pub fn memory_provider(max_size: usize) -> Arc<CacheProvider> {
    let memory = InMemoryCache::ssr(CacheConfig {
        ttl: Duration::from_secs(60),
        max_size,
    });
    Arc::new(CacheProvider::new(
        Some(memory as Arc<dyn CacheBackend>),
        None,
    ))
}

/// Knobs for building a test application.
pub struct TestAppOptions {
    /// Files (relative path, contents) seeded under the static root.
    pub static_files: Vec<(&'static str, &'static [u8])>,
    /// SSR command; defaults to a script that renders a fixed page.
    pub ssr_command: Vec<String>,
    /// Worker pool; defaults to disabled.
    pub pool: Option<Arc<WorkerPool>>,
    /// Per-IP rate limit; `None` disables limiting.
    pub rate_limit: Option<u32>,
    /// Preload the static membership set.
    pub preload_index: bool,
    /// Attach caches to the SSR pipeline.
    pub caching: bool,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            static_files: Vec::new(),
            ssr_command: shell_render(r#"{"html":"<html>rendered</html>"}"#),
            pool: None,
            rate_limit: None,
            preload_index: true,
            caching: true,
        }
    }
}

/// An SSR command that emits `json` on stdout. The request path arrives
/// as `$0` of the script and is ignored.
pub fn shell_render(json: &str) -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!("echo '{json}'"),
    ]
}

/// Fully-wired application over a temp static root.
pub struct TestApp {
    pub router: Router,
    pub ssr_cache: Option<Arc<CacheProvider>>,
    pub not_found_cache: Option<Arc<CacheProvider>>,
    pub health: Arc<Health>,
    _static_root: tempfile::TempDir,
}

impl TestApp {
    pub async fn new(options: TestAppOptions) -> Self {
        let static_root = tempfile::tempdir().expect("temp static root");
        for (path, contents) in &options.static_files {
            let file = static_root.path().join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).expect("static subdir");
            }
            std::fs::write(file, contents).expect("static file");
        }

        let mut config = Configuration::default();
        config.cwd = static_root.path().to_path_buf();
        config.static_dir = ".".to_string();
        let config = Arc::new(config);

        let (ssr_cache, not_found_cache) = if options.caching {
            (Some(memory_provider(100)), Some(memory_provider(100)))
        } else {
            (None, None)
        };

        let pool: Arc<dyn WorkerDispatch> = match options.pool {
            Some(pool) => pool,
            None => Arc::new(WorkerPool::disabled()),
        };

        let ssr = Arc::new(
            SsrContext::new(
                ssr_cache.clone(),
                not_found_cache.clone(),
                options.ssr_command,
                config.max_age_ssr,
                config.cwd.clone(),
                pool,
            )
            .expect("ssr context"),
        );

        let static_index = if options.preload_index {
            Some(Arc::new(
                StaticFileIndex::build(&config.static_root(), &[], HashMap::new())
                    .expect("static index"),
            ))
        } else {
            None
        };

        let health = Arc::new(Health::new());
        let state = AppState {
            config,
            ssr,
            static_index,
            rate_limiter: options.rate_limit.map(|rps| Arc::new(IpRateLimiter::new(rps))),
            health: health.clone(),
        };

        Self {
            router: app::build_app(state),
            ssr_cache,
            not_found_cache,
            health,
            _static_root: static_root,
        }
    }

    /// One-shot GET through the router.
    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");

        let status = response.status();
        let headers = response.headers().clone();
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .expect("body");
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
