//! Blastra front server.
//!
//! Terminates client HTTP, serves static assets directly, and forwards
//! dynamic requests to SSR render workers, caching rendered HTML
//! (including negative 404 responses) in a layered cache hierarchy.

mod logging;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use blastra_cache::memory::InMemoryCache;
use blastra_cache::{create_cache_provider, CacheProvider};
use blastra_core::config::Configuration;
use blastra_core::error::AppError;
use blastra_core::traits::{CacheBackend, WorkerDispatch};
use blastra_server::handlers::ssr::SsrContext;
use blastra_server::health::Health;
use blastra_server::middleware::rate_limit::IpRateLimiter;
use blastra_server::static_index::StaticFileIndex;
use blastra_server::{app, shutdown, AppState};
use blastra_worker::{PortAllocator, WorkerPool};

fn main() {
    logging::init();

    let config = match Configuration::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    debug!(cpus = config.cpu_count, "sizing runtime worker threads");
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.cpu_count)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(run(config));
    std::process::exit(exit_code);
}

async fn run(config: Configuration) -> i32 {
    let config = Arc::new(config);

    // Cache hierarchy: distinct positive and negative providers sharing
    // the external tier configuration.
    let (ssr_cache, not_found_cache) = if config.ssr_cache_enabled {
        let external_config = config.external_cache_config();

        let ssr_memory = InMemoryCache::ssr(config.ssr_cache_config());
        let ssr_provider = match create_cache_provider(
            Some(ssr_memory as Arc<dyn CacheBackend>),
            &external_config,
        )
        .await
        {
            Ok(provider) => provider,
            Err(e) => {
                error!(error = %e, "failed to create SSR cache provider");
                return 1;
            }
        };

        let not_found_memory = InMemoryCache::not_found(config.not_found_cache_config());
        let not_found_provider = match create_cache_provider(
            Some(not_found_memory as Arc<dyn CacheBackend>),
            &external_config,
        )
        .await
        {
            Ok(provider) => provider,
            Err(e) => {
                error!(error = %e, "failed to create 404 cache provider");
                return 1;
            }
        };

        info!(external = %config.external_cache_type, "SSR caching enabled");
        (
            Some(Arc::new(ssr_provider)),
            Some(Arc::new(not_found_provider)),
        )
    } else {
        info!("SSR caching is disabled");
        (None::<Arc<CacheProvider>>, None::<Arc<CacheProvider>>)
    };

    // Worker pool. A failed start downgrades to direct-exec-only mode.
    let pool: Arc<WorkerPool> =
        match WorkerPool::start(&config.worker_pool_config(), PortAllocator::shared()).await {
            Ok(pool) => Arc::new(pool),
            Err(e) => {
                warn!(error = %e, "failed to start worker pool, falling back to direct SSR command mode");
                Arc::new(WorkerPool::disabled())
            }
        };

    // Static membership preload. Failure degrades to per-request stat.
    let static_index = if config.should_preload_file_list() {
        match StaticFileIndex::build(&config.static_root(), &[], HashMap::new()) {
            Ok(index) => {
                info!(files = index.len(), "static file index preloaded");
                Some(Arc::new(index))
            }
            Err(e) => {
                error!(error = %e, "failed to preload static files");
                None
            }
        }
    } else {
        None
    };

    let ssr = match SsrContext::new(
        ssr_cache,
        not_found_cache,
        config.ssr_script.clone(),
        config.max_age_ssr,
        config.cwd.clone(),
        pool.clone() as Arc<dyn WorkerDispatch>,
    ) {
        Ok(ssr) => Arc::new(ssr),
        Err(e) => {
            error!(error = %e, "failed to build SSR pipeline");
            return 1;
        }
    };

    let rate_limiter = if config.rate_limit > 0 && config.burst > 0 {
        debug!(
            rate = config.rate_limit,
            "rate limiting enabled per IP on the SSR path"
        );
        Some(Arc::new(IpRateLimiter::new(config.rate_limit)))
    } else {
        debug!("rate limiting disabled");
        None
    };

    let health = Arc::new(Health::new());
    let state = AppState {
        config: config.clone(),
        ssr,
        static_index,
        rate_limiter,
        health: health.clone(),
    };
    let router = app::build_app(state);

    let handle = Handle::new();
    let (errors_tx, mut errors_rx) = mpsc::channel::<AppError>(2);

    shutdown::spawn_signal_handler(
        handle.clone(),
        pool.clone() as Arc<dyn WorkerDispatch>,
        config.shutdown_timeout,
        errors_tx.clone(),
    );

    {
        let errors = errors_tx.clone();
        let router = router.clone();
        let handle = handle.clone();
        let port = config.http_port;
        tokio::spawn(async move {
            if let Err(e) = app::serve_http(port, router, handle).await {
                let _ = errors.send(e).await;
            }
        });
    }

    if config.enable_https {
        let errors = errors_tx.clone();
        let router = router.clone();
        let handle = handle.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = app::serve_https(
                config.https_port,
                &config.tls_cert_path,
                &config.tls_key_path,
                router,
                handle,
            )
            .await
            {
                let _ = errors.send(e).await;
            }
        });
    }

    // Flip readiness once the listener actually accepts connections.
    {
        let health = health.clone();
        let port = config.http_port;
        tokio::spawn(async move {
            wait_for_listener(port, 10).await;
            health.set_ready();
        });
    }

    match errors_rx.recv().await {
        Some(err) if err.is_server_closed() => {
            info!("server stopped gracefully");
            0
        }
        Some(err) => {
            error!(error = %err, "server error");
            1
        }
        None => 0,
    }
}

/// Dial the listener until it accepts or the retries run out.
async fn wait_for_listener(port: u16, max_retries: u32) {
    let addr = format!("127.0.0.1:{port}");
    for _ in 0..max_retries {
        let dial = tokio::net::TcpStream::connect(&addr);
        if let Ok(Ok(_)) = tokio::time::timeout(Duration::from_millis(100), dial).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
