//! Environment-driven server configuration.
//!
//! All settings come from `BLASTRA_`-prefixed environment variables,
//! gathered through the `config` crate and then validated into the typed
//! [`Configuration`]. Malformed integers and durations among the known
//! keys are fatal at startup.

pub mod cache;
pub mod worker;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::result::AppResult;

pub use self::cache::{CacheConfig, ExternalCacheConfig, ExternalCacheType};
pub use self::worker::WorkerPoolConfig;

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_HTTPS_PORT: u16 = 8443;
const DEFAULT_CACHE_TTL: &str = "5m";
const DEFAULT_CACHE_SIZE: usize = 1000;
const DEFAULT_RATE_LIMIT: u32 = 100;
const DEFAULT_BURST: u32 = 200;
const DEFAULT_STATIC_DIR: &str = "./dist/client";
const DEFAULT_SSR_SCRIPT: &str = "node node_modules/@blastra/core/output.js";
const DEFAULT_MAX_AGE_STATIC: u64 = 86_400;
const DEFAULT_MAX_AGE_SSR: u32 = 60;
const DEFAULT_SHUTDOWN_TIMEOUT: &str = "15s";
const DEFAULT_CWD: &str = ".";
const DEFAULT_WORKER_COMMAND: &str = "node";
const DEFAULT_WORKER_ARGS: &str = "node_modules/.bin/blastra start";
const DEFAULT_STDERR_TAIL_LINES: usize = 200;
const DEFAULT_READY_PATTERN: &str = "BLASTRA_READY";
const DEFAULT_READY_TIMEOUT: &str = "10s";

/// Minimum 404-tier size when derived from `CACHE_SIZE`.
const NOTFOUND_CACHE_MIN_SIZE: usize = 250;

/// Raw environment values before validation. Field names line up with the
/// suffixes of the `BLASTRA_*` variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawConfig {
    http_port: u16,
    https_port: u16,
    enable_https: bool,
    tls_cert_path: String,
    tls_key_path: String,
    trust_proxy: bool,
    cwd: String,
    static_dir: String,
    list_static_content: bool,
    preload_static_file_list: Option<bool>,
    preload_static_content: Option<bool>,
    ssr_script: String,
    worker_command: String,
    worker_args: String,
    worker_urls: String,
    ssr_cache_enabled: bool,
    cache_ttl: String,
    cache_size: usize,
    notfound_cache_ttl: String,
    notfound_cache_size: usize,
    external_cache_type: String,
    redis_url: String,
    redis_password: String,
    redis_db: i64,
    cache_dir: String,
    rate_limit: u32,
    burst: u32,
    max_age_static: u64,
    max_age_ssr: u32,
    shutdown_timeout: String,
    gzip_enabled: bool,
    cpu_limit: usize,
    ssr_workers: Option<usize>,
    worker_stdio_stream: bool,
    worker_stderr_tail_lines: usize,
    worker_ready_pattern: String,
    worker_ready_timeout: String,
    worker_node_options: String,
    worker_debug: String,
    worker_force_color: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            enable_https: false,
            tls_cert_path: String::new(),
            tls_key_path: String::new(),
            trust_proxy: false,
            cwd: DEFAULT_CWD.to_string(),
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            list_static_content: true,
            preload_static_file_list: None,
            preload_static_content: None,
            ssr_script: DEFAULT_SSR_SCRIPT.to_string(),
            worker_command: DEFAULT_WORKER_COMMAND.to_string(),
            worker_args: DEFAULT_WORKER_ARGS.to_string(),
            worker_urls: String::new(),
            ssr_cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL.to_string(),
            cache_size: DEFAULT_CACHE_SIZE,
            notfound_cache_ttl: String::new(),
            notfound_cache_size: 0,
            external_cache_type: String::new(),
            redis_url: String::new(),
            redis_password: String::new(),
            redis_db: 0,
            cache_dir: String::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
            burst: DEFAULT_BURST,
            max_age_static: DEFAULT_MAX_AGE_STATIC,
            max_age_ssr: DEFAULT_MAX_AGE_SSR,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT.to_string(),
            gzip_enabled: false,
            cpu_limit: 0,
            ssr_workers: None,
            worker_stdio_stream: false,
            worker_stderr_tail_lines: DEFAULT_STDERR_TAIL_LINES,
            worker_ready_pattern: DEFAULT_READY_PATTERN.to_string(),
            worker_ready_timeout: DEFAULT_READY_TIMEOUT.to_string(),
            worker_node_options: String::new(),
            worker_debug: String::new(),
            worker_force_color: true,
        }
    }
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// HTTP listener port.
    pub http_port: u16,
    /// TLS listener port.
    pub https_port: u16,
    /// Whether the TLS listener is enabled.
    pub enable_https: bool,
    /// PEM certificate path (required when HTTPS is enabled).
    pub tls_cert_path: String,
    /// PEM private key path (required when HTTPS is enabled).
    pub tls_key_path: String,
    /// Honor `X-Forwarded-For` / `X-Real-IP` for client IPs.
    pub trust_proxy: bool,
    /// Base directory for relative paths and worker processes.
    pub cwd: PathBuf,
    /// Static file root, relative to `cwd`.
    pub static_dir: String,
    /// Legacy static listing toggle, kept for config compatibility.
    pub list_static_content: bool,
    preload_static_file_list: Option<bool>,
    preload_static_content: Option<bool>,
    /// Fallback SSR command, whitespace-split.
    pub ssr_script: Vec<String>,
    /// Worker executable.
    pub worker_command: String,
    /// Worker arguments, whitespace-split.
    pub worker_args: Vec<String>,
    /// External worker URLs; non-empty disables local workers.
    pub worker_urls: Vec<String>,
    /// Master toggle for SSR caching.
    pub ssr_cache_enabled: bool,
    /// SSR cache entry TTL.
    pub cache_ttl: Duration,
    /// SSR memory tier size cap.
    pub cache_size: usize,
    /// 404-tier TTL; zero derives half the SSR TTL.
    pub notfound_cache_ttl: Duration,
    /// 404-tier size cap; zero derives from the SSR cap.
    pub notfound_cache_size: usize,
    /// Selected external cache backend.
    pub external_cache_type: ExternalCacheType,
    /// Redis address.
    pub redis_url: String,
    /// Redis password.
    pub redis_password: String,
    /// Redis database index.
    pub redis_db: i64,
    /// Filesystem cache directory.
    pub cache_dir: String,
    /// Per-IP requests per second on the SSR path. Zero disables limiting.
    pub rate_limit: u32,
    /// Token bucket burst. Parsed for compatibility; the per-IP limiter
    /// shapes purely by rate and does not consume it.
    pub burst: u32,
    /// Legacy static max-age, unused by the static path.
    pub max_age_static: u64,
    /// `Cache-Control: max-age` for SSR responses, in seconds.
    pub max_age_ssr: u32,
    /// Budget for graceful server shutdown.
    pub shutdown_timeout: Duration,
    /// Gzip-compress responses when the client accepts it.
    pub gzip_enabled: bool,
    /// Runtime worker threads.
    pub cpu_count: usize,
    /// Number of local render workers.
    pub worker_count: usize,
    /// Forward worker stdio lines to the server log.
    pub worker_stdio_stream: bool,
    /// Per-worker stderr tail capacity.
    pub worker_stderr_tail_lines: usize,
    /// Readiness token substring.
    pub worker_ready_pattern: String,
    /// Readiness wait budget (warn-only on expiry).
    pub worker_ready_timeout: Duration,
    /// Extra `NODE_OPTIONS` fragment for workers.
    pub worker_node_options: String,
    /// `DEBUG` value for workers.
    pub worker_debug: String,
    /// Set `FORCE_COLOR=1` for workers.
    pub worker_force_color: bool,
}

impl Configuration {
    /// Load and validate configuration from `BLASTRA_*` environment
    /// variables. Any malformed value among the known keys is fatal.
    pub fn load() -> AppResult<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("BLASTRA").try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("failed to read environment: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("invalid configuration value: {e}")))?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> AppResult<Self> {
        if raw.enable_https && (raw.tls_cert_path.is_empty() || raw.tls_key_path.is_empty()) {
            return Err(AppError::configuration(
                "BLASTRA_TLS_CERT_PATH and BLASTRA_TLS_KEY_PATH must be set \
                 when BLASTRA_ENABLE_HTTPS is true",
            ));
        }

        let cache_ttl = parse_duration("BLASTRA_CACHE_TTL", &raw.cache_ttl)?;
        let notfound_cache_ttl = if raw.notfound_cache_ttl.is_empty() {
            Duration::ZERO
        } else {
            parse_duration("BLASTRA_NOTFOUND_CACHE_TTL", &raw.notfound_cache_ttl)?
        };
        let shutdown_timeout = parse_duration("BLASTRA_SHUTDOWN_TIMEOUT", &raw.shutdown_timeout)?;
        let worker_ready_timeout =
            parse_duration("BLASTRA_WORKER_READY_TIMEOUT", &raw.worker_ready_timeout)?;

        let external_cache_type: ExternalCacheType = raw.external_cache_type.parse()?;

        let cpu_count = if raw.cpu_limit >= 1 {
            raw.cpu_limit
        } else {
            available_cpus()
        };
        let worker_count = raw.ssr_workers.unwrap_or(cpu_count);

        Ok(Self {
            http_port: raw.http_port,
            https_port: raw.https_port,
            enable_https: raw.enable_https,
            tls_cert_path: raw.tls_cert_path,
            tls_key_path: raw.tls_key_path,
            trust_proxy: raw.trust_proxy,
            cwd: PathBuf::from(raw.cwd),
            static_dir: raw.static_dir,
            list_static_content: raw.list_static_content,
            preload_static_file_list: raw.preload_static_file_list,
            preload_static_content: raw.preload_static_content,
            ssr_script: split_command(&raw.ssr_script),
            worker_command: raw.worker_command,
            worker_args: split_command(&raw.worker_args),
            worker_urls: split_urls(&raw.worker_urls),
            ssr_cache_enabled: raw.ssr_cache_enabled,
            cache_ttl,
            cache_size: raw.cache_size,
            notfound_cache_ttl,
            notfound_cache_size: raw.notfound_cache_size,
            external_cache_type,
            redis_url: raw.redis_url,
            redis_password: raw.redis_password,
            redis_db: raw.redis_db,
            cache_dir: raw.cache_dir,
            rate_limit: raw.rate_limit,
            burst: raw.burst,
            max_age_static: raw.max_age_static,
            max_age_ssr: raw.max_age_ssr,
            shutdown_timeout,
            gzip_enabled: raw.gzip_enabled,
            cpu_count,
            worker_count,
            worker_stdio_stream: raw.worker_stdio_stream,
            worker_stderr_tail_lines: raw.worker_stderr_tail_lines,
            worker_ready_pattern: raw.worker_ready_pattern,
            worker_ready_timeout,
            worker_node_options: raw.worker_node_options,
            worker_debug: raw.worker_debug,
            worker_force_color: raw.worker_force_color,
        })
    }

    /// Whether the static membership set should be preloaded at startup.
    pub fn should_preload_file_list(&self) -> bool {
        self.preload_static_file_list
            .unwrap_or(self.list_static_content)
    }

    /// Whether static file bytes should be preloaded. Parsed for
    /// compatibility; the serving path reads from disk.
    pub fn should_preload_content(&self) -> bool {
        self.preload_static_content.unwrap_or(true)
    }

    /// Root of the static tree: `cwd` joined with `static_dir`.
    pub fn static_root(&self) -> PathBuf {
        self.cwd.join(&self.static_dir)
    }

    /// SSR memory tier settings. Zeroed when caching is disabled.
    pub fn ssr_cache_config(&self) -> CacheConfig {
        if !self.ssr_cache_enabled {
            return CacheConfig::default();
        }
        CacheConfig {
            ttl: self.cache_ttl,
            max_size: self.cache_size,
        }
    }

    /// 404 tier settings, deriving defaults from the SSR tier when not
    /// explicitly configured. Zeroed when caching is disabled.
    pub fn not_found_cache_config(&self) -> CacheConfig {
        if !self.ssr_cache_enabled {
            return CacheConfig::default();
        }

        let ttl = if self.notfound_cache_ttl.is_zero() {
            self.cache_ttl / 2
        } else {
            self.notfound_cache_ttl
        };

        let max_size = if self.notfound_cache_size == 0 {
            (self.cache_size / 4).max(NOTFOUND_CACHE_MIN_SIZE)
        } else {
            self.notfound_cache_size
        };

        CacheConfig { ttl, max_size }
    }

    /// External cache tier settings.
    pub fn external_cache_config(&self) -> ExternalCacheConfig {
        ExternalCacheConfig {
            cache: CacheConfig {
                ttl: self.cache_ttl,
                max_size: self.cache_size,
            },
            kind: self.external_cache_type,
            redis_url: self.redis_url.clone(),
            redis_password: self.redis_password.clone(),
            redis_db: self.redis_db,
            cache_dir: PathBuf::from(&self.cache_dir),
        }
    }

    /// Worker pool settings.
    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            count: self.worker_count,
            cwd: self.cwd.clone(),
            command: self.worker_command.clone(),
            args: self.worker_args.clone(),
            external_urls: self.worker_urls.clone(),
            stream_stdio: self.worker_stdio_stream,
            stderr_tail_lines: self.worker_stderr_tail_lines,
            ready_pattern: self.worker_ready_pattern.clone(),
            ready_timeout: self.worker_ready_timeout,
            node_options_extra: self.worker_node_options.clone(),
            debug_env: self.worker_debug.clone(),
            force_color: self.worker_force_color,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_raw(RawConfig::default()).expect("default configuration is valid")
    }
}

fn parse_duration(key: &str, value: &str) -> AppResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| AppError::configuration(format!("invalid {key}: {e}")))
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn split_urls(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
