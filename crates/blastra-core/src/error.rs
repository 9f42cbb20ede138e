//! Unified application error types for the Blastra server.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. The request pipeline never returns
//! these to clients; they are for startup, background tasks, and plumbing.

use std::fmt;

use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A configuration error occurred (startup only, fatal).
    Configuration,
    /// A cache tier failed to initialize or operate.
    Cache,
    /// A worker process failed to spawn or manage.
    Worker,
    /// The SSR render step failed.
    Render,
    /// An I/O error occurred.
    Io,
    /// An internal error occurred.
    Internal,
    /// The server shut down gracefully. Sentinel, not a failure.
    ServerClosed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Cache => write!(f, "CACHE"),
            Self::Worker => write!(f, "WORKER"),
            Self::Render => write!(f, "RENDER"),
            Self::Io => write!(f, "IO"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::ServerClosed => write!(f, "SERVER_CLOSED"),
        }
    }
}

/// The unified application error used throughout the Blastra server.
///
/// Crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a worker error.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Worker, message)
    }

    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The graceful-shutdown sentinel. Callers receiving this should
    /// treat the run as a normal termination and exit zero.
    pub fn server_closed() -> Self {
        Self::new(ErrorKind::ServerClosed, "server closed")
    }

    /// Whether this error is the graceful-shutdown sentinel.
    pub fn is_server_closed(&self) -> bool {
        self.kind == ErrorKind::ServerClosed
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, err.to_string(), err)
    }
}
