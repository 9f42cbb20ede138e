//! Logging bootstrap.
//!
//! Initialized before configuration loading so config errors reach the
//! subscriber. Level comes from `BLASTRA_LOG_LEVEL` (fallback
//! `LOG_LEVEL`), defaulting to `info`; a terminal gets the ANSI text
//! formatter, everything else gets JSON for log shippers.

use std::io::IsTerminal;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn init() {
    let level = std::env::var("BLASTRA_LOG_LEVEL")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| "info".to_string());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if std::io::stdout().is_terminal() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    }

    info!(%level, "starting blastra server");
}
