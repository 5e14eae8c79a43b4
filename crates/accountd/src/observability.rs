//! Process-wide tracing subscriber.
//!
//! `RUST_LOG` wins over `[logging] level` when set. The filter sits behind a
//! reload layer so the level can be changed without restarting.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the subscriber. Later calls only re-apply `config.level`.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (reload_layer, handle) = reload::Layer::new(filter);
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        apply_logging_level(&config.level);
        return;
    }

    // Another subscriber may already be installed by the embedding process.
    if tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already set, keeping it");
    }
}

/// Switch the active level. Returns false before [`init_tracing`] ran.
pub fn apply_logging_level(level: &str) -> bool {
    match LOG_RELOAD_HANDLE.get() {
        Some(handle) => handle.modify(|f| *f = EnvFilter::new(level)).is_ok(),
        None => false,
    }
}
