//! Optional `tracing` subscriber setup.
//!
//! The library only emits `tracing` events. Binaries that have no
//! subscriber of their own can install a formatted one here.

use tracing_subscriber::EnvFilter;

use crate::ClientConfig;

/// Filter used when neither the config nor `RUST_LOG` provides one.
pub const DEFAULT_FILTER: &str = "eyerobot_link=info";

/// Install a fmt subscriber filtered by `directives`.
///
/// Returns `false` if a global subscriber is already set or the directives
/// do not parse; logging setup never fails the caller.
pub fn init(directives: &str) -> bool {
    let filter = match EnvFilter::try_new(directives) {
        Ok(filter) => filter,
        Err(_) => return false,
    };
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}

/// Install a subscriber using, in order: `config.log_filter`, `RUST_LOG`,
/// then [`DEFAULT_FILTER`].
pub fn try_init_from_config(config: &ClientConfig) -> bool {
    let directives = config
        .log_filter
        .clone()
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());
    init(&directives)
}
