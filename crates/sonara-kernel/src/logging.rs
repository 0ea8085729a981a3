//! Structured logging setup for hosts
//!
//! Library code only emits `tracing` events. Hosts call [`init_logging`]
//! once to print them; later calls are no-ops.

use tracing_subscriber::EnvFilter;

/// Default directive when neither the caller nor `RUST_LOG` supplies one
pub const DEFAULT_FILTER: &str = "sonara=info";

/// Install a fmt subscriber filtered by `filter`, falling back to
/// `RUST_LOG` and then [`DEFAULT_FILTER`].
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(filter: Option<&str>) -> bool {
    let env_filter = match filter {
        Some(directives) => EnvFilter::try_new(directives).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
