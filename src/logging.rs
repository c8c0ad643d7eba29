//! Diagnostic tracing.
//!
//! Everything the crate logs goes through `tracing`; this module installs
//! the subscriber for the binary. Output goes to stderr so that stdout
//! stays reserved for JSON responses.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "browser_vision=info,warn";

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, falling back to `default_filter`. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
///
/// ```bash
/// RUST_LOG=browser_vision=debug browser-vision demo
/// ```
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init("debug");
        init(DEFAULT_FILTER);
        tracing::info!("still logging");
    }
}
