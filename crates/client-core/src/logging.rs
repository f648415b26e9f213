//! Logging initialization for the client.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system for the client.
///
/// Sets up tracing with:
/// - Log level from the RUST_LOG env var, falling back to the provided default
/// - Compact human-readable output on stderr
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
