//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber: newline-delimited records to
/// stdout, filtered by `RUST_LOG` when set, else by `default_level`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .try_init();
}
