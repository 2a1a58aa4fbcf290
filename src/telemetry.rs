//! Logging setup for stepler
//!
//! Plain tracing to stderr. The run report goes to stdout, logs never do.
//!
//! # Example
//!
//! ```no_run
//! use stepler::telemetry::init_logging;
//!
//! init_logging();
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize logging with tracing-subscriber
///
/// Uses RUST_LOG for filtering (default: info). Safe to call more than once.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a fallback filter used when RUST_LOG is unset
pub fn init_logging_with_default(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
