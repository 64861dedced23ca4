//! Logging setup.
//!
//! Everything goes to stderr: stdout is reserved for the RPC stream.

use tracing_subscriber::EnvFilter;

use crate::types::settings::LoggingSettings;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured filter. Calling this twice, or after
/// another subscriber was installed, leaves the existing one in place.
pub fn init(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(filter = %logging.filter, "tracing initialized");
    }
}
