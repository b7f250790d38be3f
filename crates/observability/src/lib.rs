//! Tracing and logging setup shared by every warden process.

pub mod config;

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use config::{LogFormat, LoggingConfig};

/// Initialize process-wide tracing from configuration.
///
/// This is safe to call multiple times; subsequent calls become no-ops and
/// return `false`.
pub fn init(config: &LoggingConfig) -> bool {
    tracing::init(config)
}
