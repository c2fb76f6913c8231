//! Logging setup for the `infodb` tool and tests
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary.

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a specific level
///
/// `RUST_LOG` takes precedence when set. Output goes to stderr so it never
/// mixes with command output.
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Initialize logging for tests
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

// Stub implementations when logging feature is disabled
#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
