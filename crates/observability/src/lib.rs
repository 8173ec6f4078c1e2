//! Tracing/logging setup shared by binaries and tests.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide tracing from the environment (`RUST_LOG`,
/// `LOG_FORMAT`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let format = std::env::var("LOG_FORMAT")
        .ok()
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    tracing::init(format);
}
