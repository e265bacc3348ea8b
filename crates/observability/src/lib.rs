//! Tracing and logging setup shared by the binary and tests.

/// Initialize process-wide logging (`RUST_LOG` filter, default `info`).
///
/// Output is JSON unless `LOG_FORMAT=pretty`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Human-readable logs captured by the test harness.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Subscriber configuration (filters, formats).
pub mod tracing;
