//! Tracing and logging setup shared by the connector binaries and tests.

/// Tracing configuration (filters, formatters).
pub mod tracing;

/// Initialize process-wide structured JSON logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize human-readable logging for tests (captured by the test harness).
pub fn init_for_tests() {
    tracing::init_test();
}
