//! Process-wide tracing setup shared by the workbench binaries and tests.

/// Initialize JSON logging with the default `info` filter.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Tracing configuration (filters, layers).
pub mod tracing;
