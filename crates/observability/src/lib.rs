//! Process-wide tracing setup shared by the binary and integration tests.

/// Initialize structured logging with the default output format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

pub mod tracing;

pub use self::tracing::LogFormat;
