//! Logging setup shared by courier binaries.

/// Tracing subscriber configuration.
pub mod tracing;

pub use self::tracing::{DEFAULT_FILTER, Format, init, init_with};
