//! Tracing/logging initialization.
//!
//! Filtering follows `RUST_LOG`; without it everything at `info` and above is
//! emitted. Output is JSON unless `COURIER_LOG_FORMAT` is `pretty` (or its
//! alias `text`).

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Env var selecting the output format.
pub const FORMAT_VAR: &str = "COURIER_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable text; selected by `pretty` or `text`.
    Pretty,
}

impl Format {
    fn from_env() -> Self {
        Self::parse(std::env::var(FORMAT_VAR).ok().as_deref())
    }

    /// `pretty` and `text` select [`Format::Pretty`]; anything else is JSON.
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("pretty") | Some("text") => Format::Pretty,
            _ => Format::Json,
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(Format::from_env());
}

/// Initialize tracing/logging with an explicit output format, ignoring
/// `COURIER_LOG_FORMAT`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_with(format: Format) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_thread_names(true);

    // A second init finds a global subscriber already set; ignore that.
    let _ = match format {
        Format::Json => builder.json().with_target(false).try_init(),
        Format::Pretty => builder.with_target(true).try_init(),
    };
}
