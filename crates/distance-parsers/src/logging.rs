//! Logging and tracing utilities for the Distance codec
//!
//! Library code only emits `tracing` events; this module installs a
//! subscriber for binaries and tests that want to see them.
//!
//! | Level | Emitted for |
//! |-------|-------------|
//! | `trace` | every section header framed |
//! | `debug` | registry module loads, file probes, lazy inflation |
//! | `warn` | errors captured on an element instead of raised |

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "warn,distance=info";

/// Initialize the default tracing subscriber
///
/// Multiple calls are safe; only the first one installs a subscriber.
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Initialize tracing with a custom configuration
#[cfg(feature = "tracing")]
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .with_writer(std::io::stderr);

        // Another subscriber may already be installed by the host application
        let _ = tracing_subscriber::registry().with(fmt_layer).with(filter).try_init();
    }
}

#[cfg(not(feature = "tracing"))]
pub fn init_with_config(_config: TracingConfig) {
    TRACING_INITIALIZED.store(true, Ordering::SeqCst);
}

/// Whether a subscriber was installed through this module
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::SeqCst)
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "distance=debug")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: DEFAULT_FILTER.to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TracingConfig {
    /// Config whose filter follows a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn verbosity(count: u8) -> Self {
        let level = match count {
            0 => DEFAULT_FILTER,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            default_level: level.to_string(),
            show_line_number: count >= 3,
            ..Self::default()
        }
    }
}

/// Log the start of reading a file
#[macro_export]
macro_rules! log_parse_start {
    ($format:expr, $path:expr) => {
        tracing::info!(
            format = %$format,
            path = %$path.display(),
            "Starting read"
        );
    };
}

/// Log a finished read with its duration and element count
#[macro_export]
macro_rules! log_parse_complete {
    ($format:expr, $duration:expr, $items:expr) => {
        tracing::info!(
            format = %$format,
            duration_ms = %$duration.as_millis(),
            items = %$items,
            "Read complete"
        );
    };
}

/// Log a failed read
#[macro_export]
macro_rules! log_parse_error {
    ($format:expr, $error:expr) => {
        tracing::error!(
            format = %$format,
            error = %$error,
            "Read failed"
        );
    };
}

/// Run a read or write operation inside a timed span
#[cfg(feature = "tracing")]
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::info_span!("parse", format = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::debug!(duration_ms = %duration.as_millis(), "Operation complete");

    result
}

#[cfg(not(feature = "tracing"))]
pub fn instrument_parse<T, F>(_name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}

/// Create a span for tracking progress through a long walk
#[cfg(feature = "tracing")]
pub fn progress_span(operation: &str, total: usize) -> tracing::Span {
    tracing::info_span!("progress", operation = %operation, total = %total)
}

/// Log progress within a progress span
#[cfg(feature = "tracing")]
pub fn log_progress(current: usize, total: usize) {
    if total > 0 && (current % 1000 == 0 || current == total) {
        let percent = (current as f64 / total as f64 * 100.0) as u32;
        tracing::debug!(current = %current, total = %total, percent = %percent, "Progress");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn log_progress(_current: usize, _total: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.default_level.contains("distance=info"));
        assert!(config.show_target);
        assert!(!config.show_thread_ids);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TracingConfig::verbosity(0).default_level, DEFAULT_FILTER);
        assert_eq!(TracingConfig::verbosity(2).default_level, "debug");
        assert!(TracingConfig::verbosity(5).show_line_number);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_default();
        init_default();
        assert!(is_initialized());
    }

    #[test]
    fn test_instrument_parse() {
        let result = instrument_parse("test", || 42);
        assert_eq!(result, 42);
    }
}
