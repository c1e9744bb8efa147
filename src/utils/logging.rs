//! Logging initialization
//!
//! - Respects the `RUST_LOG` environment variable, which always wins
//! - Falls back to the filter from configuration, then to `info`
//! - Respects `NO_COLOR`
//!
//! # Usage
//! ```rust
//! use bundle_loader::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter when neither `RUST_LOG` nor configuration set one
const DEFAULT_FILTER: &str = "info";

fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging on stderr
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "debug",
///   "bundle_loader::module=trace"). Ignored when `RUST_LOG` is set.
///
/// Calling this more than once is harmless; only the first call installs
/// a subscriber.
pub fn init_logging(filter: Option<&str>) {
    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true) // Primary vs background context is worth seeing
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Initialize logging with JSON output (for log aggregation)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Initialize logging from [`LoggingConfig`]
///
/// `json_format` falls back to human-readable output when the
/// `json-logging` feature is disabled.
pub fn init_logging_from_config(config: Option<&LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
