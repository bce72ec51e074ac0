//! Logging setup for Sift.
//!
//! Filters log through `tracing`. Nothing is printed unless the application
//! installs a subscriber, either its own or the one [`init`] sets up when the
//! `tracing-subscriber` feature is enabled.
//!
//! # Environment Variables
//!
//! - `SIFT_DEBUG=true|1|yes` - Enable debug logging
//! - `SIFT_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `SIFT_LOG_FORMAT=json|pretty|compact` - Set the output format (default: json)
//!
//! ```rust,no_run
//! use sift_query::logging;
//!
//! logging::init();
//! ```
//!
//! What gets logged:
//! - `debug`: composition stages, executed SQL
//! - `trace`: every predicate built from a field
//! - `warn`: fields dropped by an allow-list

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check whether `SIFT_DEBUG` is set to `true`, `1` or `yes`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("SIFT_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The level from `SIFT_LOG_LEVEL`.
///
/// Defaults to `debug` when `SIFT_DEBUG` is enabled, otherwise `warn`.
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("SIFT_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// The format from `SIFT_LOG_FORMAT`. Defaults to `json`.
pub fn get_log_format() -> &'static str {
    env::var("SIFT_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Install the subscriber. Subsequent calls are no-ops.
///
/// Does nothing unless `SIFT_DEBUG` or `SIFT_LOG_LEVEL` is set.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("SIFT_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "sift={},sift_query={},sift_schema={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(level, format = get_log_format(), "sift logging initialized");
        }
    });
}

/// Set `SIFT_LOG_LEVEL` and install the subscriber.
///
/// # Safety
///
/// Modifies the process environment. Call it at startup before spawning
/// threads.
pub fn init_with_level(level: &str) {
    // SAFETY: documented as startup-only, before other threads exist.
    unsafe {
        env::set_var("SIFT_LOG_LEVEL", level);
    }
    init();
}

/// Debug log only when `SIFT_DEBUG` is enabled.
#[macro_export]
macro_rules! sift_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace log only when `SIFT_DEBUG` is enabled.
#[macro_export]
macro_rules! sift_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
