//! Tracing bootstrap for the overlay binary.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,booking_overlay=debug,embed_runtime=debug";
const OVERLAY_LOG_ENV: &str = "BOOKING_OVERLAY_LOG";

/// Initialize the global subscriber.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `BOOKING_OVERLAY_LOG`
/// 3) internal default filter
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_names(true)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    filter_from_value(env::var(OVERLAY_LOG_ENV).ok())
}

fn filter_from_value(value: Option<String>) -> EnvFilter {
    if let Some(value) = value.filter(|v| !v.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(value)
    {
        return filter;
    }
    EnvFilter::new(DEFAULT_FILTER)
}
