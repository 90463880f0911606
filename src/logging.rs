//! # Structured Logging
//!
//! Environment-aware tracing setup. Plain formatted output by default, JSON
//! when `LIFELINE_LOG_FORMAT=json` is set (container deployments).

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Idempotent, and tolerant of an embedder
/// having installed its own global subscriber already.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level()));

        let json_output = std::env::var("LIFELINE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json_output {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

/// Default log level per environment when `RUST_LOG` is unset
fn default_log_level() -> &'static str {
    match std::env::var("LIFELINE_ENV").as_deref() {
        Ok("production") => "info",
        Ok("test") => "warn",
        _ => "debug",
    }
}
