use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{GovernanceError, Severity};

// Ensure initialization happens only once
static INIT: Once = Once::new();

/// Initialize the logging system with sensible defaults.
///
/// Log level can be set using the RUST_LOG environment variable.
/// Example: RUST_LOG=debug,request_governor=trace
///
/// Setting LOG_FORMAT=json switches to one JSON object per line.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if json {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true) // Include module path in logs
                        .with_thread_ids(true)
                        .with_line_number(true),
                )
                .init();
        }

        tracing::info!("Logging initialized");
    });
}

/// Log a governance error at the level its severity calls for.
///
/// Critical and high go out at error level so they can be routed to alerting.
pub fn log_error(err: &GovernanceError, severity: Severity, context: &str) {
    let category = format!("{:?}", err.category());
    match severity {
        Severity::Critical | Severity::High => tracing::error!(
            severity = %severity,
            category = %category,
            context = context,
            error = %err,
            "Governance error"
        ),
        Severity::Medium => tracing::warn!(
            severity = %severity,
            category = %category,
            context = context,
            error = %err,
            "Governance error"
        ),
        Severity::Low => tracing::info!(
            severity = %severity,
            category = %category,
            context = context,
            error = %err,
            "Governance error"
        ),
    }
}

/// Macro for logging rate limiting events
#[macro_export]
macro_rules! rate_limit_event {
    ($class:expr, $identifier:expr, $allowed:expr, $remaining:expr, $limit:expr) => {
        tracing::debug!(
            class = $class,
            identifier = $identifier,
            allowed = $allowed,
            remaining = $remaining,
            limit = $limit,
            "Rate limit check"
        )
    };
}

/// Macro for logging cache lookups
#[macro_export]
macro_rules! cache_event {
    ($operation:expr, $key:expr, $hit:expr) => {
        tracing::debug!(
            operation = $operation,
            key = $key,
            hit = $hit,
            "Cache operation"
        )
    };
}
