// src/limiter/mod.rs
//! Per-identifier request counting for inbound endpoints.

pub mod fixed_window;
pub mod set;

#[cfg(test)]
mod tests;

pub use fixed_window::FixedWindowLimiter;
pub use set::RateLimiterSet;

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Status returned by rate limiting operations
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    /// Whether the request was allowed
    pub allowed: bool,

    /// Remaining allowed requests in the current window
    pub remaining: u64,

    /// Total capacity of the rate limiter
    pub limit: u64,

    /// Time until the current window resets
    pub reset_after: Duration,

    /// Wall-clock instant at which the window resets
    pub reset_time: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Response headers for this decision. `Retry-After` only when denied.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_time.timestamp().to_string()),
        ];

        if !self.allowed {
            headers.push(("Retry-After", self.retry_after_secs().to_string()));
        }

        headers
    }

    /// Whole seconds until the window resets, rounded up
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Read-only view of one identifier's window
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSnapshot {
    pub count: u64,
    pub limit: u64,
    pub reset_after: Duration,
    pub reset_time: DateTime<Utc>,
}

/// Convert a monotonic remaining duration to wall-clock time
pub(crate) fn wall_clock_after(remaining: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(remaining)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .unwrap_or_else(Utc::now)
}
