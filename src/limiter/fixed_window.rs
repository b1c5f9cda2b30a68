// src/limiter/fixed_window.rs

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{wall_clock_after, RateLimitSnapshot, RateLimitStatus};
use crate::config::{LimiterConfig, RateLimitConfig, MAX_EXPIRY};
use crate::rate_limit_event;
use crate::sweeper::PeriodicTask;

/// Counter for one identifier
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u64,
    reset_at: Instant,
}

type Windows = Arc<Mutex<HashMap<String, WindowEntry>>>;

/// Fixed Window rate limiting algorithm
///
/// Each identifier gets a window that opens on its first request and lasts
/// `window`. Up to `max_requests` are allowed inside it; once it has elapsed
/// the next request opens a fresh window. Bursts of up to twice the limit are
/// possible across a window boundary.
///
/// The read and the increment happen under one lock acquisition, so two
/// concurrent checks can never both observe the same count.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: String,
    windows: Windows,
    config: RateLimitConfig,
    sweeper: Option<PeriodicTask>,
}

impl FixedWindowLimiter {
    /// Creates a limiter without a background sweep
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            name: name.into(),
            windows: Arc::new(Mutex::new(HashMap::new())),
            config,
            sweeper: None,
        }
    }

    /// Creates a limiter whose stale windows are swept periodically
    pub fn with_sweep(
        name: impl Into<String>,
        config: RateLimitConfig,
        limiter_config: &LimiterConfig,
    ) -> Self {
        let mut limiter = Self::new(name, config);

        if limiter_config.use_background_task {
            if Handle::try_current().is_ok() {
                let windows = Arc::clone(&limiter.windows);
                let name = limiter.name.clone();
                limiter.sweeper = Some(PeriodicTask::spawn(
                    "rate-limit-sweep",
                    limiter_config.cleanup_interval,
                    move || {
                        let removed = Self::sweep(&windows);
                        let name = name.clone();
                        async move {
                            if removed > 0 {
                                debug!(limiter = %name, removed, "Swept expired rate limit windows");
                            }
                        }
                    },
                ));
            } else {
                warn!(limiter = %limiter.name, "No tokio runtime, rate limit sweep disabled");
            }
        }

        limiter
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn sweep(windows: &Windows) -> usize {
        let now = Instant::now();
        let mut windows = windows.lock();
        let before = windows.len();
        windows.retain(|_, entry| now < entry.reset_at);
        before - windows.len()
    }

    /// Count one request from `identifier` and decide whether it is allowed.
    ///
    /// Denied requests are not counted and leave the reset time unchanged.
    pub fn check(&self, identifier: &str) -> RateLimitStatus {
        let now = Instant::now();
        let max = self.config.max_requests;

        let (allowed, count, reset_at) = {
            let mut windows = self.windows.lock();
            match windows.get_mut(identifier) {
                Some(entry) if now < entry.reset_at => {
                    if entry.count < max {
                        entry.count += 1;
                        (true, entry.count, entry.reset_at)
                    } else {
                        (false, entry.count, entry.reset_at)
                    }
                }
                _ => {
                    let entry = WindowEntry {
                        count: 1,
                        reset_at: now + self.config.window.min(MAX_EXPIRY),
                    };
                    windows.insert(identifier.to_string(), entry);
                    (true, 1, entry.reset_at)
                }
            }
        };

        let reset_after = reset_at.saturating_duration_since(now);
        let remaining = if allowed { max.saturating_sub(count) } else { 0 };

        rate_limit_event!(self.name.as_str(), identifier, allowed, remaining, max);

        RateLimitStatus {
            allowed,
            remaining,
            limit: max,
            reset_after,
            reset_time: wall_clock_after(reset_after),
        }
    }

    /// Reset the rate limit for a specific identifier
    pub fn reset(&self, identifier: &str) {
        self.windows.lock().remove(identifier);
    }

    /// Current window for `identifier` without counting a request.
    /// Windows that have already elapsed report `None`.
    pub fn get_status(&self, identifier: &str) -> Option<RateLimitSnapshot> {
        let now = Instant::now();
        let entry = *self.windows.lock().get(identifier)?;
        if now >= entry.reset_at {
            return None;
        }

        let reset_after = entry.reset_at.saturating_duration_since(now);
        Some(RateLimitSnapshot {
            count: entry.count,
            limit: self.config.max_requests,
            reset_after,
            reset_time: wall_clock_after(reset_after),
        })
    }

    /// Drop every elapsed window now, returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        Self::sweep(&self.windows)
    }

    /// Number of identifiers currently tracked
    pub fn tracked(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Stop the background sweep
    pub fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }
}
