// src/limiter/set.rs

use std::collections::BTreeMap;

use super::{FixedWindowLimiter, RateLimitStatus};
use crate::config::{LimiterConfig, RateLimitConfig};
use crate::error::{GovernanceError, Result};

/// One independent limiter per protected endpoint class
#[derive(Debug, Default)]
pub struct RateLimiterSet {
    limiters: BTreeMap<String, FixedWindowLimiter>,
}

impl RateLimiterSet {
    pub fn new(limits: &BTreeMap<String, RateLimitConfig>, limiter_config: &LimiterConfig) -> Self {
        let limiters = limits
            .iter()
            .map(|(class, limit)| {
                (
                    class.clone(),
                    FixedWindowLimiter::with_sweep(class.clone(), *limit, limiter_config),
                )
            })
            .collect();

        Self { limiters }
    }

    pub fn insert(&mut self, limiter: FixedWindowLimiter) {
        self.limiters.insert(limiter.name().to_string(), limiter);
    }

    pub fn get(&self, class: &str) -> Option<&FixedWindowLimiter> {
        self.limiters.get(class)
    }

    /// Check `identifier` against the limiter for `class`
    pub fn check(&self, class: &str, identifier: &str) -> Result<RateLimitStatus> {
        self.limiters
            .get(class)
            .map(|limiter| limiter.check(identifier))
            .ok_or_else(|| GovernanceError::Config(format!("unknown endpoint class '{}'", class)))
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.limiters.keys().map(String::as_str)
    }

    pub fn shutdown(&self) {
        for limiter in self.limiters.values() {
            limiter.shutdown();
        }
    }
}
