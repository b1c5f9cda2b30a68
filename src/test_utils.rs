// src/test_utils.rs

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{
    CacheConfig, Environment, GovernanceConfig, KeyManagerConfig, KeySlotConfig, LimiterConfig,
    RateLimitConfig,
};
use crate::keys::{KeyCheck, KeyHealthCheck, KeyManager};
use crate::resilience::RetryConfig;

/// Scriptable stand-in for the provider's quota endpoint, keyed by secret
#[derive(Debug, Default)]
pub struct MockKeyChecker {
    responses: Mutex<HashMap<String, KeyCheck>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockKeyChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every check of `secret` with `check` from now on
    pub fn respond(&self, secret: &str, check: KeyCheck) {
        self.responses
            .lock()
            .unwrap()
            .insert(secret.to_string(), check);
    }

    pub fn calls_for(&self, secret: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(secret)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl KeyHealthCheck for MockKeyChecker {
    async fn check(&self, secret: &SecretString) -> KeyCheck {
        let secret = secret.expose_secret();
        *self
            .calls
            .lock()
            .unwrap()
            .entry(secret.to_string())
            .or_insert(0) += 1;

        self.responses
            .lock()
            .unwrap()
            .get(secret)
            .cloned()
            .unwrap_or_else(|| KeyCheck::unavailable("no mock response"))
    }
}

/// Key manager settings for the given `(name, secret)` slots
pub fn key_config(slots: &[(&str, &str)]) -> KeyManagerConfig {
    KeyManagerConfig {
        slots: slots
            .iter()
            .map(|(name, secret)| KeySlotConfig::new(*name, *secret))
            .collect(),
        ..KeyManagerConfig::default()
    }
}

/// Manager over a mock checker, returned together so tests can script it
pub fn create_test_key_manager(slots: &[(&str, &str)]) -> (KeyManager, Arc<MockKeyChecker>) {
    let checker = Arc::new(MockKeyChecker::new());
    let manager = KeyManager::new(&key_config(slots), checker.clone());
    (manager, checker)
}

/// Governor settings with no background tasks and short retry delays
pub fn test_governance_config(slots: &[(&str, &str)]) -> GovernanceConfig {
    let mut rate_limits = std::collections::BTreeMap::new();
    rate_limits.insert("analyze".to_string(), RateLimitConfig::analyze());
    rate_limits.insert("api".to_string(), RateLimitConfig::api());

    GovernanceConfig {
        environment: Environment::Production,
        cache: CacheConfig {
            use_background_task: false,
            ..CacheConfig::default()
        },
        limiter: LimiterConfig {
            use_background_task: false,
            cleanup_interval: Duration::from_secs(60),
        },
        rate_limits,
        retry: RetryConfig::new(3, Duration::from_millis(100)),
        keys: key_config(slots),
    }
}
