// src/governor.rs
//! Composition root for request governance.
//!
//! Every inbound request goes through the same pipeline:
//!
//! ```plaintext
//! rate limit ──denied──► Governed::Denied
//!     │
//!     ▼
//! cache lookup ──hit──► Governed::Served { cache_hit: true }
//!     │
//!     ▼
//! key selection ──none──► GovernanceError::NoAvailableKey
//!     │
//!     ▼
//! remote call (retried) ──► cache store ──► Governed::Served
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::{Environment, GovernanceConfig};
use crate::error::{ErrorResponse, GovernanceError, Result};
use crate::keys::{HttpKeyChecker, KeyHealthCheck, KeyManager, KeyRefresher, SelectedKey};
use crate::limiter::{RateLimitStatus, RateLimiterSet};
use crate::logging::log_error;
use crate::resilience::{with_retry_if, RetryConfig};

/// Result of a governed request
#[derive(Debug, Clone)]
pub enum Governed<V> {
    /// Rejected by the rate limiter, nothing else ran
    Denied(RateLimitStatus),
    /// Value from the cache or from a fresh remote call
    Served {
        value: V,
        rate_limit: RateLimitStatus,
        cache_hit: bool,
    },
}

impl<V> Governed<V> {
    pub fn rate_limit(&self) -> &RateLimitStatus {
        match self {
            Governed::Denied(status) => status,
            Governed::Served { rate_limit, .. } => rate_limit,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Governed::Denied(_) => None,
            Governed::Served { value, .. } => Some(value),
        }
    }
}

/// Owns the limiters, the response cache and the key pool for one process
#[derive(Debug)]
pub struct RequestGovernor<V> {
    environment: Environment,
    limiters: RateLimiterSet,
    cache: TtlCache<V>,
    keys: Arc<KeyManager>,
    refresher: Option<KeyRefresher>,
    retry: RetryConfig,
}

impl<V> RequestGovernor<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Build every component from `config`, checking keys with `checker`
    pub fn init(config: GovernanceConfig, checker: Arc<dyn KeyHealthCheck>) -> Result<Self> {
        config.validate()?;

        let keys = Arc::new(KeyManager::new(&config.keys, checker));

        let refresher = if config.keys.use_background_refresh && Handle::try_current().is_ok() {
            let mut refresher = KeyRefresher::new(Arc::clone(&keys), config.keys.refresh_interval);
            refresher.start();
            Some(refresher)
        } else {
            None
        };

        info!(
            environment = ?config.environment,
            classes = config.rate_limits.len(),
            slots = config.keys.slots.len(),
            "Request governor initialized"
        );

        Ok(Self {
            environment: config.environment,
            limiters: RateLimiterSet::new(&config.rate_limits, &config.limiter),
            cache: TtlCache::new(config.cache.clone()),
            keys,
            refresher,
            retry: config.retry,
        })
    }

    /// Same as [`init`](Self::init) with the HTTP quota checker
    pub fn from_config(config: GovernanceConfig) -> Result<Self> {
        let checker = HttpKeyChecker::new(&config.keys.base_url, config.keys.request_timeout)?;
        Self::init(config, Arc::new(checker))
    }

    pub fn cache(&self) -> &TtlCache<V> {
        &self.cache
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn limiters(&self) -> &RateLimiterSet {
        &self.limiters
    }

    /// Rate limit check on its own, for endpoints that do no remote work
    pub fn check_rate_limit(&self, class: &str, identifier: &str) -> Result<RateLimitStatus> {
        self.limiters.check(class, identifier)
    }

    /// Run `operation` under the full governance pipeline.
    ///
    /// `operation` gets the credential to authenticate with. A credential the
    /// provider rejects is marked failed and the next attempt picks another
    /// slot. Only successful results are cached, for `ttl`.
    pub async fn govern<F, Fut>(
        &self,
        class: &str,
        identifier: &str,
        cache_key: &str,
        ttl: Duration,
        operation: F,
    ) -> Result<Governed<V>>
    where
        F: Fn(SelectedKey) -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let request_id = Uuid::new_v4();
        let span = info_span!("govern", %request_id, class, cache_key);

        async move {
            let rate_limit = self.limiters.check(class, identifier)?;
            if !rate_limit.allowed {
                info!(
                    reset_after_secs = rate_limit.retry_after_secs(),
                    "Request denied by rate limit"
                );
                return Ok(Governed::Denied(rate_limit));
            }

            if let Some(value) = self.cache.get(cache_key) {
                return Ok(Governed::Served {
                    value,
                    rate_limit,
                    cache_hit: true,
                });
            }

            let result = with_retry_if(
                &self.retry,
                || self.attempt(&operation),
                |err: &GovernanceError| err.is_retryable() || err.implicates_credential(),
            )
            .await;

            match result {
                Ok(value) => {
                    self.cache.set(cache_key, value.clone(), ttl);
                    Ok(Governed::Served {
                        value,
                        rate_limit,
                        cache_hit: false,
                    })
                }
                Err(err) => {
                    log_error(&err, err.severity(), "governed request");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One remote call with the best key available right now
    async fn attempt<F, Fut>(&self, operation: &F) -> Result<V>
    where
        F: Fn(SelectedKey) -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let key = self.keys.get_best_available_key().await.ok_or_else(|| {
            GovernanceError::NoAvailableKey("every configured API key is unusable".to_string())
        })?;
        let slot = key.name.clone();

        match operation(key).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.implicates_credential() {
                    warn!(slot = %slot, "Provider rejected key");
                    self.keys.mark_key_as_failed(&slot, &err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Shape an error for an HTTP response in the configured environment
    pub fn error_response(&self, err: &GovernanceError) -> ErrorResponse {
        ErrorResponse::from_error(err, self.environment)
    }

    /// Stop every background task. Cached values and counters stay readable.
    pub fn shutdown(&self) {
        self.limiters.shutdown();
        self.cache.shutdown();
        if let Some(refresher) = &self.refresher {
            refresher.stop();
        }
        info!("Request governor shut down");
    }
}
