// src/config/mod.rs

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{GovernanceError, Result};
use crate::resilience::RetryConfig;

/// Longest TTL or window honoured, longer ones are clamped to it
pub const MAX_EXPIRY: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Deployment mode, decides how much error detail reaches end users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Configuration for the in-memory response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL used when a caller does not pick one
    #[serde(default = "default_cache_ttl", with = "duration_serde")]
    pub default_ttl: Duration,

    /// Maximum number of entries to store
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Whether to use a background task for expiration
    #[serde(default = "default_use_background_task")]
    pub use_background_task: bool,

    /// How often to run the background expiration task
    #[serde(default = "default_cache_cleanup_interval", with = "duration_serde")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_cache_ttl(),
            max_entries: default_max_entries(),
            use_background_task: default_use_background_task(),
            cleanup_interval: default_cache_cleanup_interval(),
        }
    }
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_max_entries() -> usize {
    10_000
}

fn default_use_background_task() -> bool {
    true
}

fn default_cache_cleanup_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Configuration for fixed window algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed in the window
    pub max_requests: u64,

    /// Window duration
    #[serde(with = "duration_serde")]
    pub window: Duration,
}

impl RateLimitConfig {
    /// Limit for the expensive analysis endpoint
    pub fn analyze() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(15 * 60),
        }
    }

    /// Limit for the cheap read endpoints
    pub fn api() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Shared settings for every limiter instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Whether to use a background task for expiration
    #[serde(default = "default_use_background_task")]
    pub use_background_task: bool,

    /// How often stale windows are swept
    #[serde(default = "default_limiter_cleanup_interval", with = "duration_serde")]
    pub cleanup_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            use_background_task: default_use_background_task(),
            cleanup_interval: default_limiter_cleanup_interval(),
        }
    }
}

fn default_limiter_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_rate_limits() -> BTreeMap<String, RateLimitConfig> {
    let mut limits = BTreeMap::new();
    limits.insert("analyze".to_string(), RateLimitConfig::analyze());
    limits.insert("api".to_string(), RateLimitConfig::api());
    limits
}

/// One named credential slot
#[derive(Debug, Clone, Deserialize)]
pub struct KeySlotConfig {
    pub name: String,
    pub secret: SecretString,
}

impl KeySlotConfig {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: SecretString::new(secret.into()),
        }
    }
}

/// Configuration for the provider key manager
#[derive(Debug, Clone, Deserialize)]
pub struct KeyManagerConfig {
    /// Provider API root, the quota endpoint is `{base_url}/auth/key`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a single quota check
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// How long a check result is trusted
    #[serde(default = "default_status_cache_duration", with = "duration_serde")]
    pub cache_duration: Duration,

    /// How long a slot reported as failed is skipped without a re-check
    #[serde(default = "default_failure_cooldown", with = "duration_serde")]
    pub failure_cooldown: Duration,

    /// Period of the scheduled refresh job
    #[serde(default = "default_refresh_interval", with = "duration_serde")]
    pub refresh_interval: Duration,

    /// Whether the scheduled refresh job runs
    #[serde(default)]
    pub use_background_refresh: bool,

    /// Slots in priority order
    #[serde(default)]
    pub slots: Vec<KeySlotConfig>,
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            cache_duration: default_status_cache_duration(),
            failure_cooldown: default_failure_cooldown(),
            refresh_interval: default_refresh_interval(),
            use_background_refresh: false,
            slots: Vec::new(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_status_cache_duration() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_failure_cooldown() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// Everything the composition root needs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Limits per endpoint class
    #[serde(default = "default_rate_limits")]
    pub rate_limits: BTreeMap<String, RateLimitConfig>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub keys: KeyManagerConfig,
}

impl GovernanceConfig {
    /// Defaults plus the stock endpoint classes
    pub fn with_defaults() -> Self {
        Self {
            rate_limits: default_rate_limits(),
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source, `lookup` returns `None` for unset names
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::with_defaults();

        if let Some(env) = lookup("APP_ENV") {
            config.environment = Environment::parse(&env);
        }

        if let Some(url) = lookup("LLM_API_BASE_URL") {
            config.keys.base_url = url;
        }

        if let Some(ms) = lookup("LLM_REQUEST_TIMEOUT_MS") {
            let ms = ms.trim().parse::<u64>().map_err(|e| {
                GovernanceError::Config(format!("LLM_REQUEST_TIMEOUT_MS is not a number: {}", e))
            })?;
            config.keys.request_timeout = Duration::from_millis(ms);
        }

        if let Some(secs) = lookup("CACHE_TTL_SECONDS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                GovernanceError::Config(format!("CACHE_TTL_SECONDS is not a number: {}", e))
            })?;
            config.cache.default_ttl = Duration::from_secs(secs);
        }

        for (name, var) in [("primary", "LLM_API_KEY"), ("fallback", "LLM_API_KEY_FALLBACK")] {
            if let Some(secret) = lookup(var).filter(|s| !s.trim().is_empty()) {
                config.keys.slots.push(KeySlotConfig::new(name, secret));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.slots.is_empty() {
            return Err(GovernanceError::Config(
                "at least one API key slot must be configured".to_string(),
            ));
        }

        for (class, limit) in &self.rate_limits {
            if limit.max_requests == 0 || limit.window.is_zero() {
                return Err(GovernanceError::Config(format!(
                    "rate limit '{}' needs a non-zero max_requests and window",
                    class
                )));
            }
        }

        if self.cache.max_entries == 0 {
            return Err(GovernanceError::Config(
                "cache.max_entries must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

// Helper module to serialize/deserialize Duration with serde
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

pub(crate) mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
