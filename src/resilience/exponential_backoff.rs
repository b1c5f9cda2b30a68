use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{duration_serde, option_duration_serde};

/// Configuration for retry strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, the first one included. 0 behaves like 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Delay after the first failed attempt
    #[serde(default = "default_initial_backoff", with = "duration_serde")]
    pub initial_backoff: Duration,
    /// Optional ceiling; `None` lets the delay grow without bound
    #[serde(default, with = "option_duration_serde")]
    pub max_backoff: Option<Duration>,
    /// Multiplier for exponential backoff
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff
    #[serde(default)]
    pub use_jitter: bool,
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(1000)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: None,
            backoff_multiplier: default_backoff_multiplier(),
            use_jitter: false,
        }
    }
}

impl RetryConfig {
    /// `max_attempts` tries with a doubling delay starting at `base_delay`
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: base_delay,
            ..Self::default()
        }
    }
}

/// Exponential backoff schedule between attempts
pub struct ExponentialBackoff {
    /// Number of delays handed out so far
    current_attempt: usize,
    /// Configuration for the retry strategy
    config: RetryConfig,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current_attempt: 0,
            config,
        }
    }

    /// Delay before the next attempt, or `None` once every attempt is used.
    ///
    /// The n-th delay (0-based) is `initial_backoff * multiplier^n`.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        // attempts - 1 delays fit between attempts
        let max_delays = self.config.max_attempts.saturating_sub(1);
        if self.current_attempt >= max_delays {
            return None;
        }

        let exp = self.current_attempt as f64;
        self.current_attempt += 1;

        let base_ms = self.config.initial_backoff.as_millis() as f64;
        let backoff_ms = base_ms * self.config.backoff_multiplier.powf(exp);
        let capped_ms = match self.config.max_backoff {
            Some(max) => backoff_ms.min(max.as_millis() as f64),
            None => backoff_ms,
        };

        let jittered_ms = if self.config.use_jitter {
            // Add jitter: random value between 50% and 100% of the calculated backoff
            let jitter = rand::random::<f64>() * 0.5 + 0.5;
            (capped_ms * jitter) as u64
        } else {
            capped_ms as u64
        };

        Some(Duration::from_millis(jittered_ms))
    }

    /// Reset the backoff to start from the beginning
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
