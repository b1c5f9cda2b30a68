// src/keys/mod.rs
//! Credential pool for the LLM provider.
//!
//! A small fixed set of named slots ("primary", "fallback", ...) is checked
//! against the provider's quota endpoint and the best usable one is handed out
//! for each outbound call. Check results are trusted for `cache_duration`;
//! callers report live failures with [`KeyManager::mark_key_as_failed`].
//!
//! Slot lifecycle: `Unknown -> Checking -> {Available, Unavailable}`. Only a
//! successful live check moves a slot back to `Available`.

mod checker;
mod manager;
mod refresher;

#[cfg(test)]
mod tests;

pub use checker::{HttpKeyChecker, KeyCheck, KeyHealthCheck};
pub use manager::KeyManager;
pub use refresher::KeyRefresher;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Where a slot is in its health lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Unknown,
    Checking,
    Available,
    Unavailable,
}

/// Last known health of one credential slot
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub name: String,
    pub state: KeyState,
    #[serde(skip)]
    pub last_checked: Option<Instant>,
    pub checked_at: Option<DateTime<Utc>>,
    pub credits: Option<f64>,
    pub rate_limit_remaining: Option<u64>,
    pub error: Option<String>,
    /// Set when a caller reported the failure rather than a check
    pub reported_failure: bool,
}

impl KeyStatus {
    pub(crate) fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: KeyState::Unknown,
            last_checked: None,
            checked_at: None,
            credits: None,
            rate_limit_remaining: None,
            error: None,
            reported_failure: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == KeyState::Available
    }

    /// Checked less than `max_age` ago
    pub fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        self.last_checked
            .map(|checked| now.saturating_duration_since(checked) < max_age)
            .unwrap_or(false)
    }

    /// Unknown credit means the provider enforces no limit on this key
    pub fn has_quota(&self) -> bool {
        self.credits.map(|c| c > 0.0).unwrap_or(true)
    }
}

/// Credential handed to the caller for one outbound call
#[derive(Debug, Clone)]
pub struct SelectedKey {
    pub name: String,
    pub credential: SecretString,
}
