// src/keys/manager.rs

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{HttpKeyChecker, KeyCheck, KeyHealthCheck, KeyState, KeyStatus, SelectedKey};
use crate::config::{KeyManagerConfig, KeySlotConfig};
use crate::error::{Result, Severity};

/// Tracks the health of every configured credential slot and picks the best
/// usable one. Slots are tried strictly in configuration order.
#[derive(Debug)]
pub struct KeyManager {
    slots: Vec<KeySlotConfig>,
    statuses: RwLock<HashMap<String, KeyStatus>>,
    checker: Arc<dyn KeyHealthCheck>,
    cache_duration: Duration,
    failure_cooldown: Duration,
}

impl KeyManager {
    pub fn new(config: &KeyManagerConfig, checker: Arc<dyn KeyHealthCheck>) -> Self {
        let statuses = config
            .slots
            .iter()
            .map(|slot| {
                (
                    slot.name.clone(),
                    KeyStatus::unknown(&slot.name),
                )
            })
            .collect();

        Self {
            slots: config.slots.clone(),
            statuses: RwLock::new(statuses),
            checker,
            cache_duration: config.cache_duration,
            failure_cooldown: config.failure_cooldown,
        }
    }

    /// Manager that checks keys over HTTP against `config.base_url`
    pub fn from_config(config: &KeyManagerConfig) -> Result<Self> {
        let checker = HttpKeyChecker::new(&config.base_url, config.request_timeout)?;
        Ok(Self::new(config, Arc::new(checker)))
    }

    /// Slot names in priority order
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// Pick the first slot that is usable.
    ///
    /// A slot whose fresh status says available is used without a network
    /// call. A slot a caller recently reported as failed is skipped until
    /// `failure_cooldown` passes. Anything else gets a live check. `None`
    /// means every slot is unusable.
    pub async fn get_best_available_key(&self) -> Option<SelectedKey> {
        for slot in &self.slots {
            let now = Instant::now();
            let cached = self.statuses.read().get(&slot.name).cloned();

            if let Some(status) = cached {
                if status.is_available() && status.is_fresh(now, self.cache_duration) {
                    debug!(slot = %slot.name, "Using cached key status");
                    return Some(Self::select(slot));
                }

                if status.reported_failure && status.is_fresh(now, self.failure_cooldown) {
                    debug!(slot = %slot.name, "Skipping key reported as failed");
                    continue;
                }
            }

            let status = self.check_slot(slot).await;
            if status.is_available() {
                info!(slot = %slot.name, credits = status.credits, "Selected key after live check");
                return Some(Self::select(slot));
            }

            warn!(
                slot = %slot.name,
                error = status.error.as_deref().unwrap_or("unknown"),
                "Key unavailable, trying next slot"
            );
        }

        error!(
            severity = %Severity::Critical,
            slots = self.slots.len(),
            "No API key available"
        );
        None
    }

    fn select(slot: &KeySlotConfig) -> SelectedKey {
        SelectedKey {
            name: slot.name.clone(),
            credential: slot.secret.clone(),
        }
    }

    /// Run a live check for one slot and store the result
    async fn check_slot(&self, slot: &KeySlotConfig) -> KeyStatus {
        if let Some(status) = self.statuses.write().get_mut(&slot.name) {
            status.state = KeyState::Checking;
        }

        let check = self.checker.check(&slot.secret).await;
        let status = Self::status_from_check(slot, check);

        self.statuses
            .write()
            .insert(slot.name.clone(), status.clone());
        status
    }

    fn status_from_check(slot: &KeySlotConfig, check: KeyCheck) -> KeyStatus {
        let mut status = KeyStatus::unknown(&slot.name);
        status.last_checked = Some(Instant::now());
        status.checked_at = Some(Utc::now());
        status.credits = check.credits;
        status.rate_limit_remaining = check.rate_limit_remaining;
        status.error = check.error;

        status.state = if !check.available {
            KeyState::Unavailable
        } else if !status.has_quota() {
            status.error = Some("no remaining credits".to_string());
            KeyState::Unavailable
        } else {
            KeyState::Available
        };

        status
    }

    /// Live check of one slot by name, `None` for an unknown name
    pub async fn check_key(&self, name: &str) -> Option<KeyStatus> {
        let slot = self.slots.iter().find(|slot| slot.name == name)?;
        Some(self.check_slot(slot).await)
    }

    /// Flag a slot as unusable right away, e.g. after a live call was
    /// rejected. Returns `false` when no slot has that name.
    pub fn mark_key_as_failed(&self, name: &str, reason: &str) -> bool {
        let mut statuses = self.statuses.write();
        let Some(status) = statuses.get_mut(name) else {
            warn!(slot = name, "Tried to mark an unknown key as failed");
            return false;
        };

        status.state = KeyState::Unavailable;
        status.error = Some(reason.to_string());
        status.reported_failure = true;
        status.last_checked = Some(Instant::now());
        status.checked_at = Some(Utc::now());

        warn!(slot = name, reason, "Key marked as failed");
        true
    }

    /// Copy of every slot's status
    pub fn get_all_key_status(&self) -> HashMap<String, KeyStatus> {
        self.statuses.read().clone()
    }

    /// Live check of every slot regardless of freshness
    pub async fn refresh_all_key_status(&self) -> HashMap<String, KeyStatus> {
        for slot in &self.slots {
            let status = self.check_slot(slot).await;
            debug!(slot = %slot.name, state = ?status.state, "Key status refreshed");
        }

        let statuses = self.get_all_key_status();
        let available = statuses.values().filter(|s| s.is_available()).count();
        info!(available, total = statuses.len(), "Refreshed all key statuses");
        statuses
    }
}
