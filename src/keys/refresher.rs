use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::KeyManager;
use crate::sweeper::PeriodicTask;

/// Scheduled job that re-checks every key slot
#[derive(Debug)]
pub struct KeyRefresher {
    /// Key manager reference
    manager: Arc<KeyManager>,
    /// How often all slots are re-checked
    interval: Duration,
    /// Background task, present while running
    task: Option<PeriodicTask>,
}

impl KeyRefresher {
    /// Create a refresher; nothing runs until [`start`](Self::start)
    pub fn new(manager: Arc<KeyManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            task: None,
        }
    }

    /// Start the refresh background task. Calling it twice keeps one task.
    pub fn start(&mut self) {
        if self.task.as_ref().is_some_and(PeriodicTask::is_running) {
            return;
        }

        let manager = Arc::clone(&self.manager);
        self.task = Some(PeriodicTask::spawn("key-refresh", self.interval, move || {
            let manager = Arc::clone(&manager);
            async move {
                let statuses = manager.refresh_all_key_status().await;
                if !statuses.values().any(|s| s.is_available()) {
                    warn!("Scheduled refresh found no usable API key");
                }
            }
        }));

        info!(interval_secs = self.interval.as_secs(), "Key refresher started");
    }

    /// Stop the refresher
    pub fn stop(&self) {
        if let Some(task) = &self.task {
            task.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(PeriodicTask::is_running)
    }
}
