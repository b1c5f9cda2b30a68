// src/sweeper.rs
//! Cancellable background timer shared by the cache sweep, the limiter sweep
//! and the scheduled key refresh.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// A task that runs `job` every `period` until stopped or dropped.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    cancel_flag: Arc<AtomicBool>,
    handle: Mutex<Option<task::JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Spawn onto the current tokio runtime. The first run happens one
    /// `period` after spawning, not immediately.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.min(crate::config::MAX_EXPIRY);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel_flag);

        let handle = task::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                // Check if we should stop
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                job().await;
            }

            debug!(task = name, "Periodic task stopped");
        });

        Self {
            name,
            cancel_flag,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop the task. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
            debug!(task = self.name, "Periodic task cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel_flag.load(Ordering::SeqCst)
            && self
                .handle
                .lock()
                .as_ref()
                .map(|h| !h.is_finished())
                .unwrap_or(false)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
