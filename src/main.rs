use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use request_governor::keys::KeyState;
use request_governor::{init_logging, GovernanceConfig, RequestGovernor};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();
    info!("Request governor starting up");

    let mut config = match GovernanceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // long-running process, keep key statuses current
    config.keys.use_background_refresh = true;

    let governor = match RequestGovernor::<serde_json::Value>::from_config(config) {
        Ok(governor) => governor,
        Err(e) => {
            error!(error = %e, "Failed to initialize request governor");
            std::process::exit(1);
        }
    };

    // Warm up key statuses so the first request does not pay for the checks
    let statuses = governor.keys().refresh_all_key_status().await;
    let available = statuses
        .values()
        .filter(|s| s.state == KeyState::Available)
        .count();
    if available == 0 {
        warn!(slots = statuses.len(), "No API key is usable at startup");
    } else {
        info!(available, slots = statuses.len(), "Key statuses loaded");
    }

    let shutdown = Arc::new(Notify::new());
    let notifier = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || notifier.notify_one()) {
        error!(error = %e, "Failed to install Ctrl-C handler");
        std::process::exit(1);
    }

    info!(
        classes = ?governor.limiters().classes().collect::<Vec<_>>(),
        "Request governor ready, press Ctrl-C to stop"
    );
    shutdown.notified().await;

    governor.shutdown();
    info!(cache = ?governor.cache().stats(), "Request governor stopped");
}
