// src/bin/governor_cli.rs

use prettytable::{row, Table};
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use request_governor::config::{GovernanceConfig, RateLimitConfig};
use request_governor::keys::KeyManager;
use request_governor::FixedWindowLimiter;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "governor_cli",
    about = "Exercise the request governor from the command line"
)]
struct Opt {
    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: usize,

    /// Disable logs
    #[structopt(long, global = true)]
    disable_logs: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Send simulated traffic through a fixed-window limiter
    Simulate {
        /// Endpoint class whose preset to start from
        #[structopt(short, long, possible_values = &["analyze", "api"], default_value = "analyze")]
        class: String,

        /// Client identifier, usually an IP address
        #[structopt(short, long, default_value = "127.0.0.1")]
        identifier: String,

        /// Override the preset's maximum requests per window
        #[structopt(short, long)]
        max_requests: Option<u64>,

        /// Override the preset's window, in seconds
        #[structopt(short, long)]
        window_seconds: Option<u64>,

        /// Simulation mode
        #[structopt(long, possible_values = &["burst", "steady"], default_value = "burst")]
        simulation: String,

        /// Number of requests to simulate
        #[structopt(short = "n", long, default_value = "10")]
        num_requests: usize,

        /// Time between requests in milliseconds (steady mode)
        #[structopt(short = "t", long, default_value = "100")]
        request_interval_ms: u64,
    },

    /// Check every configured API key against the provider and print a table
    Keys,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let opt = Opt::from_args();

    let log_level = if opt.disable_logs {
        "error"
    } else {
        match opt.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "governor_cli={},request_governor={}",
            log_level, log_level
        )))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match opt.command {
        Command::Simulate {
            class,
            identifier,
            max_requests,
            window_seconds,
            simulation,
            num_requests,
            request_interval_ms,
        } => {
            let mut limit = if class == "api" {
                RateLimitConfig::api()
            } else {
                RateLimitConfig::analyze()
            };
            if let Some(max) = max_requests {
                limit.max_requests = max;
            }
            if let Some(secs) = window_seconds {
                limit.window = Duration::from_secs(secs);
            }

            info!(
                class = %class,
                max_requests = limit.max_requests,
                window_secs = limit.window.as_secs(),
                "Starting simulation"
            );

            let limiter = FixedWindowLimiter::new(class, limit);
            let interval = match simulation.as_str() {
                "steady" => Some(Duration::from_millis(request_interval_ms)),
                _ => None,
            };
            simulate(&limiter, &identifier, num_requests, interval).await;
        }
        Command::Keys => print_key_table().await?,
    }

    Ok(())
}

// Burst when `interval` is None, otherwise one request per interval
async fn simulate(
    limiter: &FixedWindowLimiter,
    identifier: &str,
    num_requests: usize,
    interval: Option<Duration>,
) {
    let mut allowed_count = 0;
    let mut denied_count = 0;
    let start_time = Instant::now();

    for i in 0..num_requests {
        let request_time = Instant::now();
        let status = limiter.check(identifier);

        if status.allowed {
            allowed_count += 1;
            info!(
                "Request {}: ALLOWED (remaining: {})",
                i + 1,
                status.remaining
            );
        } else {
            denied_count += 1;
            warn!(
                "Request {}: DENIED (retry after: {}s)",
                i + 1,
                status.retry_after_secs()
            );
        }

        if let Some(interval) = interval {
            let elapsed = request_time.elapsed();
            if elapsed < interval {
                time::sleep(interval - elapsed).await;
            }
        }
    }

    let mode = if interval.is_some() { "Steady" } else { "Burst" };
    println!("\n{} Simulation Results:", mode);
    println!("{}", "-".repeat(mode.len() + 20));
    println!("Total requests: {}", num_requests);
    println!("Allowed: {}", allowed_count);
    println!("Denied: {}", denied_count);
    println!("Time elapsed: {:?}", start_time.elapsed());
}

async fn print_key_table() -> Result<(), Box<dyn std::error::Error>> {
    let config = GovernanceConfig::from_env()?;
    let manager = KeyManager::from_config(&config.keys)?;

    let statuses = manager.refresh_all_key_status().await;

    let mut table = Table::new();
    table.add_row(row!["Slot", "State", "Credits", "Requests left", "Error"]);
    for name in manager.slot_names() {
        let Some(status) = statuses.get(name) else {
            continue;
        };
        table.add_row(row![
            status.name,
            format!("{:?}", status.state),
            status
                .credits
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "unlimited".to_string()),
            status
                .rate_limit_remaining
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status.error.as_deref().unwrap_or("")
        ]);
    }
    table.printstd();

    Ok(())
}
