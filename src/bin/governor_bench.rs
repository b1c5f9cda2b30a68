// src/bin/governor_bench.rs

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::sync::{Barrier, Semaphore};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use request_governor::config::{CacheConfig, RateLimitConfig};
use request_governor::{FixedWindowLimiter, TtlCache};

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "governor_bench",
    about = "Throughput benchmark for the limiter and the response cache"
)]
struct Opt {
    /// Component to benchmark
    #[structopt(short, long, possible_values = &["limiter", "cache", "all"], default_value = "all")]
    target: String,

    /// Maximum number of requests allowed per window
    #[structopt(short, long, default_value = "1000")]
    max_requests: u64,

    /// Window duration in seconds
    #[structopt(short, long, default_value = "60")]
    window_seconds: u64,

    /// Distinct cache keys each user reads
    #[structopt(short = "k", long, default_value = "50")]
    keys_per_user: usize,

    /// Number of concurrent users to simulate
    #[structopt(short = "u", long, default_value = "10")]
    num_users: usize,

    /// Number of requests per user
    #[structopt(short = "r", long, default_value = "100")]
    requests_per_user: usize,

    /// Number of iterations to run
    #[structopt(short, long, default_value = "3")]
    iterations: usize,

    /// Maximum concurrency level
    #[structopt(short = "c", long, default_value = "100")]
    concurrency: usize,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,
}

/// Outcome counts for one iteration: (accepted, rejected)
type Tally = (usize, usize);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let log_level = match opt.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "governor_bench={},request_governor={}",
            log_level, log_level
        )))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if opt.target == "limiter" || opt.target == "all" {
        let limiter = Arc::new(FixedWindowLimiter::new(
            "bench",
            RateLimitConfig {
                max_requests: opt.max_requests,
                window: Duration::from_secs(opt.window_seconds),
            },
        ));
        run_benchmark("Fixed Window Limiter", &opt, ("allowed", "denied"), move |iteration, user| {
            let limiter = Arc::clone(&limiter);
            async move {
                // fresh window per iteration
                let identifier = format!("iter_{}:user_{}", iteration, user);
                limiter.check(&identifier).allowed
            }
        })
        .await;
    }

    if opt.target == "cache" || opt.target == "all" {
        let cache: TtlCache<Arc<String>> = TtlCache::new(CacheConfig {
            max_entries: opt.num_users.max(1) * opt.keys_per_user.max(1),
            use_background_task: false,
            ..CacheConfig::default()
        });
        let keys_per_user = opt.keys_per_user.max(1);
        let shared = cache.clone();
        run_benchmark("TTL Cache", &opt, ("hits", "misses"), move |_iteration, user| {
            let cache = shared.clone();
            async move {
                let key = format!("user_{}:{}", user, rand::random_range(0..keys_per_user));
                if cache.get(&key).is_some() {
                    return true;
                }
                cache.set_default(&key, Arc::new(format!("payload for {}", key)));
                false
            }
        })
        .await;
        info!(stats = ?cache.stats(), "Cache counters after benchmark");
    }

    Ok(())
}

async fn run_benchmark<F, Fut>(name: &str, opt: &Opt, labels: (&str, &str), request: F)
where
    F: Fn(usize, usize) -> Fut + Send + Sync + 'static + Clone,
    Fut: std::future::Future<Output = bool> + Send + 'static,
{
    println!("\nRunning benchmark: {}", name);
    println!("======================={}", "=".repeat(name.len()));

    let progress = ProgressBar::new(opt.iterations as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut total_duration = Duration::from_secs(0);
    let mut totals: Tally = (0, 0);

    for iteration in 0..opt.iterations {
        let start_time = Instant::now();
        let (accepted, rejected) = run_iteration(opt, iteration, request.clone()).await;
        let elapsed = start_time.elapsed();

        total_duration += elapsed;
        totals.0 += accepted;
        totals.1 += rejected;

        let requests_per_second = (accepted + rejected) as f64 / elapsed.as_secs_f64();
        progress.set_message(format!("{:.0} req/sec", requests_per_second));
        progress.inc(1);
        info!(
            iteration = iteration + 1,
            accepted, rejected, "Iteration finished"
        );
    }
    progress.finish_and_clear();

    let total_requests = totals.0 + totals.1;
    let share = |n: usize| 100.0 * n as f64 / total_requests.max(1) as f64;

    println!("\nBenchmark Results for {}:", name);
    println!("  Total Requests:     {}", total_requests);
    println!("  {:<20}{} ({:.1}%)", format!("{}:", labels.0), totals.0, share(totals.0));
    println!("  {:<20}{} ({:.1}%)", format!("{}:", labels.1), totals.1, share(totals.1));
    println!(
        "  Avg. Duration:      {:?}",
        total_duration / opt.iterations.max(1) as u32
    );
    println!(
        "  Avg. Throughput:    {:.2} requests/second",
        total_requests as f64 / total_duration.as_secs_f64()
    );
}

async fn run_iteration<F, Fut>(opt: &Opt, iteration: usize, request: F) -> Tally
where
    F: Fn(usize, usize) -> Fut + Send + Sync + 'static + Clone,
    Fut: std::future::Future<Output = bool> + Send + 'static,
{
    // Start every user at once
    let barrier = Arc::new(Barrier::new(opt.num_users));
    let semaphore = Arc::new(Semaphore::new(opt.concurrency));
    let mut handles = Vec::with_capacity(opt.num_users);

    for user in 0..opt.num_users {
        let barrier = Arc::clone(&barrier);
        let semaphore = Arc::clone(&semaphore);
        let request = request.clone();
        let requests_per_user = opt.requests_per_user;

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut tally: Tally = (0, 0);

            for _ in 0..requests_per_user {
                let Ok(_permit) = semaphore.acquire().await else {
                    break;
                };
                if request(iteration, user).await {
                    tally.0 += 1;
                } else {
                    tally.1 += 1;
                }
            }
            tally
        }));
    }

    futures::future::join_all(handles)
        .await
        .into_iter()
        .flatten()
        .fold((0, 0), |acc, tally| (acc.0 + tally.0, acc.1 + tally.1))
}
