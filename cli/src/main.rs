//! CLI for the geo feed.
//!
//! Discovers active open-source contributors and repositories in a
//! geographic area and maintains a refreshed, deduplicated feed, printed to
//! stdout after every cycle.

use clap::Parser;
use geo_feed::{
    Feed, FeedConfig, FeedError, GithubClient, JsonFileCache, RefreshSummary, RetryPolicy,
    SystemClock,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Geo Feed - Discover active open-source repositories in a geographic area.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Location to search for (e.g. "Amsterdam").
    #[arg(long)]
    location: String,

    /// GitHub Personal Access Token. Unauthenticated requests hit much
    /// stricter rate limits.
    #[arg(long, env = "GITHUB_TOKEN")]
    token: Option<String>,

    /// Maximum candidate accounts to collect per search.
    #[arg(long, default_value_t = 400)]
    max_users: usize,

    /// Maximum repositories in the feed.
    #[arg(long, default_value_t = 50)]
    max_repos: usize,

    /// Minimum star count for repositories.
    #[arg(long, default_value_t = 1)]
    star_limit: u32,

    /// Candidates per fanned-out repository search.
    #[arg(long, default_value_t = 20)]
    group_size: usize,

    /// Also search for organization accounts.
    #[arg(long)]
    orgs: bool,

    /// Delay between rate-limited retries, in seconds.
    #[arg(long, default_value_t = 60)]
    retry_delay_secs: u64,

    /// Path of the persisted snapshot.
    #[arg(long, default_value = "geo-feed.json")]
    cache_file: PathBuf,

    /// Refresh repeatedly at this interval, in seconds. Runs once if unset.
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Number of repositories to print after each refresh.
    #[arg(long, default_value_t = 10)]
    show: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    init_tracing();

    // Parse arguments
    let args = Args::parse();

    // Run the main logic
    match run(args).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(1)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info")
fn init_tracing() {
    tracing_subscriber::registry()
        // Use compact formatting without module target paths for cleaner output
        .with(fmt::layer().compact().with_target(false))
        // Allow runtime log filtering via RUST_LOG env var (e.g., RUST_LOG=debug)
        // Falls back to "info" level if RUST_LOG is not set or invalid
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        // Register as the global default subscriber
        .init();
}

/// Main execution logic.
async fn run(args: Args) -> Result<(), FeedError> {
    let config = FeedConfig::new(args.location.clone(), args.max_users, args.max_repos)
        .with_star_limit(args.star_limit)
        .with_group_size(args.group_size)
        .with_search_orgs(args.orgs)
        .with_retry(
            RetryPolicy::default().with_delay(Duration::from_secs(args.retry_delay_secs)),
        );

    let github = Arc::new(
        GithubClient::new(args.token.clone())
            .map_err(|e| FeedError::Search(geo_feed::SearchError::Other(e.to_string())))?,
    );
    let feed = Feed::new(
        config,
        Arc::clone(&github) as Arc<dyn geo_feed::SearchClient>,
        github,
        Arc::new(JsonFileCache::new(args.cache_file.clone())),
        Arc::new(SystemClock),
    );

    // Serve the previous run's feed until the first refresh completes.
    feed.rehydrate().await;

    loop {
        match feed.update().await {
            Ok(summary) => {
                print_summary(&summary);
                print_feed(&feed, args.show).await;
            }
            Err(e) => {
                // The previous snapshot stays authoritative; only a one-shot
                // run treats a failed cycle as fatal.
                error!(error = %e, "Refresh failed");
                if args.interval_secs.is_none() {
                    return Err(e);
                }
            }
        }

        match args.interval_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => return Ok(()),
        }
    }
}

/// Prints the refresh summary.
fn print_summary(summary: &RefreshSummary) {
    if summary.coalesced {
        println!("\nRefresh skipped: another refresh was already in flight");
        return;
    }
    println!("\nRefresh complete:");
    println!("  Users found: {}", summary.users_found);
    if summary.orgs_found > 0 {
        println!("  Organizations found: {}", summary.orgs_found);
    }
    println!("  Repositories in feed: {}", summary.repos_aggregated);
    println!(
        "  Contributor fetch failures: {}",
        summary.contributor_failures
    );
    println!("  Elapsed: {:.1}s", summary.duration.as_secs_f64());
}

/// Prints the top of the current feed.
async fn print_feed(feed: &Feed, count: usize) {
    let snapshot = feed.get(count).await;
    let today = feed.today().await;
    let hour = feed.hour().await;

    println!(
        "\nFeed for '{}' ({} repos, {} today, {} in the last hour):\n",
        snapshot.meta.location,
        snapshot.meta.total_repos,
        today.repos.len(),
        hour.repos.len()
    );

    for (i, repo) in snapshot.repos.iter().enumerate() {
        println!(
            "  [{}] {}/{} ({}) - {} stars, pushed {}",
            i + 1,
            repo.owner.login,
            repo.name,
            repo.language,
            repo.stars,
            repo.pushed_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(description) = &repo.description {
            println!("      {description}");
        }
    }
}
