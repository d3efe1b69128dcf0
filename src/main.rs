//! Ripple Engine main entry point
//!
//! This is the command-line interface for the Ripple Engine crawler.

use clap::Parser;
use ripple_engine::config::{load_config_with_hash, Config, StorageBackend};
use ripple_engine::crawler::Coordinator;
use ripple_engine::output::{load_statistics, print_statistics, print_stored_statistics};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ripple Engine: a concurrent web crawler
///
/// Ripple Engine starts from a set of seed URLs, follows links up to the
/// configured limits, and reports what it fetched. With the SQLite storage
/// backend an interrupted crawl resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "ripple-engine")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring previous state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_engine=info,warn"),
            1 => EnvFilter::new("ripple_engine=debug,info"),
            2 => EnvFilter::new("ripple_engine=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn or_unlimited<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unlimited".to_string(), |v| v.to_string())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Ripple Engine Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", or_unlimited(config.crawler.max_depth));
    println!(
        "  Max concurrent downloads: {}",
        config.crawler.max_concurrent_downloads
    );
    println!("  Max downloads: {}", or_unlimited(config.crawler.max_downloads));
    println!(
        "  Max download errors: {}",
        or_unlimited(config.crawler.max_download_errors)
    );
    println!(
        "  Max crawl time: {}",
        or_unlimited(config.crawler.max_crawl_time.map(|s| format!("{}s", s)))
    );
    println!("  Queue order: {:?}", config.crawler.queue_order);

    println!("\nDownloads:");
    println!("  Connect timeout: {}ms", config.download.connect_timeout);
    println!("  Read timeout: {}ms", config.download.read_timeout);
    println!(
        "  Retries: {} (delay {}ms)",
        config.download.retry_count, config.download.retry_delay
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nFilters:");
    println!("  Include: {:?}", config.filters.include);
    println!("  Exclude: {:?}", config.filters.exclude);
    println!("  Follow external links: {}", config.filters.follow_external);
    println!("  Respect robots.txt: {}", config.filters.respect_robots);

    println!("\nStorage:");
    match (config.storage.backend, &config.storage.database_path) {
        (StorageBackend::Sqlite, Some(path)) => println!("  SQLite database: {}", path),
        _ => println!("  In memory"),
    }

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use ripple_engine::storage::SqliteStore;
    use std::path::Path;

    let Some(path) = config.storage.database_path.as_deref() else {
        return Err("--stats requires storage.database-path".into());
    };

    println!("Database: {}\n", path);
    let store = SqliteStore::open(Path::new(path), config.crawler.queue_order)?;
    let stats = load_statistics(&store)?;
    print_stored_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if a queue was left behind)");
    }

    let crawler = Coordinator::from_config(config, config_hash, fresh)?;

    let interrupt = {
        let crawler = crawler.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, finishing in-flight downloads");
                if let Err(e) = crawler.cancel() {
                    tracing::debug!("{}", e);
                }
            }
        })
    };

    let result = crawler.crawl().await;
    interrupt.abort();

    match result {
        Ok(stats) => {
            print_statistics(&stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
