//! Statistics reporting
//!
//! Formats the summary returned by a crawl, and the persisted state of a
//! database-backed crawl for `--stats`.

use crate::crawler::CrawlStats;
use crate::storage::{HistoryStore, QueueStore, RunRecord, SqliteStore, StorageResult};
use std::fmt::Write as _;
use std::time::Duration;

/// Persisted crawl state read back from a database
#[derive(Debug, Clone)]
pub struct StoredStatistics {
    /// Number of distinct URL keys ever registered
    pub urls_registered: u64,

    /// Entries still waiting in the queue
    pub queued: u64,

    /// Most recent run, if any run was recorded
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from a SQLite store
pub fn load_statistics(store: &SqliteStore) -> StorageResult<StoredStatistics> {
    Ok(StoredStatistics {
        urls_registered: store.registered_count()?,
        queued: store.count()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Renders the summary of a finished crawl
pub fn format_statistics(stats: &CrawlStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Crawl Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Elapsed: {}", format_duration(stats.elapsed));
    let _ = writeln!(out, "  Final phase: {}", stats.phase);
    match stats.stop_reason {
        Some(reason) => {
            let _ = writeln!(out, "  Stopped early: {}", reason);
        }
        None => {
            let _ = writeln!(out, "  Stopped early: no (queue exhausted)");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Downloads:");
    let _ = writeln!(out, "  Started: {}", stats.downloads_started);
    let _ = writeln!(out, "  Completed: {}", stats.downloads_completed);
    let _ = writeln!(out, "  Failed: {}", stats.download_errors);
    let _ = writeln!(out, "  Pages counted toward limit: {}", stats.pages_crawled);
    let _ = writeln!(out);

    let _ = writeln!(out, "URLs:");
    let _ = writeln!(out, "  Registered: {}", stats.urls_registered);
    let _ = writeln!(out, "  Still queued: {}", stats.queued_remaining);
    let _ = writeln!(out);

    if stats.pipeline_errors > 0 {
        let _ = writeln!(out, "Pipeline errors: {}\n", stats.pipeline_errors);
    }

    let success_rate = if stats.downloads_started > 0 {
        (stats.downloads_completed as f64 / stats.downloads_started as f64) * 100.0
    } else {
        0.0
    };
    let _ = write!(
        out,
        "Success Rate: {:.1}% ({} / {} downloads completed)",
        success_rate, stats.downloads_completed, stats.downloads_started
    );

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStats) {
    println!("{}", format_statistics(stats));
}

/// Prints persisted statistics to stdout
pub fn print_stored_statistics(stats: &StoredStatistics) {
    println!("=== Stored Crawl State ===\n");
    println!("  URLs registered: {}", stats.urls_registered);
    println!("  Entries queued: {}", stats.queued);

    match &stats.latest_run {
        Some(run) => {
            println!("\nLatest run #{}:", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("\nNo runs recorded"),
    }
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}
