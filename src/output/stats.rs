//! Statistics generation from the archive database
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the storage layer.

use crate::model::Site;
use crate::storage::{CounterStore, EntryStore, RunRecord, RunStore};
use crate::Result;
use chrono::{DateTime, Utc};

/// Number of runs shown by [`print_statistics`]
pub const RECENT_RUNS: usize = 10;

/// Archive statistics summary
#[derive(Debug, Clone, Default)]
pub struct ArchiveStatistics {
    /// Archived entries of every site, in [`Site::ALL`] order
    pub entries_by_site: Vec<(Site, u64)>,

    /// Media counters such as `PixivImageSaved`
    pub counters: Vec<(String, u64)>,

    /// Latest runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

impl ArchiveStatistics {
    pub fn total_entries(&self) -> u64 {
        self.entries_by_site.iter().map(|(_, count)| count).sum()
    }
}

/// Loads statistics from storage
pub fn load_statistics<S>(storage: &S) -> Result<ArchiveStatistics>
where
    S: EntryStore + CounterStore + RunStore + ?Sized,
{
    let mut entries_by_site = Vec::with_capacity(Site::ALL.len());
    for site in Site::ALL {
        entries_by_site.push((site, storage.count_entries(site)?));
    }

    Ok(ArchiveStatistics {
        entries_by_site,
        counters: storage.get_counters()?,
        recent_runs: storage.get_latest_runs(RECENT_RUNS)?,
    })
}

/// Duration of a finished run in seconds
fn run_duration(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<DateTime<Utc>>().ok()?;
    let finished = run.finished_at.as_deref()?.parse::<DateTime<Utc>>().ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Entries by Site:");
    for (site, count) in &stats.entries_by_site {
        println!("  {}: {}", site, count);
    }
    println!("  Total: {}", stats.total_entries());
    println!();

    if !stats.counters.is_empty() {
        println!("Counters:");
        for (name, value) in &stats.counters {
            println!("  {}: {}", name, value);
        }
        println!();
    }

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            let duration = run_duration(run)
                .map(|secs| format!("{}s", secs))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  #{} {} {} ({} archived, {} skipped, {}) started {}",
                run.id,
                run.site,
                run.status.to_db_string(),
                run.archived,
                run.skipped,
                duration,
                run.started_at
            );
        }
    }
}
