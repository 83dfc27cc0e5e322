//! Output module for reporting on the archive
//!
//! This module handles:
//! - Collecting archive statistics from storage
//! - Printing command results for the CLI

pub mod stats;

pub use stats::{load_statistics, print_statistics, ArchiveStatistics};

use crate::crawler::CrawlReport;
use crate::model::Site;

/// Prints the outcome of a scheduled crawl
pub fn print_crawl_reports(site: Site, reports: &[CrawlReport]) {
    for report in reports {
        println!(
            "{}: {} selected, {} archived, {} skipped{}",
            site,
            report.selected,
            report.archived,
            report.skipped,
            if report.interrupted { " (interrupted)" } else { "" }
        );
    }
}
