//! Crawler module for incremental archiving
//!
//! This module contains the site-independent crawling machinery:
//! - Paced HTTP fetching and media archiving
//! - Frontier enumeration and new-item selection
//! - The per-run control loop with its execution budget
//! - Buffered entry writes and the bounded upload pool
//! - Overall coordination of the commands

pub mod budget;
mod coordinator;
pub mod dimensions;
pub mod driver;
pub mod fetcher;
pub mod frontier;
pub mod media;
pub mod pool;
pub mod thread;
pub mod writer;

pub use budget::Budget;
pub use coordinator::Coordinator;
pub use driver::{run_incremental, CrawlContext, CrawlReport, SiteAdapter};
pub use fetcher::{build_http_client, FetchResult, HttpClient};
pub use frontier::{select_new, walk_cursor, walk_known_streak};
pub use media::MediaArchiver;
pub use pool::{UploadJob, UploadPool};
pub use writer::EntryWriter;
