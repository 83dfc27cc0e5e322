//! Hoard main entry point
//!
//! This is the command-line interface for the Hoard archival crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hoard::config::{load_config_with_hash, Config};
use hoard::crawler::{Budget, Coordinator};
use hoard::model::{Site, Visibility};
use hoard::output::{load_statistics, print_crawl_reports, print_statistics};
use hoard::storage::lock;
use hoard::views;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Hoard: an incremental archival crawler
///
/// Hoard pages through bookmark and timeline feeds, archives whatever has not
/// been archived yet, and keeps a published index of the IDs it already has.
#[derive(Parser, Debug)]
#[command(name = "hoard")]
#[command(version = "1.0.0")]
#[command(about = "An incremental archival crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scheduled crawl of one or more sites
    Crawl {
        #[arg(required = true, value_name = "SITE")]
        sites: Vec<Site>,

        /// Execution budget of each site, overriding crawler.budget-seconds
        #[arg(long)]
        budget_seconds: Option<u64>,
    },

    /// Archive the downloadables of booth orders
    Booth {
        /// Order numbers or order page URLs
        #[arg(required = true, value_name = "ORDER")]
        orders: Vec<String>,
    },

    /// Register or replace a session credential
    Session {
        /// Session ID, e.g. `pixiv` or `twitter:alice`
        id: String,
        credential: String,
    },

    /// Rebuild and publish the known-ID index of a site
    RebuildIndex { site: Site },

    /// Print randomly sampled entries with signed media URLs
    Random {
        site: Site,

        #[arg(long, value_parser = parse_visibility)]
        visibility: Option<Visibility>,

        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Recompute the dimension metadata of every stored image
    BackfillDimensions,

    /// Show statistics from the database and exit
    Stats,
}

fn parse_visibility(value: &str) -> Result<Visibility, String> {
    Visibility::from_db_string(value)
        .ok_or_else(|| format!("expected 'public' or 'private', got '{}'", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded successfully (hash: {})", config_hash);

    let budget_defaults = config.crawler.clone();
    let url_ttl = Duration::from_secs(config.storage.signed_url_ttl);
    let coordinator = Coordinator::new(config, config_hash).context("failed to open the archive")?;

    match cli.command {
        Command::Crawl {
            sites,
            budget_seconds,
        } => {
            for site in sites {
                let budget = Budget::from_config(&budget_defaults, budget_seconds);
                let reports = coordinator
                    .crawl_site(site, &budget)
                    .await
                    .with_context(|| format!("crawl of {} failed", site))?;
                print_crawl_reports(site, &reports);
            }
        }
        Command::Booth { orders } => {
            let report = coordinator.archive_booth(&orders).await?;
            println!(
                "booth: {} orders, {} downloadables ({} skipped), {} files uploaded, {} failed",
                report.orders, report.downloadables, report.skipped, report.uploaded, report.failed
            );
        }
        Command::Session { id, credential } => {
            coordinator.register_session(&id, &credential)?;
        }
        Command::RebuildIndex { site } => {
            let count = coordinator.rebuild_index(site).await?;
            println!("{}: published {} ids", site, count);
        }
        Command::Random {
            site,
            visibility,
            count,
        } => {
            let blobs = coordinator.blobs();
            let entries = views::random_entries(
                coordinator.storage(),
                blobs.as_ref(),
                site,
                visibility,
                count,
                url_ttl,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::BackfillDimensions => {
            let blobs = coordinator.blobs();
            let report = views::backfill_dimensions(blobs.as_ref()).await?;
            println!(
                "{} updated, {} skipped, {} failed",
                report.updated, report.skipped, report.failed
            );
        }
        Command::Stats => handle_stats(&coordinator)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hoard=info,warn"),
            1 => EnvFilter::new("hoard=debug,info"),
            2 => EnvFilter::new("hoard=trace,debug"),
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

/// Handles the stats command: shows statistics from the database
fn handle_stats(coordinator: &Coordinator) -> anyhow::Result<()> {
    let config: &Config = coordinator.config();
    println!("Database: {}\n", config.storage.database_path);

    let stats = {
        let storage = lock(coordinator.storage())?;
        load_statistics(&*storage)?
    };
    print_statistics(&stats);

    Ok(())
}
