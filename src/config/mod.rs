//! Configuration module for Hoard
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use hoard::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("hoard.toml")).unwrap();
//! println!("Pausing {}ms between requests", config.crawler.request_delay);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BoothConfig, Config, CrawlerConfig, FanboxConfig, IndexSource, PixivConfig, PoipikuConfig,
    StorageConfig, TwitterConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
