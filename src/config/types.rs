use crate::model::Visibility;
use serde::Deserialize;

/// Main configuration structure for Hoard
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub pixiv: PixivConfig,
    #[serde(default)]
    pub fanbox: FanboxConfig,
    #[serde(default)]
    pub poipiku: PoipikuConfig,
    #[serde(default)]
    pub booth: BoothConfig,
}

/// Where a crawl run gets its known-ID index from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    /// Full scan of the entry store
    #[default]
    Scan,
    /// Published snapshot blob, falling back to a scan when missing
    Snapshot,
}

/// Crawl loop behavior shared by every site
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Fixed pause before every external request (milliseconds)
    #[serde(rename = "request-delay", default = "default_request_delay")]
    pub request_delay: u64,

    /// Execution budget of a scheduled run (seconds)
    #[serde(rename = "budget-seconds", default = "default_budget_seconds")]
    pub budget_seconds: u64,

    /// Remaining budget below which no new item is started (seconds)
    #[serde(rename = "soft-deadline-seconds", default = "default_soft_deadline")]
    pub soft_deadline_seconds: u64,

    /// Remaining budget below which no further media is fetched (seconds)
    #[serde(rename = "hard-deadline-seconds", default = "default_hard_deadline")]
    pub hard_deadline_seconds: u64,

    /// Publish the known-ID snapshot every N archived items
    #[serde(rename = "index-flush-interval", default = "default_index_flush_interval")]
    pub index_flush_interval: usize,

    /// Entries buffered before a batch write (1 writes immediately)
    #[serde(rename = "entry-batch-size", default = "default_entry_batch_size")]
    pub entry_batch_size: usize,

    /// Retries of a feed page that answered with a body-level error
    #[serde(rename = "soft-error-retries", default = "default_soft_error_retries")]
    pub soft_error_retries: u32,

    #[serde(rename = "index-source", default)]
    pub index_source: IndexSource,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay: default_request_delay(),
            budget_seconds: default_budget_seconds(),
            soft_deadline_seconds: default_soft_deadline(),
            hard_deadline_seconds: default_hard_deadline(),
            index_flush_interval: default_index_flush_interval(),
            entry_batch_size: default_entry_batch_size(),
            soft_error_retries: default_soft_error_retries(),
            index_source: IndexSource::default(),
        }
    }
}

/// User agent sent to every site
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_user_agent")]
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: default_user_agent(),
        }
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory of the blob store
    #[serde(rename = "blob-root")]
    pub blob_root: String,

    /// Secret used to sign blob URLs
    #[serde(rename = "signing-secret")]
    pub signing_secret: String,

    /// Base URL the signed blob URLs point at
    #[serde(rename = "public-base-url")]
    pub public_base_url: String,

    /// Lifetime of a signed URL (seconds)
    #[serde(rename = "signed-url-ttl", default = "default_signed_url_ttl")]
    pub signed_url_ttl: u64,
}

/// Twitter favorites crawler
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    #[serde(rename = "api-base", default = "default_twitter_api")]
    pub api_base: String,

    /// Screen names whose favorites are archived
    #[serde(default)]
    pub accounts: Vec<String>,

    #[serde(rename = "page-size", default = "default_twitter_page_size")]
    pub page_size: u32,

    #[serde(rename = "max-pages", default = "default_twitter_max_pages")]
    pub max_pages: u32,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: default_twitter_api(),
            accounts: Vec::new(),
            page_size: default_twitter_page_size(),
            max_pages: default_twitter_max_pages(),
        }
    }
}

/// Pixiv bookmarks crawler
#[derive(Debug, Clone, Deserialize)]
pub struct PixivConfig {
    #[serde(rename = "base-url", default = "default_pixiv_base")]
    pub base_url: String,

    /// Numeric pixiv user whose bookmarks are archived
    #[serde(rename = "user-id", default)]
    pub user_id: String,

    #[serde(rename = "page-size", default = "default_pixiv_page_size")]
    pub page_size: u32,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "grace-pages", default = "default_grace_pages")]
    pub grace_pages: u32,

    #[serde(default = "default_visibilities")]
    pub visibilities: Vec<Visibility>,
}

impl Default for PixivConfig {
    fn default() -> Self {
        Self {
            base_url: default_pixiv_base(),
            user_id: String::new(),
            page_size: default_pixiv_page_size(),
            max_pages: default_max_pages(),
            grace_pages: default_grace_pages(),
            visibilities: default_visibilities(),
        }
    }
}

/// Fanbox home feed crawler
#[derive(Debug, Clone, Deserialize)]
pub struct FanboxConfig {
    #[serde(rename = "api-base", default = "default_fanbox_api")]
    pub api_base: String,

    /// Value of the Origin header the API expects
    #[serde(default = "default_fanbox_origin")]
    pub origin: String,

    #[serde(rename = "page-size", default = "default_fanbox_page_size")]
    pub page_size: u32,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "grace-pages", default = "default_fanbox_grace_pages")]
    pub grace_pages: u32,
}

impl Default for FanboxConfig {
    fn default() -> Self {
        Self {
            api_base: default_fanbox_api(),
            origin: default_fanbox_origin(),
            page_size: default_fanbox_page_size(),
            max_pages: default_max_pages(),
            grace_pages: default_fanbox_grace_pages(),
        }
    }
}

/// Poipiku home feed crawler
#[derive(Debug, Clone, Deserialize)]
pub struct PoipikuConfig {
    #[serde(rename = "base-url", default = "default_poipiku_base")]
    pub base_url: String,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "grace-pages", default = "default_grace_pages")]
    pub grace_pages: u32,
}

impl Default for PoipikuConfig {
    fn default() -> Self {
        Self {
            base_url: default_poipiku_base(),
            max_pages: default_max_pages(),
            grace_pages: default_grace_pages(),
        }
    }
}

/// Booth order archiver
#[derive(Debug, Clone, Deserialize)]
pub struct BoothConfig {
    #[serde(rename = "base-url", default = "default_booth_base")]
    pub base_url: String,

    /// Maximum uploads in flight while extracting archives
    #[serde(rename = "upload-concurrency", default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            base_url: default_booth_base(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

fn default_request_delay() -> u64 {
    1000
}

fn default_budget_seconds() -> u64 {
    900
}

fn default_soft_deadline() -> u64 {
    60
}

fn default_hard_deadline() -> u64 {
    10
}

fn default_index_flush_interval() -> usize {
    20
}

fn default_entry_batch_size() -> usize {
    1
}

fn default_soft_error_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

fn default_twitter_api() -> String {
    "https://api.twitter.com/1.1".to_string()
}

fn default_twitter_page_size() -> u32 {
    200
}

fn default_twitter_max_pages() -> u32 {
    10
}

fn default_pixiv_base() -> String {
    "https://www.pixiv.net".to_string()
}

fn default_pixiv_page_size() -> u32 {
    48
}

fn default_max_pages() -> u32 {
    50
}

fn default_grace_pages() -> u32 {
    1
}

fn default_visibilities() -> Vec<Visibility> {
    vec![Visibility::Public, Visibility::Private]
}

fn default_fanbox_api() -> String {
    "https://api.fanbox.cc".to_string()
}

fn default_fanbox_origin() -> String {
    "https://www.fanbox.cc".to_string()
}

fn default_fanbox_page_size() -> u32 {
    56
}

fn default_fanbox_grace_pages() -> u32 {
    3
}

fn default_poipiku_base() -> String {
    "https://poipiku.com".to_string()
}

fn default_booth_base() -> String {
    "https://accounts.booth.pm".to_string()
}

fn default_upload_concurrency() -> usize {
    1
}
