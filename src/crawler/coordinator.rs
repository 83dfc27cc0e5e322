//! Crawl coordinator
//!
//! Owns the long-lived collaborators of a process (entry store, blob store,
//! HTTP client, media archiver) and runs the commands on top of them:
//! scheduled site crawls, on-demand booth archiving, index rebuilds and
//! session registration.

use crate::blob::{BlobStore, FsBlobStore, UrlSigner};
use crate::config::Config;
use crate::crawler::budget::Budget;
use crate::crawler::driver::{run_incremental, CrawlContext, CrawlReport};
use crate::crawler::fetcher::HttpClient;
use crate::crawler::media::MediaArchiver;
use crate::index;
use crate::metrics::StorageMetrics;
use crate::model::Site;
use crate::sites::{self, booth::BoothArchiver, booth::BoothReport};
use crate::storage::{lock, open_storage, share, SessionStore, SharedStorage};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    storage: SharedStorage,
    blobs: Arc<dyn BlobStore>,
    http: HttpClient,
    archiver: MediaArchiver,
}

impl Coordinator {
    /// Opens the stores named by the configuration
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self> {
        let storage = share(open_storage(Path::new(&config.storage.database_path))?);
        let signer = UrlSigner::new(
            config.storage.signing_secret.clone(),
            config.storage.public_base_url.clone(),
        );
        let blobs: Arc<dyn BlobStore> =
            Arc::new(FsBlobStore::new(config.storage.blob_root.clone(), signer));
        Self::with_stores(config, config_hash, storage, blobs)
    }

    /// Builds a coordinator on top of already opened stores
    pub fn with_stores(
        config: Config,
        config_hash: impl Into<String>,
        storage: SharedStorage,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        let http = HttpClient::from_config(&config)?;
        let metrics = Arc::new(StorageMetrics::new(storage.clone()));
        let archiver = MediaArchiver::new(http.clone(), blobs.clone(), metrics);

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            storage,
            blobs,
            http,
            archiver,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }

    fn context(&self) -> CrawlContext {
        CrawlContext {
            storage: self.storage.clone(),
            blobs: self.blobs.clone(),
            archiver: self.archiver.clone(),
            settings: self.config.crawler.clone(),
            config_hash: self.config_hash.clone(),
        }
    }

    /// Runs one scheduled crawl of `site`
    ///
    /// Every credential the site needs is loaded before the first external
    /// request. Twitter accounts and pixiv partitions share the budget and
    /// run one after another.
    pub async fn crawl_site(&self, site: Site, budget: &Budget) -> Result<Vec<CrawlReport>> {
        let adapters = sites::adapters_for(site, &self.config, &self.storage, &self.http)?;
        let ctx = self.context();

        let mut reports = Vec::with_capacity(adapters.len());
        for adapter in &adapters {
            reports.push(run_incremental(&ctx, adapter.as_ref(), budget).await?);
        }
        Ok(reports)
    }

    /// Archives the downloadables of booth orders
    pub async fn archive_booth(&self, orders: &[String]) -> Result<BoothReport> {
        let session = sites::load_session(&self.storage, "booth")?;
        let archiver = BoothArchiver::new(
            self.http.clone(),
            self.archiver.clone(),
            self.config.booth.clone(),
            &session,
        );
        archiver.archive_orders(orders).await
    }

    /// Rebuilds the known-ID index of `site` from the entry store and publishes it
    pub async fn rebuild_index(&self, site: Site) -> Result<usize> {
        let known = {
            let storage = lock(&self.storage)?;
            index::rebuild(&*storage, site, index::SCAN_PAGE_SIZE)?
        };
        index::publish(self.blobs.as_ref(), site, &known).await?;
        Ok(known.len())
    }

    /// Registers or replaces a site credential
    pub fn register_session(&self, id: &str, credential: &str) -> Result<()> {
        lock(&self.storage)?.put_session(id, credential)?;
        tracing::info!("[{}] Session registered.", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use crate::HoardError;
    use tempfile::TempDir;

    fn create_test_config() -> Config {
        toml::from_str(
            r#"
[crawler]
request-delay = 0

[storage]
database-path = ":memory:"
blob-root = "unused"
signing-secret = "s3cret"
public-base-url = "https://archive.example.com"
"#,
        )
        .unwrap()
    }

    fn coordinator(dir: &TempDir) -> Coordinator {
        let storage = share(SqliteStorage::open_in_memory().unwrap());
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(
            dir.path(),
            UrlSigner::new("s3cret", "https://archive.example.com"),
        ));
        Coordinator::with_stores(create_test_config(), "hash", storage, blobs).unwrap()
    }

    #[tokio::test]
    async fn test_missing_session_fails_before_crawling() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);

        let result = coordinator
            .crawl_site(Site::Fanbox, &Budget::unlimited())
            .await;

        assert!(matches!(result, Err(HoardError::MissingSession(id)) if id == "fanbox"));
    }

    #[tokio::test]
    async fn test_rebuild_index_of_empty_store_publishes_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);

        assert_eq!(coordinator.rebuild_index(Site::Twitter).await.unwrap(), 0);

        let snapshot = coordinator
            .blobs()
            .get(&Site::Twitter.snapshot_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&snapshot[..], b"[]");
    }

    #[test]
    fn test_register_session() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir);

        coordinator.register_session("pixiv", "abc").unwrap();
        coordinator.register_session("pixiv", "def").unwrap();

        let session = lock(coordinator.storage())
            .unwrap()
            .get_session("pixiv")
            .unwrap()
            .unwrap();
        assert_eq!(session.credential, "def");
    }
}
