use hoard::blob::{BlobStore, FsBlobStore, UrlSigner};
use hoard::config::Config;
use hoard::crawler::Coordinator;
use hoard::storage::{share, SharedStorage, SqliteStorage};
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a test configuration pointing every site at `base_url`
pub fn create_test_config(base_url: &str) -> Config {
    toml::from_str(&format!(
        r#"
[crawler]
request-delay = 0

[storage]
database-path = ":memory:"
blob-root = "unused"
signing-secret = "s3cret"
public-base-url = "https://archive.example.com"

[twitter]
api-base = "{base}"
accounts = ["alice"]

[pixiv]
base-url = "{base}"
user-id = "42"

[fanbox]
api-base = "{base}"
origin = "https://www.fanbox.cc"

[poipiku]
base-url = "{base}"

[booth]
base-url = "{base}"
"#,
        base = base_url
    ))
    .expect("Failed to parse test config")
}

/// A coordinator over an in-memory database and a temporary blob directory
pub struct Harness {
    pub coordinator: Coordinator,
    pub storage: SharedStorage,
    pub blobs: Arc<dyn BlobStore>,
    _dir: TempDir,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let storage = share(SqliteStorage::open_in_memory().expect("Failed to open database"));
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(
            dir.path().to_path_buf(),
            UrlSigner::new("s3cret", "https://archive.example.com"),
        ));
        let coordinator =
            Coordinator::with_stores(config, "test-hash", storage.clone(), blobs.clone())
                .expect("Failed to create coordinator");

        Self {
            coordinator,
            storage,
            blobs,
            _dir: dir,
        }
    }

    /// Reads a blob that must exist
    pub async fn blob(&self, key: &str) -> Vec<u8> {
        self.blobs
            .get(key)
            .await
            .expect("Failed to read blob")
            .unwrap_or_else(|| panic!("blob {} is missing", key))
            .to_vec()
    }

    /// Reads a published snapshot as JSON
    pub async fn snapshot(&self, key: &str) -> serde_json::Value {
        serde_json::from_slice(&self.blob(key).await).expect("Snapshot is not JSON")
    }
}

/// Smallest byte sequence read as a PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data
}
