//! Filesystem blob store
//!
//! Object bodies live under `{root}/data/{key}` and their metadata as a JSON
//! sidecar under `{root}/meta/{key}.json`.

use crate::blob::{
    validate_key, BlobError, BlobMetadata, BlobResult, BlobStore, ObjectHead, UrlSigner,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Blob store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    fn data_path(&self, key: &str) -> PathBuf {
        self.root.join("data").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join("meta").join(format!("{}.json", key))
    }

    async fn write_metadata(&self, key: &str, metadata: &BlobMetadata) -> BlobResult<()> {
        let path = self.meta_path(key);
        create_parent(&path).await?;
        let json = serde_json::to_vec(metadata).map_err(|e| BlobError::Metadata {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn read_metadata(&self, key: &str) -> BlobResult<BlobMetadata> {
        match fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| BlobError::Metadata {
                key: key.to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BlobMetadata::new()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn create_parent(path: &Path) -> BlobResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, metadata: BlobMetadata) -> BlobResult<()> {
        validate_key(key)?;

        let path = self.data_path(key);
        create_parent(&path).await?;
        fs::write(&path, &bytes).await?;
        self.write_metadata(key, &metadata).await?;

        tracing::debug!("Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> BlobResult<Option<Bytes>> {
        validate_key(key)?;

        match fs::read(self.data_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        let data_root = self.root.join("data");
        let mut keys = Vec::new();
        let mut pending = vec![(data_root, String::new())];

        while let Some((dir, dir_key)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = if dir_key.is_empty() {
                    name
                } else {
                    format!("{}/{}", dir_key, name)
                };

                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>> {
        validate_key(key)?;

        let size = match fs::metadata(self.data_path(key)).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(ObjectHead {
            key: key.to_string(),
            size,
            metadata: self.read_metadata(key).await?,
        }))
    }

    async fn copy_with_metadata(&self, key: &str, metadata: BlobMetadata) -> BlobResult<()> {
        if self.head(key).await?.is_none() {
            return Err(BlobError::NotFound(key.to_string()));
        }
        self.write_metadata(key, &metadata).await
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> BlobResult<String> {
        validate_key(key)?;
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        self.signer.sign(key, expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, FsBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(
            dir.path(),
            UrlSigner::new("s3cret", "https://archive.example.com"),
        );
        (dir, store)
    }

    fn dims(width: &str, height: &str) -> BlobMetadata {
        let mut metadata = BlobMetadata::new();
        metadata.insert("width".to_string(), width.to_string());
        metadata.insert("height".to_string(), height.to_string());
        metadata
    }

    #[tokio::test]
    async fn test_put_get_head() {
        let (_dir, store) = create_store();

        store
            .put("pixiv/1_p0.png", Bytes::from_static(b"abc"), dims("2", "3"))
            .await
            .unwrap();

        let body = store.get("pixiv/1_p0.png").await.unwrap().unwrap();
        assert_eq!(&body[..], b"abc");

        let head = store.head("pixiv/1_p0.png").await.unwrap().unwrap();
        assert_eq!(head.size, 3);
        assert_eq!(head.dimension("width"), Some(2));

        assert!(store.get("pixiv/missing.png").await.unwrap().is_none());
        assert!(store.head("pixiv/missing.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_body_and_metadata() {
        let (_dir, store) = create_store();

        store
            .put("fanbox/a.jpg", Bytes::from_static(b"thumb"), dims("1", "1"))
            .await
            .unwrap();
        store
            .put("fanbox/a.jpg", Bytes::from_static(b"original"), BlobMetadata::new())
            .await
            .unwrap();

        let head = store.head("fanbox/a.jpg").await.unwrap().unwrap();
        assert_eq!(head.size, 8);
        assert!(head.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (_dir, store) = create_store();
        for key in ["pixiv/10_p0.png", "pixiv/10_p1.png", "pixiv/11_p0.png", "index/pixiv.json"] {
            store
                .put(key, Bytes::from_static(b"x"), BlobMetadata::new())
                .await
                .unwrap();
        }

        assert_eq!(
            store.list("pixiv/10_").await.unwrap(),
            vec!["pixiv/10_p0.png", "pixiv/10_p1.png"]
        );
        assert_eq!(store.list("").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_copy_with_metadata() {
        let (_dir, store) = create_store();
        store
            .put("twitter/a.png", Bytes::from_static(b"png"), BlobMetadata::new())
            .await
            .unwrap();

        store
            .copy_with_metadata("twitter/a.png", dims("10", "20"))
            .await
            .unwrap();

        let head = store.head("twitter/a.png").await.unwrap().unwrap();
        assert_eq!(head.dimension("height"), Some(20));
        assert_eq!(&store.get("twitter/a.png").await.unwrap().unwrap()[..], b"png");

        let missing = store.copy_with_metadata("twitter/b.png", dims("1", "1")).await;
        assert!(matches!(missing, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (_dir, store) = create_store();
        let result = store
            .put("../outside", Bytes::from_static(b"x"), BlobMetadata::new())
            .await;
        assert!(matches!(result, Err(BlobError::InvalidKey(_))));
    }
}
