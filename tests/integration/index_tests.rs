//! Known-ID index rebuilds and snapshot-sourced runs

use crate::common::{create_test_config, Harness};
use bytes::Bytes;
use hoard::blob::{BlobMetadata, BlobStore};
use hoard::config::IndexSource;
use hoard::crawler::Budget;
use hoard::model::{Site, Visibility};
use hoard::storage::{lock, EntryRecord, EntryStore};
use hoard::views;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(site: Site, id: &str, visibility: Visibility) -> EntryRecord {
    EntryRecord {
        site,
        id: id.to_string(),
        visibility,
        restricted: false,
        body: json!({ "id": id }),
        media_keys: vec![],
        archived_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let harness = Harness::new(create_test_config("http://127.0.0.1:9"));
    {
        let mut storage = lock(&harness.storage).unwrap();
        storage
            .put_entry(&entry(Site::Pixiv, "1", Visibility::Public))
            .unwrap();
        storage
            .put_entry(&entry(Site::Pixiv, "2", Visibility::Private))
            .unwrap();
    }

    assert_eq!(harness.coordinator.rebuild_index(Site::Pixiv).await.unwrap(), 2);
    let first = harness.blob("index/pixiv.json").await;
    assert_eq!(harness.coordinator.rebuild_index(Site::Pixiv).await.unwrap(), 2);
    let second = harness.blob("index/pixiv.json").await;

    assert_eq!(first, second);
    assert_eq!(
        harness.snapshot("index/pixiv.json").await,
        json!({ "public": ["1"], "private": ["2"] })
    );

    let sampled = views::random_entries(
        &harness.storage,
        harness.blobs.as_ref(),
        Site::Pixiv,
        Some(Visibility::Private),
        5,
        Duration::from_secs(60),
    )
    .await
    .unwrap();
    assert_eq!(sampled.len(), 1);
    assert_eq!(sampled[0].id, "2");
}

#[tokio::test]
async fn test_snapshot_source_skips_published_ids() {
    let server = MockServer::start().await;
    let mut config = create_test_config(&server.uri());
    config.crawler.index_source = IndexSource::Snapshot;
    let harness = Harness::new(config);
    harness.coordinator.register_session("fanbox", "sess").unwrap();

    // Known only through the published snapshot
    harness
        .blobs
        .put(
            "index/fanbox.json",
            Bytes::from_static(br#"["5"]"#),
            BlobMetadata::new(),
        )
        .await
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/post.listHome"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": { "items": [ { "id": "5", "isRestricted": false } ], "nextUrl": null }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post.info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "body": { "id": "5" } })))
        .expect(0)
        .mount(&server)
        .await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Fanbox, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(reports[0].selected, 0);
    assert_eq!(
        lock(&harness.storage)
            .unwrap()
            .count_entries(Site::Fanbox)
            .unwrap(),
        0
    );
}
