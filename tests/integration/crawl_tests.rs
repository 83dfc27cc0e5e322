//! End-to-end crawls of the scheduled sites

use crate::common::{create_test_config, png, Harness};
use hoard::crawler::{Budget, CrawlReport};
use hoard::model::{Site, Visibility};
use hoard::storage::{lock, CounterStore, EntryRecord, EntryStore, RunStatus, RunStore};
use hoard::HoardError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{any, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn existing_entry(site: Site, id: &str, restricted: bool) -> EntryRecord {
    EntryRecord {
        site,
        id: id.to_string(),
        visibility: Visibility::Public,
        restricted,
        body: json!({ "id": id }),
        media_keys: vec![],
        archived_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

async fn mount_fanbox_post(server: &MockServer, id: &str, post: serde_json::Value, times: u64) {
    Mock::given(method("GET"))
        .and(path("/post.info"))
        .and(query_param("postId", id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "body": post })))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fanbox_archives_new_posts_oldest_first() {
    let server = MockServer::start().await;
    let base = server.uri();
    let harness = Harness::new(create_test_config(&base));
    harness.coordinator.register_session("fanbox", "sess").unwrap();
    lock(&harness.storage)
        .unwrap()
        .put_entry(&existing_entry(Site::Fanbox, "100", false))
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/post.listHome"))
        .and(query_param("limit", "56"))
        .and(header("Cookie", "FANBOXSESSID=sess"))
        .and(header("Origin", "https://www.fanbox.cc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "items": [
                    { "id": "300", "isRestricted": false },
                    { "id": "200", "isRestricted": false },
                    { "id": "100", "isRestricted": false }
                ],
                "nextUrl": null
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    mount_fanbox_post(
        &server,
        "300",
        json!({
            "id": "300",
            "isRestricted": false,
            "body": { "images": [{
                "originalUrl": format!("{}/images/300.png", base),
                "thumbnailUrl": format!("{}/thumbs/300.jpeg", base)
            }] }
        }),
        1,
    )
    .await;
    mount_fanbox_post(
        &server,
        "200",
        json!({
            "id": "200",
            "isRestricted": false,
            "body": { "imageMap": { "a": {
                "originalUrl": format!("{}/images/200.png", base),
                "thumbnailUrl": format!("{}/thumbs/200.jpeg", base)
            } } }
        }),
        1,
    )
    .await;
    mount_fanbox_post(&server, "100", json!({ "id": "100" }), 0).await;

    Mock::given(method("GET"))
        .and(path("/images/300.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(4, 3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/200.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/thumbs/200.jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumbnail".to_vec()))
        .mount(&server)
        .await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Fanbox, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(
        reports,
        vec![CrawlReport {
            selected: 2,
            archived: 2,
            skipped: 0,
            interrupted: false
        }]
    );

    // Oldest first
    let requests = server.received_requests().await.unwrap();
    let fetched: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == "/post.info")
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "postId")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert_eq!(fetched, vec!["200", "300"]);

    // The thumbnail lands on the key of the original
    assert_eq!(harness.blob("fanbox/200.png").await, b"thumbnail".to_vec());
    let head = harness.blobs.head("fanbox/300.png").await.unwrap().unwrap();
    assert_eq!(head.dimension("width"), Some(4));
    assert_eq!(head.dimension("height"), Some(3));

    let entry = lock(&harness.storage)
        .unwrap()
        .get_entry(Site::Fanbox, "200")
        .unwrap()
        .unwrap();
    assert_eq!(entry.media_keys, vec!["fanbox/200.png"]);

    assert_eq!(
        harness.snapshot("index/fanbox.json").await,
        json!(["100", "200", "300"])
    );
    let counters = lock(&harness.storage).unwrap().get_counters().unwrap();
    assert!(counters.contains(&("FanboxImageSaved".to_string(), 2)));

    // A second run finds nothing new
    let reports = harness
        .coordinator
        .crawl_site(Site::Fanbox, &Budget::unlimited())
        .await
        .unwrap();
    assert_eq!(reports[0].selected, 0);
    assert_eq!(reports[0].archived, 0);
}

#[tokio::test]
async fn test_fanbox_refetches_unlocked_post() {
    let server = MockServer::start().await;
    let base = server.uri();
    let harness = Harness::new(create_test_config(&base));
    harness.coordinator.register_session("fanbox", "sess").unwrap();
    {
        let mut storage = lock(&harness.storage).unwrap();
        storage
            .put_entry(&existing_entry(Site::Fanbox, "10", true))
            .unwrap();
        storage
            .put_entry(&existing_entry(Site::Fanbox, "11", true))
            .unwrap();
    }

    Mock::given(method("GET"))
        .and(path("/post.listHome"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": {
                "items": [
                    { "id": "11", "isRestricted": true },
                    { "id": "10", "isRestricted": false }
                ],
                "nextUrl": null
            }
        })))
        .mount(&server)
        .await;
    mount_fanbox_post(
        &server,
        "10",
        json!({ "id": "10", "isRestricted": false, "body": { "text": "unlocked" } }),
        1,
    )
    .await;
    mount_fanbox_post(&server, "11", json!({ "id": "11" }), 0).await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Fanbox, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(reports[0].archived, 1);
    let entry = lock(&harness.storage)
        .unwrap()
        .get_entry(Site::Fanbox, "10")
        .unwrap()
        .unwrap();
    assert!(!entry.restricted);
    assert_eq!(entry.body["body"]["text"], "unlocked");
}

#[tokio::test]
async fn test_zero_budget_makes_no_requests() {
    let server = MockServer::start().await;
    let harness = Harness::new(create_test_config(&server.uri()));
    harness.coordinator.register_session("fanbox", "sess").unwrap();

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let budget = Budget::new(
        Duration::ZERO,
        Duration::from_secs(60),
        Duration::from_secs(10),
    );
    let reports = harness
        .coordinator
        .crawl_site(Site::Fanbox, &budget)
        .await
        .unwrap();

    assert_eq!(
        reports,
        vec![CrawlReport {
            interrupted: true,
            ..CrawlReport::default()
        }]
    );
    let runs = lock(&harness.storage).unwrap().get_latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_unexpected_feed_shape_fails_the_run() {
    let server = MockServer::start().await;
    let harness = Harness::new(create_test_config(&server.uri()));
    harness.coordinator.register_session("fanbox", "sess").unwrap();

    Mock::given(method("GET"))
        .and(path("/post.listHome"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let result = harness
        .coordinator
        .crawl_site(Site::Fanbox, &Budget::unlimited())
        .await;

    assert!(matches!(result, Err(HoardError::UnexpectedShape { .. })));
    let runs = lock(&harness.storage).unwrap().get_latest_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn test_twitter_archives_favorites_and_reply_ancestors() {
    let server = MockServer::start().await;
    let base = server.uri();
    let harness = Harness::new(create_test_config(&base));
    harness
        .coordinator
        .register_session("twitter:alice", r#"{"bearer_token": "T"}"#)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/favorites/list.json"))
        .and(query_param("max_id", "19"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favorites/list.json"))
        .and(query_param("screen_name", "alice"))
        .and(header("Authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id_str": "30", "in_reply_to_status_id_str": "25" },
            {
                "id_str": "20",
                "in_reply_to_status_id_str": null,
                "extended_entities": { "media": [
                    { "media_url_https": format!("{}/media/AAA.jpg", base) }
                ] }
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/statuses/show.json"))
        .and(query_param("id", "25"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id_str": "25", "in_reply_to_status_id_str": null })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/AAA.jpg"))
        .and(query_param("name", "orig"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(2, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Twitter, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(reports[0].selected, 2);
    assert_eq!(reports[0].archived, 3);
    assert_eq!(harness.blob("twitter/AAA.jpg").await, png(2, 2));
    assert_eq!(
        harness.snapshot("index/twitter.json").await,
        json!(["20", "25", "30"])
    );
}

#[tokio::test]
async fn test_twitter_keeps_archiving_chain_after_failed_ancestor() {
    let server = MockServer::start().await;
    let base = server.uri();
    let harness = Harness::new(create_test_config(&base));
    harness
        .coordinator
        .register_session("twitter:alice", r#"{"bearer_token": "T"}"#)
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/favorites/list.json"))
        .and(query_param("max_id", "29"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favorites/list.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id_str": "30", "in_reply_to_status_id_str": "25" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/statuses/show.json"))
        .and(query_param("id", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "25",
            "in_reply_to_status_id_str": "24",
            "extended_entities": { "media": [
                { "media_url_https": format!("{}/media/GONE.jpg", base) }
            ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/statuses/show.json"))
        .and(query_param("id", "24"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id_str": "24", "in_reply_to_status_id_str": null })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/GONE.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Twitter, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(
        reports[0],
        CrawlReport {
            selected: 1,
            archived: 2,
            skipped: 1,
            interrupted: false,
        }
    );
    let storage = lock(&harness.storage).unwrap();
    assert!(storage.get_entry(Site::Twitter, "30").unwrap().is_some());
    assert!(storage.get_entry(Site::Twitter, "25").unwrap().is_none());
    assert!(storage.get_entry(Site::Twitter, "24").unwrap().is_some());
    drop(storage);
    assert_eq!(
        harness.snapshot("index/twitter.json").await,
        json!(["24", "30"])
    );
}

#[tokio::test]
async fn test_pixiv_retries_soft_errors_and_skips_failed_items() {
    let server = MockServer::start().await;
    let base = server.uri();
    let mut config = create_test_config(&base);
    config.pixiv.visibilities = vec![Visibility::Public];
    let harness = Harness::new(config);
    harness.coordinator.register_session("pixiv", "sess").unwrap();

    Mock::given(method("GET"))
        .and(path("/ajax/user/42/illusts/bookmarks"))
        .and(query_param("rest", "show"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": true, "message": "temporarily unavailable", "body": []
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/user/42/illusts/bookmarks"))
        .and(query_param("rest", "show"))
        .and(query_param("offset", "0"))
        .and(header("Cookie", "PHPSESSID=sess"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "message": "",
            "body": { "works": [ { "id": "101" }, { "illustId": 102 } ] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/illust/101/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "message": "",
            "body": [ { "urls": { "original": format!("{}/img/101_p0.png", base) } } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax/illust/102/pages"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/101_p0.png"))
        .and(header("Referer", format!("{}/", base).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(5, 6)))
        .expect(1)
        .mount(&server)
        .await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Pixiv, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(
        reports,
        vec![CrawlReport {
            selected: 2,
            archived: 1,
            skipped: 1,
            interrupted: false
        }]
    );
    let entry = lock(&harness.storage)
        .unwrap()
        .get_entry(Site::Pixiv, "101")
        .unwrap()
        .unwrap();
    assert_eq!(entry.visibility, Visibility::Public);
    assert_eq!(entry.body["pages"].as_array().unwrap().len(), 1);
    assert_eq!(
        harness.snapshot("index/pixiv.json").await,
        json!({ "public": ["101"], "private": [] })
    );
}

#[tokio::test]
async fn test_poipiku_archives_appended_images() {
    let server = MockServer::start().await;
    let base = server.uri();
    let harness = Harness::new(create_test_config(&base));
    harness.coordinator.register_session("poipiku", "sess").unwrap();

    Mock::given(method("GET"))
        .and(path("/MyHomePcV.jsp"))
        .and(query_param("PG", "0"))
        .and(header("Cookie", "POIPIKU_LK=sess"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <div class="IllustItem" id="IllustItem_9001">
              <a class="IllustItemUserThumb" href="/777/" style="background:url('/icon.png')"></a>
              <span class="IllustItemUserName">someone</span>
              <p class="IllustItemDesc">desc</p>
              <img class="IllustItemThumbImg" src="/img/9001.png_640.jpg">
            </div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/MyHomePcV.jsp"))
        .and(query_param("PG", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/f/ShowAppendFileF.jsp"))
        .and(body_string_contains("IID=9001"))
        .and(body_string_contains("UID=777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "html": "<div><img src=\"/img/9001_1.png\"></div>"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/9001.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8, 8)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/9001_1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(9, 9)))
        .expect(1)
        .mount(&server)
        .await;

    let reports = harness
        .coordinator
        .crawl_site(Site::Poipiku, &Budget::unlimited())
        .await
        .unwrap();

    assert_eq!(reports[0].archived, 1);
    assert_eq!(harness.blob("poipiku/9001.png").await, png(8, 8));
    assert_eq!(harness.blob("poipiku/9001_1.png").await, png(9, 9));

    let entry = lock(&harness.storage)
        .unwrap()
        .get_entry(Site::Poipiku, "9001")
        .unwrap()
        .unwrap();
    assert_eq!(entry.body["userId"], "777");
    assert_eq!(entry.body["imageUrls"].as_array().unwrap().len(), 2);
    assert_eq!(
        harness.snapshot("index/poipiku.json").await,
        json!({ "public": ["9001"], "private": [] })
    );
}

#[tokio::test]
async fn test_missing_session_fails_before_any_request() {
    let server = MockServer::start().await;
    let harness = Harness::new(create_test_config(&server.uri()));

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = harness
        .coordinator
        .crawl_site(Site::Pixiv, &Budget::unlimited())
        .await;
    assert!(matches!(result, Err(HoardError::MissingSession(id)) if id == "pixiv"));
}
