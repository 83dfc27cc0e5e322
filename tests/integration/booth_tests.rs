//! On-demand archiving of booth orders

use crate::common::{create_test_config, png, Harness};
use hoard::blob::BlobStore;
use hoard::storage::{lock, CounterStore};
use hoard::HoardError;
use std::io::{Cursor, Write};
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn zip_archive() -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default();
        writer.add_directory("dir/", options).unwrap();
        writer.start_file("dir/a.png", options).unwrap();
        writer.write_all(&png(3, 3)).unwrap();
        writer.start_file("readme.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

#[tokio::test]
async fn test_booth_extracts_zip_entries_and_stores_plain_files() {
    let server = MockServer::start().await;
    let base = server.uri();
    let harness = Harness::new(create_test_config(&base));
    harness
        .coordinator
        .register_session("booth", "_booth_session=abc")
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/orders/555"))
        .and(header("Cookie", "_booth_session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><div class="l-order-detail-by-shop">
              <div class="sheet"><a class="nav-reverse" href="{base}/downloadables/1">DL</a></div>
              <div class="sheet"><a class="nav-reverse" href="">DL</a></div>
              <div class="sheet"><a class="nav-reverse" href="{base}/downloadables/2">DL</a></div>
            </div></body></html>"#,
            base = base
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/downloadables/1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/dl/x/111/222/pack.zip", base).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/downloadables/2"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/dl/x/111/333/manual.pdf", base).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/x/111/222/pack.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(zip_archive(), "application/zip"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/x/111/333/manual.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = harness
        .coordinator
        .archive_booth(&["555".to_string()])
        .await
        .unwrap();

    assert_eq!(report.orders, 1);
    assert_eq!(report.downloadables, 2);
    assert_eq!(report.uploaded, 3);
    assert_eq!(report.failed, 0);

    assert_eq!(
        harness.blob("booth/111/222/pack.zip/dir/a.png").await,
        png(3, 3)
    );
    assert_eq!(
        harness.blob("booth/111/222/pack.zip/readme.txt").await,
        b"hello".to_vec()
    );
    assert_eq!(
        harness.blob("booth/111/333/manual.pdf").await,
        b"%PDF-1.4".to_vec()
    );
    // The archive itself is not stored
    assert!(harness
        .blobs
        .head("booth/111/222/pack.zip")
        .await
        .unwrap()
        .is_none());

    let head = harness
        .blobs
        .head("booth/111/222/pack.zip/dir/a.png")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(head.dimension("width"), Some(3));

    let counters = lock(&harness.storage).unwrap().get_counters().unwrap();
    assert!(counters.contains(&("BoothImageSaved".to_string(), 1)));
    assert!(counters.contains(&("BoothFileSaved".to_string(), 2)));
}

#[tokio::test]
async fn test_booth_rejects_invalid_order_before_any_request() {
    let server = MockServer::start().await;
    let harness = Harness::new(create_test_config(&server.uri()));
    harness
        .coordinator
        .register_session("booth", "_booth_session=abc")
        .unwrap();

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = harness
        .coordinator
        .archive_booth(&["123".to_string(), "not-an-order".to_string()])
        .await;

    assert!(matches!(result, Err(HoardError::InvalidArgument(_))));
}
