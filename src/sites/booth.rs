//! Booth purchase archiver
//!
//! Given order numbers, every downloadable of each order is resolved to its
//! signed download URL and stored under
//! `booth/{itemId}/{downloadableId}/{filename}`. Zip archives are not stored
//! whole; each file inside lands under the archive's key as a prefix.

use crate::config::BoothConfig;
use crate::crawler::fetcher::HttpClient;
use crate::crawler::media::MediaArchiver;
use crate::crawler::pool::{PoolReport, UploadJob, UploadPool};
use crate::model::{url_basename, MediaKind, Site};
use crate::sites::selector;
use crate::{HoardError, Result};
use bytes::Bytes;
use scraper::Html;
use std::io::{Cursor, Read};
use url::Url;

/// Turns a command-line order reference into an order page URL
///
/// Accepts a full order URL or a bare order number.
pub fn parse_order_arg(arg: &str, base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let prefix = format!("{}/orders/", base);

    if arg.starts_with(&prefix) {
        Ok(arg.to_string())
    } else if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_digit()) {
        Ok(format!("{}{}", prefix, arg))
    } else {
        Err(HoardError::InvalidArgument(format!("Invalid order ID: {}", arg)))
    }
}

/// Links of the downloadables listed on an order page
pub fn parse_downloadables(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let sheet_selector = selector(".l-order-detail-by-shop .sheet")?;
    let link_selector = selector("a.nav-reverse")?;

    Ok(document
        .select(&sheet_selector)
        .filter_map(|sheet| {
            sheet
                .select(&link_selector)
                .next()
                .and_then(|link| link.value().attr("href"))
                .filter(|href| !href.is_empty())
                .map(str::to_string)
        })
        .collect())
}

/// Where a download is stored, derived from its signed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub item_id: String,
    pub downloadable_id: String,
    pub filename: String,
}

impl DownloadTarget {
    /// Parses `/{a}/{b}/{itemId}/{downloadableId}/.../{file}`
    pub fn from_url(download_url: &str) -> Result<Self> {
        let url = Url::parse(download_url)?;
        let segments: Vec<&str> = url.path().split('/').collect();
        let invalid = || HoardError::UnexpectedShape {
            context: download_url.to_string(),
            message: "download URL does not name an item and a downloadable".to_string(),
        };

        let item_id = segments.get(3).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let downloadable_id = segments.get(4).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let basename = url_basename(download_url).ok_or_else(invalid)?;
        let filename = String::from_utf8_lossy(&urlencoding::decode_binary(basename.as_bytes()))
            .replace('/', "_");

        Ok(Self {
            item_id: item_id.to_string(),
            downloadable_id: downloadable_id.to_string(),
            filename,
        })
    }

    pub fn key(&self) -> String {
        format!(
            "booth/{}/{}/{}",
            self.item_id, self.downloadable_id, self.filename
        )
    }

    pub fn entry_key(&self, entry: &str) -> String {
        format!("{}/{}", self.key(), entry)
    }
}

fn is_zip(content_type: Option<&str>) -> bool {
    content_type.map_or(false, |ct| ct.starts_with("application/zip"))
}

/// Totals of an archiving session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoothReport {
    pub orders: usize,
    pub downloadables: usize,
    /// Downloadables that could not be retrieved
    pub skipped: usize,
    pub uploaded: usize,
    pub failed: usize,
}

pub struct BoothArchiver {
    http: HttpClient,
    archiver: MediaArchiver,
    config: BoothConfig,
    headers: Vec<(String, String)>,
}

impl BoothArchiver {
    /// `session` is the full `Cookie` header of a logged-in browser
    pub fn new(
        http: HttpClient,
        archiver: MediaArchiver,
        config: BoothConfig,
        session: &str,
    ) -> Self {
        Self {
            http,
            archiver,
            config,
            headers: vec![("Cookie".to_string(), session.to_string())],
        }
    }

    /// Archives every downloadable of the given orders
    pub async fn archive_orders(&self, orders: &[String]) -> Result<BoothReport> {
        let order_urls = orders
            .iter()
            .map(|order| parse_order_arg(order, &self.config.base_url))
            .collect::<Result<Vec<_>>>()?;
        if order_urls.is_empty() {
            return Err(HoardError::InvalidArgument("No order ID specified.".to_string()));
        }

        let archiver = self.archiver.clone();
        let pool = UploadPool::spawn(self.config.upload_concurrency, move |job: UploadJob| {
            let archiver = archiver.clone();
            async move {
                archiver
                    .store(Site::Booth, &job.key, MediaKind::Auto, None, job.body)
                    .await
                    .map(|_| ())
            }
        });

        let mut report = BoothReport::default();
        let outcome = self.archive_all(&pool, &order_urls, &mut report).await;
        let PoolReport {
            uploaded,
            failed,
            peak_in_flight,
        } = pool.finish().await?;
        report.uploaded = uploaded;
        report.failed = failed;
        outcome?;

        tracing::info!(
            "[booth] Archived {} orders: {} downloadables, {} files uploaded, {} failed",
            report.orders,
            report.downloadables,
            report.uploaded,
            report.failed
        );
        tracing::debug!("[booth] At most {} uploads ran at once", peak_in_flight);
        Ok(report)
    }

    async fn archive_all(
        &self,
        pool: &UploadPool,
        order_urls: &[String],
        report: &mut BoothReport,
    ) -> Result<()> {
        for order_url in order_urls {
            let html = self.http.get_text(order_url, &self.headers).await?;
            let downloadables = parse_downloadables(&html)?;
            tracing::info!(
                "[booth] Found {} downloadables in order {}",
                downloadables.len(),
                order_url
            );

            for downloadable in &downloadables {
                match self.archive_downloadable(pool, downloadable).await {
                    Ok(()) => report.downloadables += 1,
                    Err(e) if e.is_item_level() => {
                        tracing::warn!("[booth] Skipping {}: {}", downloadable, e);
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            report.orders += 1;
        }
        Ok(())
    }

    async fn archive_downloadable(&self, pool: &UploadPool, downloadable: &str) -> Result<()> {
        tracing::info!("[booth] Retrieving download URL for {}", downloadable);
        let download_url = self
            .http
            .resolve_location(downloadable, &self.headers)
            .await?;

        tracing::info!("[booth] Downloading {}", download_url);
        let (content_type, body) = self
            .http
            .fetch_bytes(&download_url, &[])
            .await
            .into_body(&download_url)?;

        let target = DownloadTarget::from_url(&download_url)?;
        tracing::info!(
            "[booth] Saving {} (itemId = {}, downloadableId = {}, size = {})",
            target.filename,
            target.item_id,
            target.downloadable_id,
            body.len()
        );

        if is_zip(content_type.as_deref()) {
            extract_into(pool, &target, body).await
        } else {
            pool.submit(UploadJob {
                key: target.key(),
                body,
            })
            .await
        }
    }
}

/// Queues every file of a zip archive, one at a time
async fn extract_into(pool: &UploadPool, target: &DownloadTarget, body: Bytes) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(body))?;

    for i in 0..archive.len() {
        let job = {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let path = match entry.enclosed_name() {
                Some(path) => path.to_string_lossy().replace('\\', "/"),
                None => {
                    tracing::warn!("[booth] Skipping unsafe entry {}", entry.name());
                    continue;
                }
            };
            let mut data = Vec::with_capacity(entry_capacity(entry.size()));
            entry.read_to_end(&mut data)?;
            UploadJob {
                key: target.entry_key(&path),
                body: Bytes::from(data),
            }
        };
        pool.submit(job).await?;
    }

    Ok(())
}

/// Largest buffer reserved up front for one archive entry
const MAX_ENTRY_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Initial buffer size for an entry whose header declares `declared` bytes
fn entry_capacity(declared: u64) -> usize {
    declared.min(MAX_ENTRY_PREALLOCATION) as usize
}
