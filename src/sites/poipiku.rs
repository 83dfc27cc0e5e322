//! Poipiku home feed
//!
//! The home feed is an HTML page numbered by `PG`. Each `.IllustItem` carries
//! the work ID, its author and the first image; the remaining images come
//! from an HTML fragment returned by `ShowAppendFileF.jsp`.

use crate::config::PoipikuConfig;
use crate::crawler::budget::Budget;
use crate::crawler::driver::SiteAdapter;
use crate::crawler::fetcher::{cookie_header, HttpClient};
use crate::crawler::frontier::{walk_known_streak, FeedPage, PagedFeed, StreakLimits};
use crate::index::KnownIdIndex;
use crate::model::{Item, ItemSummary, MediaKind, MediaRef, Site};
use crate::sites::{missing_field, selector};
use crate::{HoardError, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde_json::{json, Value};
use std::collections::HashSet;
use url::Url;

/// Referer the image host expects
const IMAGE_REFERER: &str = "https://www.poipiku.net/";

pub struct PoipikuAdapter {
    http: HttpClient,
    config: PoipikuConfig,
    home_url: Url,
    headers: Vec<(String, String)>,
}

impl PoipikuAdapter {
    pub fn new(http: HttpClient, config: PoipikuConfig, session: &str) -> Result<Self> {
        let home_url = Url::parse(&format!(
            "{}/MyHomePcV.jsp",
            config.base_url.trim_end_matches('/')
        ))?;
        Ok(Self {
            http,
            config,
            home_url,
            headers: vec![cookie_header("POIPIKU_LK", session)],
        })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

fn text_of(element: &ElementRef<'_>, css: &scraper::Selector) -> String {
    element
        .select(css)
        .next()
        .map(|e| e.text().collect::<String>())
        .unwrap_or_default()
}

/// Extracts the last single-quoted string of a `style` attribute
fn quoted_url(style: &str) -> Option<String> {
    let end = style.rfind('\'')?;
    let start = style[..end].rfind('\'')?;
    Some(style[start + 1..end].to_string())
}

/// Parses the works listed on a home feed page, newest first
pub fn parse_home_page(html: &str, page_url: &Url) -> Result<Vec<ItemSummary>> {
    let document = Html::parse_document(html);
    let item_selector = selector(".IllustItem")?;
    let thumb_selector = selector(".IllustItemUserThumb")?;
    let name_selector = selector(".IllustItemUserName")?;
    let desc_selector = selector(".IllustItemDesc")?;
    let image_selector = selector(".IllustItemThumbImg")?;

    let mut works = Vec::new();
    for element in document.select(&item_selector) {
        let id = element
            .value()
            .attr("id")
            .and_then(|id| id.rsplit('_').next())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing_field(page_url.as_str(), "IllustItem@id"))?
            .to_string();

        let thumb = element.select(&thumb_selector).next();
        let user_id = thumb
            .and_then(|t| t.value().attr("href"))
            .and_then(|href| href.split('/').nth(1))
            .unwrap_or_default()
            .to_string();
        let user_icon = thumb
            .and_then(|t| t.value().attr("style"))
            .and_then(quoted_url)
            .unwrap_or_default();

        let image_urls: Vec<String> = element
            .select(&image_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| page_url.join(src).ok())
            .map(|url| url.to_string())
            .into_iter()
            .collect();

        let work = json!({
            "id": id,
            "userId": user_id,
            "userName": text_of(&element, &name_selector),
            "userIcon": user_icon,
            "description": text_of(&element, &desc_selector),
            "imageUrls": image_urls,
        });
        works.push(ItemSummary::new(id, work));
    }

    Ok(works)
}

/// Absolute `src` of every image of an appended-files fragment
pub fn parse_appended_images(fragment: &str, page_url: &Url) -> Result<Vec<String>> {
    let document = Html::parse_fragment(fragment);
    let img_selector = selector("img")?;

    Ok(document
        .select(&img_selector)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| page_url.join(src).ok())
        .map(|url| url.to_string())
        .collect())
}

/// Drops the size suffix of a thumbnail URL to get the original file
pub fn original_image_url(url: &str) -> &str {
    url.strip_suffix("_640.jpg").unwrap_or(url)
}

#[async_trait]
impl PagedFeed for PoipikuAdapter {
    type Cursor = u32;

    fn first_cursor(&self) -> u32 {
        0
    }

    async fn fetch_page(&self, page: &u32) -> Result<FeedPage<u32>> {
        let mut url = self.home_url.clone();
        url.query_pairs_mut().append_pair("PG", &page.to_string());

        let html = self.http.get_text(url.as_str(), &self.headers).await?;
        let items = parse_home_page(&html, &self.home_url)?;
        tracing::info!("[poipiku:page={}] Response with {} items", page, items.len());

        let next = if items.is_empty() { None } else { Some(page + 1) };
        Ok(FeedPage::Items { items, next })
    }
}

#[async_trait]
impl SiteAdapter for PoipikuAdapter {
    fn site(&self) -> Site {
        Site::Poipiku
    }

    async fn enumerate_frontier(
        &self,
        index: &KnownIdIndex,
        budget: &Budget,
    ) -> Result<Vec<ItemSummary>> {
        let limits = StreakLimits {
            grace_pages: self.config.grace_pages,
            max_pages: self.config.max_pages,
            soft_error_retries: 0,
        };
        walk_known_streak(self, "poipiku", index, limits, budget).await
    }

    async fn fetch_item_detail(
        &self,
        summary: &ItemSummary,
        _visited: &HashSet<String>,
    ) -> Result<Vec<Item>> {
        let user_id = summary
            .data
            .get("userId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        tracing::info!("[poipiku] Retrieving appended data of id={}...", summary.id);

        let url = format!("{}/f/ShowAppendFileF.jsp", self.base());
        let mut headers = self.headers.clone();
        headers.push((
            "Referer".to_string(),
            format!("{}/{}/{}.html", self.base(), user_id, summary.id),
        ));
        let form = [("UID", user_id.to_string()), ("IID", summary.id.clone())];
        let response = self.http.post_form_json(&url, &form, &headers).await?;

        let fragment = response
            .get("html")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let appended = parse_appended_images(fragment, &self.home_url)?;

        let mut body = summary.data.clone();
        let image_urls = body
            .get_mut("imageUrls")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| HoardError::UnexpectedShape {
                context: url.clone(),
                message: "work without imageUrls".to_string(),
            })?;
        image_urls.extend(appended.into_iter().map(Value::String));

        Ok(vec![Item::from_summary(summary, body)])
    }

    fn extract_media(&self, item: &Item) -> Result<Vec<MediaRef>> {
        let urls = item
            .body
            .get("imageUrls")
            .and_then(Value::as_array)
            .ok_or_else(|| missing_field("poipiku", "imageUrls"))?;

        Ok(urls
            .iter()
            .filter_map(Value::as_str)
            .map(|url| {
                MediaRef::new(original_image_url(url), MediaKind::Image)
                    .with_header("Referer", IMAGE_REFERER)
            })
            .collect())
    }
}
