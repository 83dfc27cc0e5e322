//! Fanbox home feed
//!
//! The home feed links each page to the next through `nextUrl`. Posts the
//! session cannot read yet come back with `isRestricted`; they are archived
//! anyway and archived again once the feed shows them unlocked.

use crate::config::FanboxConfig;
use crate::crawler::budget::Budget;
use crate::crawler::driver::SiteAdapter;
use crate::crawler::fetcher::{cookie_header, HttpClient};
use crate::crawler::frontier::{walk_known_streak, FeedPage, PagedFeed, StreakLimits};
use crate::index::KnownIdIndex;
use crate::model::{Item, ItemSummary, MediaKind, MediaRef, Site};
use crate::sites::{id_field, missing_field};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

pub struct FanboxAdapter {
    http: HttpClient,
    config: FanboxConfig,
    headers: Vec<(String, String)>,
    soft_error_retries: u32,
}

impl FanboxAdapter {
    pub fn new(http: HttpClient, config: FanboxConfig, session: &str) -> Self {
        let headers = vec![
            ("Origin".to_string(), config.origin.clone()),
            cookie_header("FANBOXSESSID", session),
        ];
        Self {
            http,
            config,
            headers,
            soft_error_retries: 0,
        }
    }

    fn api(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), method)
    }
}

fn is_restricted(post: &Value) -> bool {
    post.get("isRestricted")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Entries of a post body stored both as a list and as an ID-keyed map
fn list_and_map<'a>(body: &'a Value, list: &str, map: &str) -> Vec<&'a Value> {
    let mut entries: Vec<&Value> = body
        .get(list)
        .and_then(Value::as_array)
        .map(|list| list.iter().collect())
        .unwrap_or_default();
    if let Some(map) = body.get(map).and_then(Value::as_object) {
        entries.extend(map.values());
    }
    entries
}

#[async_trait]
impl PagedFeed for FanboxAdapter {
    type Cursor = String;

    fn first_cursor(&self) -> String {
        format!("{}?limit={}", self.api("post.listHome"), self.config.page_size)
    }

    async fn fetch_page(&self, url: &String) -> Result<FeedPage<String>> {
        let response = self.http.get_json(url, &self.headers).await?;
        let body = response
            .get("body")
            .ok_or_else(|| missing_field(url, "body"))?;
        let posts = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| missing_field(url, "body.items"))?;

        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            let id = id_field(post, "id").ok_or_else(|| missing_field(url, "id"))?;
            items.push(ItemSummary::new(id, post.clone()).with_restricted(is_restricted(post)));
        }

        let next = body
            .get("nextUrl")
            .and_then(Value::as_str)
            .filter(|next| !next.is_empty())
            .map(str::to_string);
        Ok(FeedPage::Items { items, next })
    }
}

#[async_trait]
impl SiteAdapter for FanboxAdapter {
    fn site(&self) -> Site {
        Site::Fanbox
    }

    async fn enumerate_frontier(
        &self,
        index: &KnownIdIndex,
        budget: &Budget,
    ) -> Result<Vec<ItemSummary>> {
        let limits = StreakLimits {
            grace_pages: self.config.grace_pages,
            max_pages: self.config.max_pages,
            soft_error_retries: self.soft_error_retries,
        };
        walk_known_streak(self, "fanbox", index, limits, budget).await
    }

    async fn fetch_item_detail(
        &self,
        summary: &ItemSummary,
        _visited: &HashSet<String>,
    ) -> Result<Vec<Item>> {
        let url = self.api("post.info");
        tracing::info!("[fanbox] Retrieving post... (id = {})", summary.id);
        let mut response = self
            .http
            .get_json_query(&url, &[("postId", summary.id.clone())], &self.headers)
            .await?;
        let post = response
            .get_mut("body")
            .map(Value::take)
            .filter(Value::is_object)
            .ok_or_else(|| missing_field(&url, "body"))?;

        let mut item = Item::from_summary(summary, post);
        item.restricted = is_restricted(&item.body);
        Ok(vec![item])
    }

    fn extract_media(&self, item: &Item) -> Result<Vec<MediaRef>> {
        let body = match item.body.get("body") {
            Some(body) if !body.is_null() => body,
            _ => return Ok(Vec::new()),
        };
        let mut media = Vec::new();

        for image in list_and_map(body, "images", "imageMap") {
            let original = image
                .get("originalUrl")
                .and_then(Value::as_str)
                .ok_or_else(|| missing_field("fanbox", "originalUrl"))?;
            let thumbnail = image
                .get("thumbnailUrl")
                .and_then(Value::as_str)
                .map(str::to_string);
            let image = MediaRef::new(original, MediaKind::Image).with_fallback(thumbnail);
            media.push(self.with_session(image));
        }

        for file in list_and_map(body, "files", "fileMap") {
            let url = file
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| missing_field("fanbox", "url"))?;
            media.push(self.with_session(MediaRef::new(url, MediaKind::File)));
        }

        Ok(media)
    }
}

impl FanboxAdapter {
    fn with_session(&self, media: MediaRef) -> MediaRef {
        self.headers
            .iter()
            .fold(media, |media, (name, value)| media.with_header(name, value))
    }
}
