//! Pixiv bookmarks
//!
//! Bookmarks are paged by offset, newest first, separately for the public
//! (`show`) and private (`hide`) partitions. The API flags failures in the
//! body (`"error": true`) while answering 200; such pages are retried.

use crate::config::PixivConfig;
use crate::crawler::budget::Budget;
use crate::crawler::driver::SiteAdapter;
use crate::crawler::fetcher::{cookie_header, HttpClient};
use crate::crawler::frontier::{walk_known_streak, FeedPage, PagedFeed, StreakLimits};
use crate::index::KnownIdIndex;
use crate::model::{Item, ItemSummary, MediaKind, MediaRef, Site, Visibility};
use crate::sites::{id_field, missing_field};
use crate::{HoardError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

/// Value of the `rest` query parameter of a partition
pub fn rest_param(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "show",
        Visibility::Private => "hide",
    }
}

pub struct PixivAdapter {
    http: HttpClient,
    config: PixivConfig,
    visibility: Visibility,
    headers: Vec<(String, String)>,
    soft_error_retries: u32,
}

impl PixivAdapter {
    pub fn new(
        http: HttpClient,
        config: PixivConfig,
        session: &str,
        visibility: Visibility,
    ) -> Self {
        Self {
            http,
            config,
            visibility,
            headers: vec![cookie_header("PHPSESSID", session)],
            soft_error_retries: 3,
        }
    }

    pub fn with_soft_error_retries(mut self, retries: u32) -> Self {
        self.soft_error_retries = retries;
        self
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn referer(&self) -> String {
        format!("{}/", self.base())
    }
}

/// Splits an API envelope into its body or its error message
fn unwrap_envelope(response: Value, context: &str) -> std::result::Result<Value, String> {
    if response.get("error").and_then(Value::as_bool).unwrap_or(false) {
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("unknown error");
        return Err(format!("{}: {}", context, message));
    }
    match response {
        Value::Object(mut map) => Ok(map.remove("body").unwrap_or(Value::Null)),
        _ => Err(format!("{}: response is not an object", context)),
    }
}

#[async_trait]
impl PagedFeed for PixivAdapter {
    type Cursor = u32;

    fn first_cursor(&self) -> u32 {
        0
    }

    async fn fetch_page(&self, offset: &u32) -> Result<FeedPage<u32>> {
        let url = format!(
            "{}/ajax/user/{}/illusts/bookmarks",
            self.base(),
            self.config.user_id
        );
        let query = [
            ("tag", String::new()),
            ("offset", offset.to_string()),
            ("limit", self.config.page_size.to_string()),
            ("rest", rest_param(self.visibility).to_string()),
        ];
        let response = self.http.get_json_query(&url, &query, &self.headers).await?;

        let body = match unwrap_envelope(response, &url) {
            Ok(body) => body,
            Err(message) => return Ok(FeedPage::SoftError(message)),
        };
        let works = body
            .get("works")
            .and_then(Value::as_array)
            .ok_or_else(|| missing_field(&url, "body.works"))?;

        let mut items = Vec::with_capacity(works.len());
        for work in works {
            let id = id_field(work, "illustId")
                .or_else(|| id_field(work, "id"))
                .ok_or_else(|| missing_field(&url, "id"))?;
            items.push(ItemSummary::new(id, work.clone()).with_visibility(self.visibility));
        }

        let next = if (items.len() as u32) < self.config.page_size {
            None
        } else {
            Some(offset + self.config.page_size)
        };
        Ok(FeedPage::Items { items, next })
    }
}

#[async_trait]
impl SiteAdapter for PixivAdapter {
    fn site(&self) -> Site {
        Site::Pixiv
    }

    fn label(&self) -> String {
        format!("pixiv:{}", rest_param(self.visibility))
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
        walk_known_streak(self, &self.label(), index, limits, budget).await
    }

    async fn fetch_item_detail(
        &self,
        summary: &ItemSummary,
        _visited: &HashSet<String>,
    ) -> Result<Vec<Item>> {
        let url = format!("{}/ajax/illust/{}/pages", self.base(), summary.id);
        let response = self.http.get_json(&url, &self.headers).await?;
        let pages = unwrap_envelope(response, &url).map_err(|message| HoardError::UnexpectedShape {
            context: url.clone(),
            message,
        })?;

        tracing::info!(
            "[pixiv] Retrieved {} pages of {}",
            pages.as_array().map_or(0, Vec::len),
            summary.id
        );

        let mut body = summary.data.clone();
        match body.as_object_mut() {
            Some(object) => {
                object.insert("pages".to_string(), pages);
            }
            None => body = serde_json::json!({ "work": body, "pages": pages }),
        }

        Ok(vec![Item::from_summary(summary, body)])
    }

    fn extract_media(&self, item: &Item) -> Result<Vec<MediaRef>> {
        let pages = item
            .body
            .get("pages")
            .and_then(Value::as_array)
            .ok_or_else(|| missing_field(&self.label(), "pages"))?;

        pages
            .iter()
            .map(|page| {
                let url = page
                    .pointer("/urls/original")
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing_field(&self.label(), "urls.original"))?;
                Ok(MediaRef::new(url, MediaKind::Image).with_header("Referer", self.referer()))
            })
            .collect()
    }
}
