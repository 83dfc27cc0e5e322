//! Twitter favorites
//!
//! Favorites are listed with a descending `max_id` cursor. Every favorite is
//! archived together with the tweets it replies to.

use crate::config::TwitterConfig;
use crate::crawler::budget::Budget;
use crate::crawler::driver::SiteAdapter;
use crate::crawler::fetcher::HttpClient;
use crate::crawler::frontier::{walk_cursor, CursorSource};
use crate::crawler::thread::{walk_reply_chain, StatusLookup};
use crate::index::KnownIdIndex;
use crate::model::{Item, ItemSummary, MediaKind, MediaRef, Site};
use crate::sites::{id_field, missing_field};
use crate::{HoardError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Credential stored for a twitter account
#[derive(Debug, Deserialize)]
struct TwitterSession {
    bearer_token: String,
}

pub struct TwitterAdapter {
    http: HttpClient,
    config: TwitterConfig,
    account: String,
    headers: Vec<(String, String)>,
}

impl TwitterAdapter {
    /// Creates the adapter of one account from its stored credential
    pub fn new(
        http: HttpClient,
        config: TwitterConfig,
        account: &str,
        credential: &str,
    ) -> Result<Self> {
        let session: TwitterSession =
            serde_json::from_str(credential).map_err(|e| HoardError::UnexpectedShape {
                context: format!("twitter:{} session", account),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            config,
            account: account.to_string(),
            headers: vec![(
                "Authorization".to_string(),
                format!("Bearer {}", session.bearer_token),
            )],
        })
    }

    fn endpoint(&self, target: &str) -> String {
        format!("{}/{}.json", self.config.api_base.trim_end_matches('/'), target)
    }
}

fn to_item(status: Value, context: &str) -> Result<Item> {
    let id = id_field(&status, "id_str").ok_or_else(|| missing_field(context, "id_str"))?;
    Ok(Item {
        id,
        visibility: Default::default(),
        restricted: false,
        body: status,
    })
}

#[async_trait]
impl CursorSource for TwitterAdapter {
    async fn fetch_older(&self, max_id: Option<u64>) -> Result<Vec<ItemSummary>> {
        let mut query = vec![
            ("screen_name", self.account.clone()),
            ("count", self.config.page_size.to_string()),
            ("include_entities", "true".to_string()),
        ];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }

        let url = self.endpoint("favorites/list");
        let response = self.http.get_json_query(&url, &query, &self.headers).await?;
        let tweets = match response {
            Value::Array(tweets) => tweets,
            other => {
                return Err(HoardError::UnexpectedShape {
                    context: url,
                    message: format!("expected an array of tweets, got {}", other),
                })
            }
        };

        tweets
            .into_iter()
            .map(|tweet| {
                let id = id_field(&tweet, "id_str").ok_or_else(|| missing_field(&url, "id_str"))?;
                Ok(ItemSummary::new(id, tweet))
            })
            .collect()
    }
}

#[async_trait]
impl StatusLookup for TwitterAdapter {
    async fn lookup_status(&self, id: &str) -> Result<Value> {
        let url = self.endpoint("statuses/show");
        self.http
            .get_json_query(&url, &[("id", id.to_string())], &self.headers)
            .await
    }
}

#[async_trait]
impl SiteAdapter for TwitterAdapter {
    fn site(&self) -> Site {
        Site::Twitter
    }

    fn label(&self) -> String {
        format!("twitter:{}", self.account)
    }

    async fn enumerate_frontier(
        &self,
        _index: &KnownIdIndex,
        budget: &Budget,
    ) -> Result<Vec<ItemSummary>> {
        walk_cursor(self, &self.label(), self.config.max_pages, budget).await
    }

    async fn fetch_item_detail(
        &self,
        summary: &ItemSummary,
        visited: &HashSet<String>,
    ) -> Result<Vec<Item>> {
        let chain = walk_reply_chain(self, summary.data.clone(), visited).await;
        tracing::info!(
            "[id:{}] Retrieved {} target tweets",
            summary.id,
            chain.len()
        );

        let label = self.label();
        chain
            .into_iter()
            .map(|status| to_item(status, &label))
            .collect()
    }

    fn extract_media(&self, item: &Item) -> Result<Vec<MediaRef>> {
        let media = item
            .body
            .pointer("/extended_entities/media")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        media
            .iter()
            .map(|medium| {
                let url = medium
                    .get("media_url_https")
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing_field(&self.label(), "media_url_https"))?;
                Ok(MediaRef::new(url, MediaKind::Image)
                    .with_fetch_url(format!("{}?name=orig", url)))
            })
            .collect()
    }
}
