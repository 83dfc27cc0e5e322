//! Site adapters
//!
//! Each scheduled site implements [`SiteAdapter`] for the generic crawl
//! driver. Booth is archived on demand from order numbers instead.

pub mod booth;
pub mod fanbox;
pub mod pixiv;
pub mod poipiku;
pub mod twitter;

use crate::config::Config;
use crate::crawler::driver::SiteAdapter;
use crate::crawler::fetcher::HttpClient;
use crate::model::Site;
use crate::storage::{lock, SessionStore, SharedStorage};
use crate::{HoardError, Result};
use serde_json::Value;

/// Session ID of a twitter account, e.g. `twitter:alice`
pub fn twitter_session_id(account: &str) -> String {
    format!("twitter:{}", account)
}

/// Reads a registered credential
pub fn load_session(storage: &SharedStorage, id: &str) -> Result<String> {
    let session = lock(storage)?.get_session(id)?;
    match session {
        Some(session) => {
            tracing::info!("[{}] Session retrieved.", id);
            Ok(session.credential)
        }
        None => Err(HoardError::MissingSession(id.to_string())),
    }
}

/// Builds the adapters that crawl one site
///
/// Twitter yields one adapter per configured account and pixiv one per
/// bookmark visibility. Every credential is loaded before any adapter runs.
pub fn adapters_for(
    site: Site,
    config: &Config,
    storage: &SharedStorage,
    http: &HttpClient,
) -> Result<Vec<Box<dyn SiteAdapter>>> {
    let mut adapters: Vec<Box<dyn SiteAdapter>> = Vec::new();

    match site {
        Site::Twitter => {
            for account in &config.twitter.accounts {
                let credential = load_session(storage, &twitter_session_id(account))?;
                adapters.push(Box::new(twitter::TwitterAdapter::new(
                    http.clone(),
                    config.twitter.clone(),
                    account,
                    &credential,
                )?));
            }
        }
        Site::Pixiv => {
            if config.pixiv.user_id.is_empty() {
                return Err(HoardError::InvalidArgument(
                    "pixiv.user-id is not configured".to_string(),
                ));
            }
            let session = load_session(storage, "pixiv")?;
            for visibility in &config.pixiv.visibilities {
                adapters.push(Box::new(pixiv::PixivAdapter::new(
                    http.clone(),
                    config.pixiv.clone(),
                    &session,
                    *visibility,
                )
                .with_soft_error_retries(config.crawler.soft_error_retries)));
            }
        }
        Site::Fanbox => {
            let session = load_session(storage, "fanbox")?;
            adapters.push(Box::new(fanbox::FanboxAdapter::new(
                http.clone(),
                config.fanbox.clone(),
                &session,
            )));
        }
        Site::Poipiku => {
            let session = load_session(storage, "poipiku")?;
            adapters.push(Box::new(poipiku::PoipikuAdapter::new(
                http.clone(),
                config.poipiku.clone(),
                &session,
            )?));
        }
        Site::Booth => {
            return Err(HoardError::InvalidArgument(
                "booth is archived on demand with the `booth` command".to_string(),
            ));
        }
    }

    Ok(adapters)
}

/// Reads an ID that a site serializes either as a string or as a number
pub(crate) fn id_field(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compiles a CSS selector used to scrape a site page
pub(crate) fn selector(css: &str) -> Result<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|e| HoardError::UnexpectedShape {
        context: css.to_string(),
        message: format!("invalid selector: {:?}", e),
    })
}

/// Builds the error for a response missing a required field
pub(crate) fn missing_field(context: &str, field: &str) -> HoardError {
    HoardError::UnexpectedShape {
        context: context.to_string(),
        message: format!("missing field '{}'", field),
    }
}
