use crate::config::types::{
    BoothConfig, Config, CrawlerConfig, FanboxConfig, PixivConfig, PoipikuConfig, StorageConfig,
    TwitterConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;

    if config.user_agent.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent value cannot be empty".to_string(),
        ));
    }

    validate_twitter_config(&config.twitter)?;
    validate_pixiv_config(&config.pixiv)?;
    validate_fanbox_config(&config.fanbox)?;
    validate_poipiku_config(&config.poipiku)?;
    validate_booth_config(&config.booth)?;
    Ok(())
}

/// Validates crawl loop settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_delay > 60_000 {
        return Err(ConfigError::Validation(format!(
            "request-delay must be <= 60000ms, got {}ms",
            config.request_delay
        )));
    }

    if config.hard_deadline_seconds > config.soft_deadline_seconds {
        return Err(ConfigError::Validation(format!(
            "hard-deadline-seconds ({}) must not exceed soft-deadline-seconds ({})",
            config.hard_deadline_seconds, config.soft_deadline_seconds
        )));
    }

    if config.index_flush_interval < 1 {
        return Err(ConfigError::Validation(
            "index-flush-interval must be >= 1".to_string(),
        ));
    }

    if config.entry_batch_size < 1 || config.entry_batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "entry-batch-size must be between 1 and 1000, got {}",
            config.entry_batch_size
        )));
    }

    Ok(())
}

/// Validates storage locations
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.blob_root.is_empty() {
        return Err(ConfigError::Validation(
            "blob-root cannot be empty".to_string(),
        ));
    }

    if config.signing_secret.len() < 6 {
        return Err(ConfigError::Validation(
            "signing-secret must be at least 6 characters".to_string(),
        ));
    }

    validate_base_url("public-base-url", &config.public_base_url)?;

    if config.signed_url_ttl < 1 {
        return Err(ConfigError::Validation(
            "signed-url-ttl must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

fn validate_twitter_config(config: &TwitterConfig) -> Result<(), ConfigError> {
    validate_base_url("twitter.api-base", &config.api_base)?;

    if config.page_size < 1 || config.page_size > 200 {
        return Err(ConfigError::Validation(format!(
            "twitter.page-size must be between 1 and 200, got {}",
            config.page_size
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "twitter.max-pages must be >= 1".to_string(),
        ));
    }

    for account in &config.accounts {
        if account.is_empty()
            || !account
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "Invalid twitter screen name '{}'",
                account
            )));
        }
    }

    Ok(())
}

fn validate_pixiv_config(config: &PixivConfig) -> Result<(), ConfigError> {
    validate_base_url("pixiv.base-url", &config.base_url)?;

    if !config.user_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "pixiv.user-id must be numeric, got '{}'",
            config.user_id
        )));
    }

    validate_paging("pixiv", config.page_size, config.max_pages, config.grace_pages)
}

fn validate_fanbox_config(config: &FanboxConfig) -> Result<(), ConfigError> {
    validate_base_url("fanbox.api-base", &config.api_base)?;
    validate_base_url("fanbox.origin", &config.origin)?;
    validate_paging("fanbox", config.page_size, config.max_pages, config.grace_pages)
}

fn validate_poipiku_config(config: &PoipikuConfig) -> Result<(), ConfigError> {
    validate_base_url("poipiku.base-url", &config.base_url)?;
    validate_paging("poipiku", 1, config.max_pages, config.grace_pages)
}

fn validate_booth_config(config: &BoothConfig) -> Result<(), ConfigError> {
    validate_base_url("booth.base-url", &config.base_url)?;

    if config.upload_concurrency < 1 || config.upload_concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "booth.upload-concurrency must be between 1 and 16, got {}",
            config.upload_concurrency
        )));
    }

    Ok(())
}

/// Validates the paging knobs of a known-streak feed
fn validate_paging(
    site: &str,
    page_size: u32,
    max_pages: u32,
    grace_pages: u32,
) -> Result<(), ConfigError> {
    if page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.page-size must be >= 1",
            site
        )));
    }

    if max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.max-pages must be >= 1",
            site
        )));
    }

    if grace_pages < 1 || grace_pages > max_pages {
        return Err(ConfigError::Validation(format!(
            "{}.grace-pages must be between 1 and max-pages ({}), got {}",
            site, max_pages, grace_pages
        )));
    }

    Ok(())
}

/// Validates that a base URL parses and uses HTTP(S)
fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
