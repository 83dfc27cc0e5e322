//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - Fixed pacing before every external request
//! - JSON, HTML and binary GETs with per-site headers
//! - Resolving download redirects without following them
//! - Error classification

use crate::config::Config;
use crate::{HoardError, Result};
use bytes::Bytes;
use reqwest::{header, redirect::Policy, Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Result of a binary fetch
#[derive(Debug)]
pub enum FetchResult {
    /// The body was downloaded
    Success {
        /// Content-Type header value
        content_type: Option<String>,
        /// Response body
        body: Bytes,
    },

    /// The server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// The underlying client error
        source: reqwest::Error,
    },
}

impl FetchResult {
    /// Whether the failure is a server error that a fallback URL may work around
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::HttpError { status_code } if *status_code >= 500)
    }

    /// Unwraps the body, converting failures to item-level errors
    pub fn into_body(self, url: &str) -> Result<(Option<String>, Bytes)> {
        match self {
            Self::Success { content_type, body } => Ok((content_type, body)),
            Self::HttpError { status_code } => Err(HoardError::Status {
                url: url.to_string(),
                status: status_code,
            }),
            Self::NetworkError { source } => Err(HoardError::Http {
                url: url.to_string(),
                source,
            }),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
/// * `follow_redirects` - Whether redirects are followed automatically
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, follow_redirects: bool) -> Result<Client> {
    let policy = if follow_redirects {
        Policy::limited(10)
    } else {
        Policy::none()
    };

    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .redirect(policy)
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Paced HTTP access shared by every site adapter
///
/// Every request waits `request_delay` first, so consecutive calls to the same
/// site are spaced out regardless of which adapter issues them.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
    delay: Duration,
}

impl HttpClient {
    pub fn new(user_agent: &str, request_delay: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(user_agent, true)?,
            no_redirect: build_http_client(user_agent, false)?,
            delay: request_delay,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.user_agent.value,
            Duration::from_millis(config.crawler.request_delay),
        )
    }

    async fn pace(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn with_headers(mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn send_checked(&self, url: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        self.pace().await;

        let response = request.send().await.map_err(|source| HoardError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HoardError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn decode_json(url: &str, response: reqwest::Response) -> Result<Value> {
        let text = response.text().await.map_err(|source| HoardError::Http {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| HoardError::UnexpectedShape {
            context: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GETs a JSON document
    pub async fn get_json(&self, url: &str, headers: &[(String, String)]) -> Result<Value> {
        let request = Self::with_headers(self.client.get(url), headers);
        let response = self.send_checked(url, request).await?;
        Self::decode_json(url, response).await
    }

    /// GETs a JSON document with query parameters
    pub async fn get_json_query(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(String, String)],
    ) -> Result<Value> {
        let request = Self::with_headers(self.client.get(url).query(query), headers);
        let response = self.send_checked(url, request).await?;
        Self::decode_json(url, response).await
    }

    /// POSTs a form and decodes the JSON answer
    pub async fn post_form_json(
        &self,
        url: &str,
        form: &[(&str, String)],
        headers: &[(String, String)],
    ) -> Result<Value> {
        let request = Self::with_headers(self.client.post(url).form(form), headers);
        let response = self.send_checked(url, request).await?;
        Self::decode_json(url, response).await
    }

    /// GETs an HTML page as text
    pub async fn get_text(&self, url: &str, headers: &[(String, String)]) -> Result<String> {
        let request = Self::with_headers(self.client.get(url), headers);
        let response = self.send_checked(url, request).await?;
        response.text().await.map_err(|source| HoardError::Http {
            url: url.to_string(),
            source,
        })
    }

    /// Downloads a binary body, reporting failures as values
    pub async fn fetch_bytes(&self, url: &str, headers: &[(String, String)]) -> FetchResult {
        self.pace().await;

        let request = Self::with_headers(self.client.get(url), headers);
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return FetchResult::NetworkError { source },
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::HttpError {
                status_code: status.as_u16(),
            };
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        match response.bytes().await {
            Ok(body) => FetchResult::Success { content_type, body },
            Err(source) => FetchResult::NetworkError { source },
        }
    }

    /// Requests a URL without following redirects and returns its `Location`
    ///
    /// A response without a `Location` header is reported as a status error.
    pub async fn resolve_location(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<String> {
        self.pace().await;

        let request = Self::with_headers(self.no_redirect.get(url), headers);
        let response = request.send().await.map_err(|source| HoardError::Http {
            url: url.to_string(),
            source,
        })?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| HoardError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            })
    }
}

/// A `Cookie` header with a single name/value pair
pub fn cookie_header(name: &str, value: &str) -> (String, String) {
    ("Cookie".to_string(), format!("{}={}", name, value))
}
