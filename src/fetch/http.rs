//! HTTP page fetch with regex price extraction

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;

use super::{FetchError, ValueFetcher};

/// Matches the whole-number part of an Amazon product price
pub const DEFAULT_PRICE_PATTERN: &str = r#"class="a-price-whole"[^>]*>\s*([0-9][0-9.,]*)"#;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Settings for [`HttpPriceFetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Regex applied to the page body; the first capture group (or the whole
    /// match when there is none) holds the price
    pub price_pattern: String,
    /// Hosts that may be fetched; empty allows any host
    pub allowed_hosts: Vec<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            price_pattern: DEFAULT_PRICE_PATTERN.to_string(),
            allowed_hosts: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Fetches a product page and extracts the price with a regex
#[derive(Debug, Clone)]
pub struct HttpPriceFetcher {
    client: reqwest::Client,
    pattern: Regex,
    allowed_hosts: Vec<String>,
}

impl HttpPriceFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, HttpFetcherBuildError> {
        let pattern = Regex::new(&config.price_pattern)?;
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            pattern,
            allowed_hosts: config
                .allowed_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Parse and validate a locator before any network traffic
    pub fn validate_locator(&self, locator: &str) -> Result<Url, FetchError> {
        let url = Url::parse(locator).map_err(|_| FetchError::InvalidLocator(locator.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidLocator(locator.to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidLocator(locator.to_string()))?
            .to_ascii_lowercase();

        if !self.allowed_hosts.is_empty() && !self.allowed_hosts.contains(&host) {
            return Err(FetchError::HostNotAllowed(host));
        }

        Ok(url)
    }

    /// Pull the price out of a page body
    pub fn extract_price(&self, body: &str) -> Result<f64, FetchError> {
        let captures = self
            .pattern
            .captures(body)
            .ok_or(FetchError::PatternNotFound)?;

        let raw = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str())
            .ok_or(FetchError::PatternNotFound)?;

        parse_price(raw)
    }
}

#[async_trait]
impl ValueFetcher for HttpPriceFetcher {
    async fn fetch(&self, locator: &str) -> Result<f64, FetchError> {
        let url = self.validate_locator(locator)?;

        tracing::debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        self.extract_price(&body)
    }
}

/// Parse a displayed price, dropping thousands separators and a trailing dot
fn parse_price(raw: &str) -> Result<f64, FetchError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim_end_matches('.');

    let value: f64 = cleaned
        .parse()
        .map_err(|_| FetchError::Parse(raw.to_string()))?;

    if !value.is_finite() || value < 0.0 {
        return Err(FetchError::InvalidValue(value));
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum HttpFetcherBuildError {
    #[error("Invalid price pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
