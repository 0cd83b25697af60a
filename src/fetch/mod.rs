//! Observing the current value of a tracked resource

pub mod http;

pub use http::{HttpFetcherConfig, HttpPriceFetcher};

use async_trait::async_trait;

/// Strategy for reading a numeric value from a locator
#[async_trait]
pub trait ValueFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<f64, FetchError>;
}

/// Fetch failures; the monitor treats every variant alike
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid locator '{0}'")]
    InvalidLocator(String),

    #[error("Host '{0}' is not allowed")]
    HostNotAllowed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Price pattern not found in page")]
    PatternNotFound,

    #[error("Failed to parse price '{0}'")]
    Parse(String),

    #[error("Invalid value {0}")]
    InvalidValue(f64),

    #[error("Fetch timed out after {0:?}")]
    Timeout(std::time::Duration),
}
