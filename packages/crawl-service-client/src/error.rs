//! Error types for the crawl service client.

use thiserror::Error;

/// Result type for crawl service client operations.
pub type Result<T> = std::result::Result<T, CrawlServiceError>;

/// Crawl service client errors.
#[derive(Debug, Error)]
pub enum CrawlServiceError {
    /// API error (non-2xx response)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Base URL could not be used to build a request
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl CrawlServiceError {
    /// True when the service answered but refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// True for connection failures and timeouts.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for CrawlServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CrawlServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
