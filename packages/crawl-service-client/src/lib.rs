//! Pure crawl service REST client.
//!
//! A minimal client for the external crawl service. Supports submitting crawl
//! jobs, polling their status, pause/resume/stop, and fetching the produced
//! report and files. No local state is kept here.
//!
//! # Example
//!
//! ```rust,ignore
//! use crawl_service_client::{ControlAction, CrawlServiceClient};
//!
//! let client = CrawlServiceClient::new("http://localhost:5000")?;
//!
//! let created = client.create_crawl("https://example.com", 2).await?;
//! if let Some(crawl_id) = created.crawl_id() {
//!     let status = client.get_status(&crawl_id).await?;
//!     println!("{} ({:?} pages)", status.status, status.crawled);
//!     client.control(&crawl_id, ControlAction::Pause).await?;
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{CrawlServiceError, Result};
pub use types::{
    ControlAck, ControlAction, CrawlRequest, CrawlStatusResponse, CreateCrawlResponse,
    ReportFiles, ReportResponse,
};

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the crawl service.
#[derive(Debug, Clone)]
pub struct CrawlServiceClient {
    client: Client,
    base_url: String,
}

impl CrawlServiceClient {
    /// Create a client with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests fail with a network error after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlServiceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a crawl job. A success response may still lack a `crawl_id`;
    /// callers decide what that means.
    pub async fn create_crawl(&self, url: &str, depth: u32) -> Result<CreateCrawlResponse> {
        let form = CrawlRequest {
            url: url.to_string(),
            depth,
        };

        let resp = self
            .client
            .post(self.endpoint(&["crawl"]))
            .form(&form)
            .send()
            .await?;

        let resp = Self::ensure_success(resp).await?;
        let body = resp.text().await?;
        let created: CreateCrawlResponse = if body.trim().is_empty() {
            CreateCrawlResponse::default()
        } else {
            serde_json::from_str(&body)?
        };
        debug!(url, depth, crawl_id = ?created.crawl_id(), "Crawl submitted");
        Ok(created)
    }

    /// Poll the current status of a crawl.
    pub async fn get_status(&self, crawl_id: &str) -> Result<CrawlStatusResponse> {
        let resp = self
            .client
            .get(self.endpoint(&["status", crawl_id]))
            .send()
            .await?;

        Self::decode(resp).await
    }

    /// Pause, resume or stop a crawl.
    pub async fn control(&self, crawl_id: &str, action: ControlAction) -> Result<ControlAck> {
        let resp = self
            .client
            .post(self.endpoint(&["control", crawl_id, action.as_str()]))
            .send()
            .await?;

        let resp = Self::ensure_success(resp).await?;
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(ControlAck::default());
        }

        let ack = serde_json::from_str(&body)?;
        debug!(crawl_id, %action, "Control command acknowledged");
        Ok(ControlAck(ack))
    }

    /// Fetch the categorized file listing of a crawl.
    pub async fn get_report(&self, crawl_id: &str) -> Result<ReportFiles> {
        let resp = self
            .client
            .get(self.endpoint(&["report", crawl_id]))
            .send()
            .await?;

        let report: ReportResponse = Self::decode(resp).await?;
        Ok(report.files)
    }

    /// Download one produced file as raw bytes.
    pub async fn download_file(
        &self,
        crawl_id: &str,
        category: &str,
        filename: &str,
    ) -> Result<Bytes> {
        let resp = self
            .client
            .get(self.endpoint(&["download", crawl_id, category, filename]))
            .send()
            .await?;

        let resp = Self::ensure_success(resp).await?;
        Ok(resp.bytes().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> String {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.base_url, path)
    }

    async fn ensure_success(resp: Response) -> Result<Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrawlServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let resp = Self::ensure_success(resp).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = CrawlServiceClient::new("http://localhost:5000/").unwrap();

        assert_eq!(
            client.endpoint(&["download", "abc", "content", "my page.md"]),
            "http://localhost:5000/download/abc/content/my%20page.md"
        );
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_with_timeout_keeps_base_url() {
        let client =
            CrawlServiceClient::with_timeout("http://crawler:8000", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://crawler:8000");
    }
}
