// Boundary to the external crawl service.
//
// This is an INFRASTRUCTURE trait only. State-machine decisions (what a
// missing id or a rejected pause means) live in the orchestrator.

use async_trait::async_trait;
use bytes::Bytes;
use crawl_service_client::{ControlAck, ControlAction, CrawlServiceError};

use crate::session::{ProgressUpdate, SessionReport};

/// Outcome of a successful job submission. `job_id` is `None` when the
/// service answered with success but assigned no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedJob {
    pub job_id: Option<String>,
}

/// Raw status reported for a remote job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteStatus {
    pub raw_status: String,
    pub crawled: Option<u64>,
    pub total: Option<u64>,
    pub queued: Option<u64>,
    pub current_url: Option<String>,
}

impl RemoteStatus {
    pub fn new(raw_status: impl Into<String>) -> Self {
        Self {
            raw_status: raw_status.into(),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, crawled: u64, total: u64, queued: u64) -> Self {
        self.crawled = Some(crawled);
        self.total = Some(total);
        self.queued = Some(queued);
        self
    }

    pub fn with_current_url(mut self, url: impl Into<String>) -> Self {
        self.current_url = Some(url.into());
        self
    }

    pub fn progress(&self) -> ProgressUpdate {
        ProgressUpdate {
            crawled: self.crawled,
            total: self.total,
            queued: self.queued,
            current_url: self.current_url.clone(),
        }
    }
}

#[async_trait]
pub trait BaseCrawlService: Send + Sync {
    /// Submit a crawl of `url` to `depth` levels.
    async fn create_job(&self, url: &str, depth: u32) -> Result<CreatedJob, CrawlServiceError>;

    async fn get_status(&self, job_id: &str) -> Result<RemoteStatus, CrawlServiceError>;

    async fn control(
        &self,
        job_id: &str,
        action: ControlAction,
    ) -> Result<ControlAck, CrawlServiceError>;

    async fn get_report(&self, job_id: &str) -> Result<SessionReport, CrawlServiceError>;

    async fn download_file(
        &self,
        job_id: &str,
        category: &str,
        filename: &str,
    ) -> Result<Bytes, CrawlServiceError>;
}
