use async_trait::async_trait;
use bytes::Bytes;
use crawl_service_client::{ControlAck, ControlAction, CrawlServiceClient, CrawlServiceError};

use crate::session::{RemoteId, SessionReport};
use crate::traits::{BaseCrawlService, CreatedJob, RemoteStatus};

/// HTTP crawl service implementation of BaseCrawlService
#[async_trait]
impl BaseCrawlService for CrawlServiceClient {
    async fn create_job(&self, url: &str, depth: u32) -> Result<CreatedJob, CrawlServiceError> {
        let created = self.create_crawl(url, depth).await?;
        Ok(CreatedJob {
            job_id: created.crawl_id(),
        })
    }

    async fn get_status(&self, job_id: &str) -> Result<RemoteStatus, CrawlServiceError> {
        let status = CrawlServiceClient::get_status(self, job_id).await?;
        Ok(RemoteStatus {
            raw_status: status.status,
            crawled: status.crawled,
            total: status.total,
            queued: status.queued,
            current_url: status.current_url,
        })
    }

    async fn control(
        &self,
        job_id: &str,
        action: ControlAction,
    ) -> Result<ControlAck, CrawlServiceError> {
        CrawlServiceClient::control(self, job_id, action).await
    }

    async fn get_report(&self, job_id: &str) -> Result<SessionReport, CrawlServiceError> {
        let files = CrawlServiceClient::get_report(self, job_id).await?;
        Ok(SessionReport {
            remote_id: RemoteId::new(job_id),
            content: files.content,
            images: files.images,
            documents: files.documents,
        })
    }

    async fn download_file(
        &self,
        job_id: &str,
        category: &str,
        filename: &str,
    ) -> Result<Bytes, CrawlServiceError> {
        CrawlServiceClient::download_file(self, job_id, category, filename).await
    }
}
