//! Background polling using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (every sync interval)
//!     │
//!     └─► sync_all()
//!             └─► For each non-terminal session → get_status → store
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::orchestrator::CrawlOrchestrator;

/// Start periodic syncing of all non-terminal sessions. Failures are logged
/// per tick and never stop the scheduler.
pub async fn start_sync_scheduler(
    orchestrator: Arc<CrawlOrchestrator>,
    interval: Duration,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sync_job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            let summary = orchestrator.sync_all().await;
            if summary.failed.is_empty() {
                tracing::debug!(
                    synced = summary.synced,
                    skipped = summary.skipped,
                    "Periodic sync complete"
                );
            } else {
                tracing::warn!(
                    synced = summary.synced,
                    failed = ?summary.failed,
                    "Periodic sync could not reach some crawl jobs"
                );
            }
        })
    })?;

    scheduler.add(sync_job).await?;
    scheduler.start().await?;

    tracing::info!(interval_secs = interval.as_secs(), "Crawl sync scheduler started");
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SessionStatus;
    use crate::store::{MemorySessionRepository, SessionStore};
    use crate::testing::MockCrawlService;
    use crate::traits::RemoteStatus;
    use tokio_stream::StreamExt;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_syncs_active_sessions() {
        let store = Arc::new(SessionStore::new(Arc::new(MemorySessionRepository::new())));
        let service = Arc::new(
            MockCrawlService::new().with_status("job-1", RemoteStatus::new("completed")),
        );
        let orchestrator = Arc::new(CrawlOrchestrator::new(store, service));
        let session = orchestrator
            .create("https://example.com", 1, "/out")
            .await
            .unwrap();

        let mut scheduler = start_sync_scheduler(orchestrator.clone(), Duration::from_secs(1))
            .await
            .unwrap();

        let mut updates = orchestrator.store().observe(session.id);
        let completed = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(Some(current)) = updates.next().await {
                if current.status == SessionStatus::Completed {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);

        scheduler.shutdown().await.unwrap();
        assert!(completed);
    }
}
