//! Integration tests for session persistence across restarts.

use std::sync::Arc;

use crawl_orchestrator::testing::MockCrawlService;
use crawl_orchestrator::{
    CrawlOrchestrator, RemoteStatus, SessionRepository, SessionStatus, SessionStore,
    SqliteSessionRepository,
};

async fn open_store(database_url: &str) -> Arc<SessionStore> {
    let repository: Arc<dyn SessionRepository> =
        Arc::new(SqliteSessionRepository::new(database_url).await.unwrap());
    let store = Arc::new(SessionStore::new(repository));
    store.load().await.unwrap();
    store
}

#[tokio::test]
async fn test_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("crawls.db").display());

    let service = Arc::new(
        MockCrawlService::new()
            .with_created_job("abc123")
            .with_created_job_without_id()
            .with_status(
                "abc123",
                RemoteStatus::new("running")
                    .with_progress(5, 50, 10)
                    .with_current_url("https://example.com/docs"),
            ),
    );

    let (running, failed) = {
        let orchestrator = CrawlOrchestrator::new(open_store(&database_url).await, service.clone());
        let running = orchestrator
            .create("https://example.com", 2, "/out/a")
            .await
            .unwrap();
        orchestrator.sync(running.id).await.unwrap();
        orchestrator.pause(running.id).await.unwrap();
        let failed = orchestrator
            .create("https://example.org", 1, "/out/b")
            .await
            .unwrap();
        (orchestrator.get(running.id).unwrap(), failed)
    };

    let reopened = open_store(&database_url).await;

    let restored = reopened.get(running.id).unwrap();
    assert_eq!(restored, running);
    assert_eq!(restored.status, SessionStatus::Paused);
    assert_eq!(restored.pages_crawled, 5);
    assert_eq!(restored.current_url.as_deref(), Some("https://example.com/docs"));

    let restored_failed = reopened.get(failed.id).unwrap();
    assert_eq!(restored_failed.status, SessionStatus::FailedNoId);
    assert!(restored_failed.remote_id().is_none());
    assert_eq!(restored_failed.end_time, failed.end_time);

    // Newest first
    let ids: Vec<_> = reopened.snapshot().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![failed.id, running.id]);
}

#[tokio::test]
async fn test_error_detail_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("crawls.db").display());

    let service = Arc::new(MockCrawlService::new().with_create_error(
        crawl_orchestrator::CrawlServiceError::Network("connection refused".to_string()),
    ));
    let orchestrator = CrawlOrchestrator::new(open_store(&database_url).await, service);
    let session = orchestrator
        .create("https://example.com", 1, "/out")
        .await
        .unwrap();

    let reopened = open_store(&database_url).await;

    assert_eq!(reopened.get(session.id).unwrap().status, session.status);
    assert!(matches!(session.status, SessionStatus::Error(_)));
}

#[tokio::test]
async fn test_in_memory_database_round_trip() {
    let repository = Arc::new(SqliteSessionRepository::in_memory().await.unwrap());
    let store = Arc::new(SessionStore::new(repository.clone()));
    let orchestrator = CrawlOrchestrator::new(store, Arc::new(MockCrawlService::new()));

    let session = orchestrator
        .create("https://example.com", 3, "/out")
        .await
        .unwrap();
    orchestrator.stop(session.id).await.unwrap();

    let rows = repository.load_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], orchestrator.get(session.id).unwrap());
    assert_eq!(rows[0].status, SessionStatus::Stopped);

    orchestrator.clear_all().await.unwrap();
    assert!(repository.load_all().await.unwrap().is_empty());
}
