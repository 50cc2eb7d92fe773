//! Crawl Orchestrator
//!
//! Local client-side mirror of crawl jobs that run on a remote crawl service.
//! Each job is tracked as a [`CrawlSession`] with its own identity, lifecycle
//! and progress counters. Sessions are persisted, observable, and reconciled
//! against the service on demand or on a schedule.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crawl_orchestrator::{CrawlOrchestrator, SessionStore, SqliteSessionRepository};
//! use crawl_service_client::CrawlServiceClient;
//!
//! let repository = SqliteSessionRepository::new("sqlite://crawls.db?mode=rwc").await?;
//! let store = Arc::new(SessionStore::new(Arc::new(repository)));
//! store.load().await?;
//!
//! let service = Arc::new(CrawlServiceClient::new("http://localhost:5000")?);
//! let orchestrator = CrawlOrchestrator::new(store, service);
//!
//! let session = orchestrator.create("https://example.com", 2, "./out").await?;
//! orchestrator.sync(session.id).await?;
//! ```
//!
//! # Modules
//!
//! - [`orchestrator`] - Creation, sync and control of crawl jobs
//! - [`retrieval`] - Reports and file downloads
//! - [`store`] - Observable session store and its persistence backends
//! - [`traits`] - The crawl service seam
//! - [`health`] - Per-session record of failed remote calls
//! - [`scheduler`] - Periodic background sync
//! - [`testing`] - Scripted crawl service for tests

pub mod config;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod retrieval;
pub mod scheduler;
pub mod service_client;
pub mod session;
pub mod status;
pub mod store;
pub mod testing;
pub mod traits;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result, StoreError};
pub use health::{SyncFailure, SyncFailureKind, SyncHealthBoard};
pub use orchestrator::{ControlOutcome, CrawlOrchestrator, SkipReason, SyncOutcome, SyncSummary};
pub use retrieval::CONTENT_CATEGORY;
pub use scheduler::start_sync_scheduler;
pub use session::{
    CrawlSession, JobIdentity, NewSession, ProgressUpdate, RemoteId, SessionId, SessionReport,
    StatusWrite,
};
pub use status::{normalize_remote_status, SessionStatus};
pub use store::{MemorySessionRepository, SessionRepository, SessionStore, SqliteSessionRepository};
pub use traits::{BaseCrawlService, CreatedJob, RemoteStatus};

pub use crawl_service_client::{ControlAction, CrawlServiceClient, CrawlServiceError};
