//! Crawl job orchestration.
//!
//! Owns the session state machine and reconciles the local mirror against
//! the remote service. Two independent triggers drive status changes:
//!
//! ```text
//! create() ──► store (Pending) ──► service.create_job ──► Running | FailedStart | FailedNoId | Error
//!
//! sync()   ──► service.get_status ──► normalize ──► store (versioned write) + progress
//!
//! pause/resume/stop ──► service.control ──► store (optimistic write)
//! ```
//!
//! A poll that was in flight while a control command landed is discarded:
//! `sync` commits with the status version it read before calling out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crawl_service_client::ControlAction;
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{OrchestratorError, Result};
use crate::health::{SyncFailure, SyncFailureKind, SyncHealthBoard};
use crate::session::{CrawlSession, RemoteId, SessionId, StatusWrite};
use crate::status::{normalize_remote_status, SessionStatus};
use crate::store::SessionStore;
use crate::traits::{BaseCrawlService, CreatedJob};

const DEFAULT_SYNC_CONCURRENCY: usize = 4;

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote service has not accepted the job yet.
    NoRemoteId,
    /// The session already reached a terminal status.
    Terminal,
    /// The local status does not allow this command.
    NotApplicable,
}

/// Result of syncing one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Synced {
        status: StatusWrite,
        progress_updated: bool,
    },
}

/// Result of a pause/resume/stop command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Skipped(SkipReason),
    /// The service acknowledged; the optimistic status write is reported.
    Acknowledged(StatusWrite),
}

/// Tally of a batch sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: Vec<SessionId>,
}

/// Local client for remotely executed crawl jobs.
pub struct CrawlOrchestrator {
    store: Arc<SessionStore>,
    service: Arc<dyn BaseCrawlService>,
    health: SyncHealthBoard,
    sync_concurrency: usize,
}

impl CrawlOrchestrator {
    pub fn new(store: Arc<SessionStore>, service: Arc<dyn BaseCrawlService>) -> Self {
        Self {
            store,
            service,
            health: SyncHealthBoard::new(),
            sync_concurrency: DEFAULT_SYNC_CONCURRENCY,
        }
    }

    /// Upper bound on concurrent status polls in [`Self::sync_all`].
    pub fn with_sync_concurrency(mut self, limit: usize) -> Self {
        self.sync_concurrency = limit.max(1);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a session and submit it, returning the resulting record.
    ///
    /// Submission failures are recorded in the session's status, not
    /// returned. Only invalid input and store failures are errors.
    pub async fn create(
        &self,
        url: &str,
        depth: u32,
        output_path: impl Into<PathBuf>,
    ) -> Result<CrawlSession> {
        let id = self.create_pending(url, depth, output_path.into()).await?;
        self.submit(id).await
    }

    /// Create a session and submit it in the background. Returns as soon as
    /// the `Pending` record is stored.
    pub async fn create_detached(
        self: &Arc<Self>,
        url: &str,
        depth: u32,
        output_path: impl Into<PathBuf>,
    ) -> Result<SessionId> {
        let id = self.create_pending(url, depth, output_path.into()).await?;

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.submit(id).await {
                error!(session_id = %id, error = %e, "Background crawl submission failed");
            }
        });

        Ok(id)
    }

    /// Wait until a session leaves `Pending`. Returns `None` if it is still
    /// pending after `timeout` or no longer exists.
    pub async fn wait_for_submission(
        &self,
        id: SessionId,
        timeout: Duration,
    ) -> Option<CrawlSession> {
        let mut updates = self.store.observe(id);
        let settled = async {
            while let Some(Some(session)) = updates.next().await {
                if session.status != SessionStatus::Pending {
                    return Some(session);
                }
            }
            None
        };

        match tokio::time::timeout(timeout, settled).await {
            Ok(session) => session,
            Err(_) => {
                warn!(session_id = %id, ?timeout, "Session still pending");
                None
            }
        }
    }

    async fn create_pending(&self, url: &str, depth: u32, output_path: PathBuf) -> Result<SessionId> {
        let url = url.trim();
        validate_start_url(url)?;
        Ok(self.store.create_pending(url, depth, output_path).await?)
    }

    /// Submit a pending session to the remote service and record the outcome.
    /// Sessions that are no longer pending, or whose submission is already in
    /// flight, are returned unchanged.
    pub async fn submit(&self, id: SessionId) -> Result<CrawlSession> {
        let Some(_claim) = self.store.claim_submission(id) else {
            debug!(session_id = %id, "Submission already in flight");
            return self.session(id);
        };

        let session = self.session(id)?;
        if session.status != SessionStatus::Pending || session.identity.is_submitted() {
            debug!(session_id = %id, status = %session.status, "Session already submitted");
            return Ok(session);
        }

        let result = self
            .service
            .create_job(&session.start_url, session.depth)
            .await
            .map_err(OrchestratorError::from_create)
            .and_then(|CreatedJob { job_id }| job_id.ok_or(OrchestratorError::CreateMissingId));

        match result {
            Ok(job_id) => {
                let remote_id = RemoteId::new(job_id);
                self.store.attach_remote_id(id, remote_id.clone()).await?;
                self.store
                    .set_status(id, SessionStatus::Running, Utc::now())
                    .await?;
                info!(session_id = %id, remote_id = %remote_id, "Crawl job started");
            }
            Err(err) => {
                let status = creation_failure_status(&err);
                warn!(session_id = %id, status = %status.label(), error = %err, "Crawl job failed to start");
                self.store.set_status(id, status, Utc::now()).await?;
            }
        }

        self.session(id)
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Poll the remote status of one session and fold it into the mirror.
    ///
    /// On failure nothing local changes; the error is returned and recorded
    /// in the session's sync health.
    pub async fn sync(&self, id: SessionId) -> Result<SyncOutcome> {
        let session = self.session(id)?;
        let Some(remote_id) = session.remote_id().cloned() else {
            debug!(session_id = %id, "Skipping sync, no remote id");
            return Ok(SyncOutcome::Skipped(SkipReason::NoRemoteId));
        };
        if session.status.is_terminal() {
            debug!(session_id = %id, status = %session.status, "Skipping sync, terminal");
            return Ok(SyncOutcome::Skipped(SkipReason::Terminal));
        }

        let observed_version = session.status_version;
        let remote = match self.service.get_status(remote_id.as_str()).await {
            Ok(remote) => remote,
            Err(source) => {
                warn!(session_id = %id, remote_id = %remote_id, error = %source, "Status poll failed, keeping last known state");
                self.health
                    .record_failure(id, SyncFailureKind::StatusPoll, source.to_string());
                return Err(OrchestratorError::from_sync(id, source));
            }
        };

        let status = normalize_remote_status(&remote.raw_status);
        let status_write = if status == session.status {
            StatusWrite::Unchanged
        } else {
            self.store
                .set_status_if_version(id, status.clone(), observed_version, Utc::now())
                .await?
        };

        match status_write {
            StatusWrite::Applied => {
                info!(session_id = %id, from = %session.status, to = %status, "Crawl status changed")
            }
            StatusWrite::Stale => {
                debug!(session_id = %id, reported = %status, "Discarding stale poll status")
            }
            StatusWrite::Rejected => {
                warn!(session_id = %id, from = %session.status, reported = %status, "Ignoring disallowed status transition")
            }
            StatusWrite::Unchanged => {}
        }

        let progress_updated = self.store.update_progress(id, remote.progress()).await?;
        self.health.clear(id);

        Ok(SyncOutcome::Synced {
            status: status_write,
            progress_updated,
        })
    }

    /// Sync every non-terminal session, a bounded number at a time.
    pub async fn sync_all(&self) -> SyncSummary {
        let candidates: Vec<SessionId> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|s| !s.status.is_terminal() && s.identity.is_submitted())
            .map(|s| s.id)
            .collect();

        let results: Vec<(SessionId, Result<SyncOutcome>)> = stream::iter(candidates)
            .map(|id| async move { (id, self.sync(id).await) })
            .buffer_unordered(self.sync_concurrency)
            .collect()
            .await;

        let mut summary = SyncSummary::default();
        for (id, result) in results {
            match result {
                Ok(SyncOutcome::Synced { .. }) => summary.synced += 1,
                Ok(SyncOutcome::Skipped(_)) => summary.skipped += 1,
                Err(e) => {
                    debug!(session_id = %id, error = %e, "Session sync failed");
                    summary.failed.push(id);
                }
            }
        }
        summary.failed.sort();

        debug!(
            synced = summary.synced,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "Batch sync finished"
        );
        summary
    }

    // =========================================================================
    // Control
    // =========================================================================

    pub async fn pause(&self, id: SessionId) -> Result<ControlOutcome> {
        self.control(id, ControlAction::Pause).await
    }

    pub async fn resume(&self, id: SessionId) -> Result<ControlOutcome> {
        self.control(id, ControlAction::Resume).await
    }

    pub async fn stop(&self, id: SessionId) -> Result<ControlOutcome> {
        self.control(id, ControlAction::Stop).await
    }

    /// Send a control command and apply its status optimistically once the
    /// service acknowledges. No remote call is made when the session has no
    /// remote id or its status does not allow the command.
    pub async fn control(&self, id: SessionId, action: ControlAction) -> Result<ControlOutcome> {
        let session = self.session(id)?;
        let Some(remote_id) = session.remote_id().cloned() else {
            debug!(session_id = %id, %action, "Skipping control, no remote id");
            return Ok(ControlOutcome::Skipped(SkipReason::NoRemoteId));
        };

        let target = control_target(action);
        if !session.status.can_transition_to(&target) {
            let reason = if session.status.is_terminal() {
                SkipReason::Terminal
            } else {
                SkipReason::NotApplicable
            };
            debug!(session_id = %id, %action, status = %session.status, "Skipping control");
            return Ok(ControlOutcome::Skipped(reason));
        }

        if let Err(source) = self.service.control(remote_id.as_str(), action).await {
            warn!(session_id = %id, remote_id = %remote_id, %action, error = %source, "Control command failed, keeping last known state");
            self.health
                .record_failure(id, SyncFailureKind::Control(action), source.to_string());
            return Err(OrchestratorError::from_control(id, action, source));
        }

        let write = self.store.set_status(id, target, Utc::now()).await?;
        self.health.clear(id);
        info!(session_id = %id, remote_id = %remote_id, %action, ?write, "Control command applied");

        Ok(ControlOutcome::Acknowledged(write))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn get(&self, id: SessionId) -> Option<CrawlSession> {
        self.store.get(id)
    }

    /// Last failed remote call for a session, cleared by the next success.
    pub fn sync_health(&self, id: SessionId) -> Option<SyncFailure> {
        self.health.get(id)
    }

    /// Stream of a session's sync health. An unknown id yields a single
    /// `None` and ends.
    pub fn observe_sync_health(&self, id: SessionId) -> WatchStream<Option<SyncFailure>> {
        if self.store.get(id).is_none() {
            return WatchStream::new(tokio::sync::watch::channel(None).1);
        }
        self.health.observe(id)
    }

    /// Remove every session from the local mirror. Remote jobs are untouched.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear_all().await?;
        self.health.reset();
        info!("Cleared all crawl sessions");
        Ok(())
    }

    pub(crate) fn session(&self, id: SessionId) -> Result<CrawlSession> {
        self.store
            .get(id)
            .ok_or(OrchestratorError::SessionNotFound(id))
    }

    pub(crate) fn service(&self) -> &dyn BaseCrawlService {
        self.service.as_ref()
    }
}

fn validate_start_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw.trim())
        .map_err(|e| OrchestratorError::InvalidRequest(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(OrchestratorError::InvalidRequest(format!(
            "unsupported URL scheme {scheme}"
        ))),
    }
}

fn control_target(action: ControlAction) -> SessionStatus {
    match action {
        ControlAction::Pause => SessionStatus::Paused,
        ControlAction::Resume => SessionStatus::Running,
        ControlAction::Stop => SessionStatus::Stopped,
    }
}

/// Terminal status recorded for a failed submission.
fn creation_failure_status(err: &OrchestratorError) -> SessionStatus {
    match err {
        OrchestratorError::CreateFailed { .. } => SessionStatus::FailedStart,
        OrchestratorError::CreateMissingId => SessionStatus::FailedNoId,
        OrchestratorError::TransportError { source, .. } => SessionStatus::Error(source.to_string()),
        other => SessionStatus::Error(other.to_string()),
    }
}
