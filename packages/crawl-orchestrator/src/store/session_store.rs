//! Observable session store.
//!
//! Every mutation goes through one commit path: the backend write happens
//! first, then the in-memory index and the watch channels are updated, all
//! before the mutating call returns.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = SessionStore::new(Arc::new(MemorySessionRepository::new()));
//! let mut sessions = store.list();
//! let id = store.create_pending("https://example.com", 2, "/out".into()).await?;
//! while let Some(snapshot) = sessions.next().await { /* render */ }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use super::SessionRepository;
use crate::error::StoreError;
use crate::session::{
    CrawlSession, JobIdentity, NewSession, ProgressUpdate, RemoteId, SessionId, StatusWrite,
};
use crate::status::SessionStatus;

/// Persisted, observable record of each crawl session.
///
/// Observers see the latest committed value; intermediate values may be
/// coalesced if an observer falls behind.
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
    sessions: Mutex<BTreeMap<SessionId, CrawlSession>>,
    watchers: DashMap<SessionId, watch::Sender<Option<CrawlSession>>>,
    list_tx: watch::Sender<Vec<CrawlSession>>,
    submitting: DashMap<SessionId, ()>,
}

/// Marks a session as being submitted; released on drop.
pub(crate) struct SubmissionClaim<'a> {
    submitting: &'a DashMap<SessionId, ()>,
    id: SessionId,
}

impl Drop for SubmissionClaim<'_> {
    fn drop(&mut self) {
        self.submitting.remove(&self.id);
    }
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            repository,
            sessions: Mutex::new(BTreeMap::new()),
            watchers: DashMap::new(),
            list_tx: watch::channel(Vec::new()).0,
            submitting: DashMap::new(),
        }
    }

    /// Warm the in-memory index from the backend. Call once at startup.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let loaded = self.repository.load_all().await?;

        sessions.clear();
        for session in loaded {
            self.publish_session(&session);
            sessions.insert(session.id, session);
        }
        self.publish_list(&sessions);

        debug!(count = sessions.len(), "Loaded crawl sessions");
        Ok(sessions.len())
    }

    /// Insert a new `Pending`, unsubmitted session.
    pub async fn create_pending(
        &self,
        start_url: &str,
        depth: u32,
        output_path: PathBuf,
    ) -> Result<SessionId, StoreError> {
        let new = NewSession {
            start_url: start_url.to_string(),
            depth,
            output_path,
            start_time: Utc::now(),
        };

        let mut sessions = self.sessions.lock().await;
        let id = self.repository.insert(&new).await?;
        let session = CrawlSession::pending(id, new);

        self.publish_session(&session);
        sessions.insert(id, session);
        self.publish_list(&sessions);

        debug!(session_id = %id, start_url, depth, "Created pending crawl session");
        Ok(id)
    }

    /// Attach the remote job id. Repeating the same id is a no-op; a
    /// different id fails and leaves the stored one untouched.
    pub async fn attach_remote_id(&self, id: SessionId, remote_id: RemoteId) -> Result<(), StoreError> {
        self.mutate(id, |session| {
            if let JobIdentity::Submitted(existing) = &session.identity {
                if *existing == remote_id {
                    return Ok(((), false));
                }
                return Err(StoreError::AlreadyAttached {
                    id,
                    existing: existing.clone(),
                    attempted: remote_id,
                });
            }
            session.identity = JobIdentity::Submitted(remote_id);
            Ok(((), true))
        })
        .await
    }

    /// Write a status following the transition graph. `at` becomes the
    /// session's `end_time` on first entry into a terminal status.
    pub async fn set_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusWrite, StoreError> {
        self.mutate(id, |session| {
            let write = session.apply_status(status, at);
            Ok((write, write == StatusWrite::Applied))
        })
        .await
    }

    /// Like [`Self::set_status`], but only if no status write has landed
    /// since the caller observed `expected_version`.
    pub async fn set_status_if_version(
        &self,
        id: SessionId,
        status: SessionStatus,
        expected_version: u64,
        at: DateTime<Utc>,
    ) -> Result<StatusWrite, StoreError> {
        self.mutate(id, |session| {
            if session.status_version != expected_version {
                return Ok((StatusWrite::Stale, false));
            }
            let write = session.apply_status(status, at);
            Ok((write, write == StatusWrite::Applied))
        })
        .await
    }

    /// Merge reported progress counters. Returns true if anything changed.
    pub async fn update_progress(
        &self,
        id: SessionId,
        progress: ProgressUpdate,
    ) -> Result<bool, StoreError> {
        if progress.is_empty() {
            return Ok(false);
        }

        self.mutate(id, |session| {
            let changed = progress.apply_to(session);
            Ok((changed, changed))
        })
        .await
    }

    /// Claim the right to submit a session. `None` while another claim on
    /// the same id is held.
    pub(crate) fn claim_submission(&self, id: SessionId) -> Option<SubmissionClaim<'_>> {
        match self.submitting.entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(SubmissionClaim {
                    submitting: &self.submitting,
                    id,
                })
            }
        }
    }

    pub fn get(&self, id: SessionId) -> Option<CrawlSession> {
        self.watchers
            .get(&id)
            .and_then(|tx| tx.value().borrow().clone())
    }

    /// Stream of one session: the current value, then every committed change.
    /// An unknown id yields a single `None` and ends. `clear_all` sends `None`
    /// to existing observers and ends their streams.
    pub fn observe(&self, id: SessionId) -> WatchStream<Option<CrawlSession>> {
        match self.watchers.get(&id) {
            Some(tx) => WatchStream::new(tx.subscribe()),
            None => WatchStream::new(watch::channel(None).1),
        }
    }

    /// Stream of all sessions, newest first.
    pub fn list(&self) -> WatchStream<Vec<CrawlSession>> {
        WatchStream::new(self.list_tx.subscribe())
    }

    /// All sessions, newest first.
    pub fn snapshot(&self) -> Vec<CrawlSession> {
        self.list_tx.borrow().clone()
    }

    /// Remove every session.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        self.repository.clear().await?;

        sessions.clear();
        self.watchers.retain(|_, watcher| {
            watcher.send_replace(None);
            false
        });
        self.publish_list(&sessions);

        debug!("Cleared all crawl sessions");
        Ok(())
    }

    /// The single commit path. `apply` edits a copy and reports whether it
    /// changed anything; unchanged copies are never written.
    async fn mutate<T, F>(&self, id: SessionId, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut CrawlSession) -> Result<(T, bool), StoreError>,
    {
        let mut sessions = self.sessions.lock().await;
        let mut next = sessions.get(&id).cloned().ok_or(StoreError::NotFound(id))?;

        let (output, changed) = apply(&mut next)?;
        if !changed {
            return Ok(output);
        }

        self.repository.save(&next).await?;
        self.publish_session(&next);
        sessions.insert(id, next);
        self.publish_list(&sessions);

        Ok(output)
    }

    fn publish_session(&self, session: &CrawlSession) {
        self.watchers
            .entry(session.id)
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(session.clone()));
    }

    fn publish_list(&self, sessions: &BTreeMap<SessionId, CrawlSession>) {
        let mut ordered: Vec<CrawlSession> = sessions.values().cloned().collect();
        ordered.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        self.list_tx.send_replace(ordered);
    }
}
