//! Crawl session records as mirrored locally.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::SessionStatus;

/// Locally assigned session identity. Strictly increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

impl SessionId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(SessionId)
    }
}

/// Identity the crawl service assigned to a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the remote service has accepted the job yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remote_id", rename_all = "snake_case")]
pub enum JobIdentity {
    Unsubmitted,
    Submitted(RemoteId),
}

impl JobIdentity {
    pub fn remote_id(&self) -> Option<&RemoteId> {
        match self {
            Self::Unsubmitted => None,
            Self::Submitted(id) => Some(id),
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// One submitted crawl job as known locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSession {
    pub id: SessionId,
    pub identity: JobIdentity,
    pub start_url: String,
    pub depth: u32,
    pub status: SessionStatus,
    /// Bumped on every status write.
    pub status_version: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub pages_crawled: u64,
    pub pages_total: u64,
    pub pages_queued: u64,
    pub current_url: Option<String>,
    pub output_path: PathBuf,
}

impl CrawlSession {
    pub(crate) fn pending(id: SessionId, new: NewSession) -> Self {
        Self {
            id,
            identity: JobIdentity::Unsubmitted,
            start_url: new.start_url,
            depth: new.depth,
            status: SessionStatus::Pending,
            status_version: 0,
            start_time: new.start_time,
            end_time: None,
            pages_crawled: 0,
            pages_total: 0,
            pages_queued: 0,
            current_url: None,
            output_path: new.output_path,
        }
    }

    pub fn remote_id(&self) -> Option<&RemoteId> {
        self.identity.remote_id()
    }

    /// Apply a status write following the transition graph.
    ///
    /// `end_time` is stamped only on the first entry into a terminal status.
    pub(crate) fn apply_status(&mut self, next: SessionStatus, at: DateTime<Utc>) -> StatusWrite {
        if self.status == next {
            return StatusWrite::Unchanged;
        }
        if !self.status.can_transition_to(&next) {
            return StatusWrite::Rejected;
        }

        if next.is_terminal() && self.end_time.is_none() {
            self.end_time = Some(at);
        }
        self.status = next;
        self.status_version += 1;
        StatusWrite::Applied
    }
}

/// Parameters of a session that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub start_url: String,
    pub depth: u32,
    pub output_path: PathBuf,
    pub start_time: DateTime<Utc>,
}

/// Result of a status write against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Applied,
    /// Already had that status; nothing written.
    Unchanged,
    /// Terminal session or illegal edge; nothing written.
    Rejected,
    /// Another status write landed after the caller read the session.
    Stale,
}

/// Progress counters reported by the remote service. `None` fields keep
/// their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub crawled: Option<u64>,
    pub total: Option<u64>,
    pub queued: Option<u64>,
    pub current_url: Option<String>,
}

impl ProgressUpdate {
    pub fn is_empty(&self) -> bool {
        self.crawled.is_none()
            && self.total.is_none()
            && self.queued.is_none()
            && self.current_url.is_none()
    }

    /// Returns true if any stored value changed.
    pub(crate) fn apply_to(&self, session: &mut CrawlSession) -> bool {
        let before = (
            session.pages_crawled,
            session.pages_total,
            session.pages_queued,
            session.current_url.clone(),
        );

        if let Some(crawled) = self.crawled {
            session.pages_crawled = crawled;
        }
        if let Some(total) = self.total {
            session.pages_total = total;
        }
        if let Some(queued) = self.queued {
            session.pages_queued = queued;
        }
        if let Some(url) = &self.current_url {
            session.current_url = Some(url.clone());
        }

        before
            != (
                session.pages_crawled,
                session.pages_total,
                session.pages_queued,
                session.current_url.clone(),
            )
    }
}

/// Files a crawl produced, by category. Derived from the remote report,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub remote_id: RemoteId,
    pub content: Vec<String>,
    pub images: Vec<String>,
    pub documents: Vec<String>,
}

impl SessionReport {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.images.is_empty() && self.documents.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.content.len() + self.images.len() + self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_session() -> CrawlSession {
        let mut session = CrawlSession::pending(
            SessionId(1),
            NewSession {
                start_url: "https://example.com".into(),
                depth: 2,
                output_path: "/out".into(),
                start_time: Utc::now(),
            },
        );
        session.identity = JobIdentity::Submitted(RemoteId::new("abc123"));
        assert_eq!(session.apply_status(SessionStatus::Running, Utc::now()), StatusWrite::Applied);
        session
    }

    #[test]
    fn test_end_time_set_once_on_terminal_entry() {
        let mut session = running_session();
        assert!(session.end_time.is_none());

        let finished_at = Utc::now();
        assert_eq!(session.apply_status(SessionStatus::Completed, finished_at), StatusWrite::Applied);
        assert_eq!(session.end_time, Some(finished_at));

        let later = finished_at + chrono::Duration::seconds(30);
        assert_eq!(session.apply_status(SessionStatus::Completed, later), StatusWrite::Unchanged);
        assert_eq!(session.apply_status(SessionStatus::Running, later), StatusWrite::Rejected);
        assert_eq!(session.end_time, Some(finished_at));
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[test]
    fn test_status_version_bumps_only_on_applied_writes() {
        let mut session = running_session();
        let version = session.status_version;

        session.apply_status(SessionStatus::Running, Utc::now());
        assert_eq!(session.status_version, version);

        session.apply_status(SessionStatus::Paused, Utc::now());
        assert_eq!(session.status_version, version + 1);
    }

    #[test]
    fn test_progress_merges_only_reported_fields() {
        let mut session = running_session();
        session.pages_total = 50;

        let update = ProgressUpdate {
            crawled: Some(5),
            queued: Some(10),
            ..Default::default()
        };
        assert!(update.apply_to(&mut session));
        assert_eq!(
            (session.pages_crawled, session.pages_total, session.pages_queued),
            (5, 50, 10)
        );

        assert!(!update.apply_to(&mut session));
        assert!(ProgressUpdate::default().is_empty());
    }
}
