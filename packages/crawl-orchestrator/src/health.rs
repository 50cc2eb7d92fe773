//! Per-session connectivity signal.
//!
//! A failed poll or control command never touches a session's status. The
//! failure is recorded here instead so a UI can tell "remote unreachable"
//! apart from "remote agrees with the last known state".

use chrono::{DateTime, Utc};
use crawl_service_client::ControlAction;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::session::SessionId;

/// Which remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailureKind {
    StatusPoll,
    Control(ControlAction),
}

/// The last failed remote call for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub kind: SyncFailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Last-sync-error signal for every session. Not persisted.
#[derive(Default)]
pub struct SyncHealthBoard {
    entries: DashMap<SessionId, watch::Sender<Option<SyncFailure>>>,
}

impl SyncHealthBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&self, id: SessionId, kind: SyncFailureKind, message: impl Into<String>) {
        let failure = SyncFailure {
            kind,
            message: message.into(),
            at: Utc::now(),
        };
        self.entries
            .entry(id)
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(failure));
    }

    /// Clear the signal after a successful remote call. Observers are only
    /// notified if there was something to clear.
    pub fn clear(&self, id: SessionId) {
        if let Some(tx) = self.entries.get(&id) {
            tx.send_if_modified(|current| current.take().is_some());
        }
    }

    pub fn get(&self, id: SessionId) -> Option<SyncFailure> {
        self.entries
            .get(&id)
            .and_then(|tx| tx.value().borrow().clone())
    }

    pub fn observe(&self, id: SessionId) -> WatchStream<Option<SyncFailure>> {
        let rx = self
            .entries
            .entry(id)
            .or_insert_with(|| watch::channel(None).0)
            .subscribe();
        WatchStream::new(rx)
    }

    /// Clear every signal and drop the channels. Existing observers see a
    /// final `None`.
    pub fn reset(&self) {
        self.entries.retain(|_, entry| {
            entry.send_replace(None);
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        let board = SyncHealthBoard::new();
        let id = SessionId(1);
        assert!(board.get(id).is_none());

        board.record_failure(id, SyncFailureKind::StatusPoll, "connection refused");
        let failure = board.get(id).unwrap();
        assert_eq!(failure.kind, SyncFailureKind::StatusPoll);
        assert_eq!(failure.message, "connection refused");

        board.clear(id);
        assert!(board.get(id).is_none());
    }

    #[tokio::test]
    async fn test_reset_drops_entries() {
        use tokio_stream::StreamExt;

        let board = SyncHealthBoard::new();
        let id = SessionId(1);
        board.record_failure(id, SyncFailureKind::StatusPoll, "timed out");
        let mut updates = board.observe(id);
        assert!(updates.next().await.unwrap().is_some());

        board.reset();

        assert!(board.entries.is_empty());
        assert!(board.get(id).is_none());
        assert_eq!(updates.next().await, Some(None));
        assert_eq!(updates.next().await, None);
    }

    #[test]
    fn test_failures_are_per_session() {
        let board = SyncHealthBoard::new();
        board.record_failure(SessionId(1), SyncFailureKind::Control(ControlAction::Pause), "503");

        assert!(board.get(SessionId(1)).is_some());
        assert!(board.get(SessionId(2)).is_none());
    }
}
