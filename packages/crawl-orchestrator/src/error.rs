//! Typed errors for the session store and the orchestrator.

use crawl_service_client::{ControlAction, CrawlServiceError};
use thiserror::Error;

use crate::session::{RemoteId, SessionId};

/// Errors raised by the session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The remote id is write-once.
    #[error("session {id} already attached to remote job {existing}, refusing {attempted}")]
    AlreadyAttached {
        id: SessionId,
        existing: RemoteId,
        attempted: RemoteId,
    },

    #[error("storage error: {0}")]
    Backend(#[from] sqlx::Error),

    /// A persisted row could not be turned back into a session.
    #[error("corrupt session row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Errors surfaced by orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The service answered the submission with a non-success status
    #[error("crawl submission rejected ({status}): {message}")]
    CreateFailed { status: u16, message: String },

    /// The service accepted the submission without assigning an id
    #[error("crawl service accepted the job but returned no crawl id")]
    CreateMissingId,

    /// Connection failure, timeout or unreadable response
    #[error("transport error during {operation}: {source}")]
    TransportError {
        operation: &'static str,
        #[source]
        source: CrawlServiceError,
    },

    #[error("status poll failed for session {id}: {source}")]
    SyncUnavailable {
        id: SessionId,
        #[source]
        source: CrawlServiceError,
    },

    #[error("{action} rejected for session {id}: {source}")]
    ControlRejected {
        id: SessionId,
        action: ControlAction,
        #[source]
        source: CrawlServiceError,
    },

    #[error("report unavailable for session {id}: {reason}")]
    ReportUnavailable { id: SessionId, reason: String },

    #[error("failed to fetch {filename} for session {id}: {reason}")]
    FileFetchFailed {
        id: SessionId,
        filename: String,
        reason: String,
    },

    #[error("session {0} has no remote crawl id yet")]
    RemoteIdMissing(SessionId),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("invalid crawl request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Classify a failed job submission.
    pub(crate) fn from_create(source: CrawlServiceError) -> Self {
        match source {
            CrawlServiceError::Api { status, message } => Self::CreateFailed { status, message },
            source => Self::TransportError {
                operation: "create",
                source,
            },
        }
    }

    /// Classify a failed status poll.
    pub(crate) fn from_sync(id: SessionId, source: CrawlServiceError) -> Self {
        if source.is_transport() {
            Self::TransportError {
                operation: "sync",
                source,
            }
        } else {
            Self::SyncUnavailable { id, source }
        }
    }

    /// Classify a failed control command.
    pub(crate) fn from_control(id: SessionId, action: ControlAction, source: CrawlServiceError) -> Self {
        if source.is_transport() {
            Self::TransportError {
                operation: action.as_str(),
                source,
            }
        } else {
            Self::ControlRejected { id, action, source }
        }
    }
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
