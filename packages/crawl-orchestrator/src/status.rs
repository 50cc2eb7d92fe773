//! Local crawl session status and the mapping from remote status strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a crawl session as known locally.
///
/// `Unrecognized` keeps whatever label the remote service reported when it
/// is not one of the known values, upper-cased. It is not terminal: such
/// sessions stay in `sync_all` and keep being polled until the service
/// reports a known status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
    FailedStart,
    FailedNoId,
    Error(String),
    Unrecognized(String),
}

impl SessionStatus {
    /// Statuses from which no further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Stopped
                | Self::Completed
                | Self::Failed
                | Self::FailedStart
                | Self::FailedNoId
                | Self::Error(_)
        )
    }

    /// Persisted label, without detail.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::FailedStart => "FAILED_START",
            Self::FailedNoId => "FAILED_NO_ID",
            Self::Error(_) => "ERROR",
            Self::Unrecognized(_) => "UNRECOGNIZED",
        }
    }

    /// Error message or unrecognized label, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Error(detail) | Self::Unrecognized(detail) => Some(detail.as_str()),
            _ => None,
        }
    }

    /// Rebuild a status from its persisted label and detail.
    pub fn from_parts(label: &str, detail: Option<String>) -> Option<Self> {
        let status = match label {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "PAUSED" => Self::Paused,
            "STOPPED" => Self::Stopped,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "FAILED_START" => Self::FailedStart,
            "FAILED_NO_ID" => Self::FailedNoId,
            "ERROR" => Self::Error(detail.unwrap_or_default()),
            "UNRECOGNIZED" => Self::Unrecognized(detail.unwrap_or_default()),
            _ => return None,
        };
        Some(status)
    }

    /// Whether `next` is a legal edge from `self`. Same-value writes are not
    /// edges; callers treat them as no-ops.
    pub fn can_transition_to(&self, next: &SessionStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }

        match (self, next) {
            (Self::Pending, Self::Running)
            | (Self::Pending, Self::FailedStart)
            | (Self::Pending, Self::FailedNoId)
            | (Self::Pending, Self::Error(_)) => true,
            (Self::Pending, _) => false,
            // Creation outcomes only ever leave Pending.
            (_, Self::Pending)
            | (_, Self::FailedStart)
            | (_, Self::FailedNoId)
            | (_, Self::Error(_)) => false,
            // Running, Paused and Unrecognized move freely among the
            // remote-driven statuses.
            _ => true,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}({})", self.label(), detail),
            None => f.write_str(self.label()),
        }
    }
}

/// Map a remote status string onto the local enumeration, case-insensitively.
pub fn normalize_remote_status(raw: &str) -> SessionStatus {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "RUNNING" => SessionStatus::Running,
        "COMPLETED" => SessionStatus::Completed,
        "STOPPED" => SessionStatus::Stopped,
        "FAILED" => SessionStatus::Failed,
        "PAUSED" => SessionStatus::Paused,
        _ => SessionStatus::Unrecognized(upper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_is_case_insensitive() {
        for raw in ["completed", "Completed", "COMPLETED", "  completed\n"] {
            assert_eq!(normalize_remote_status(raw), SessionStatus::Completed);
        }
        assert_eq!(normalize_remote_status("Running"), SessionStatus::Running);
        assert_eq!(normalize_remote_status("stopped"), SessionStatus::Stopped);
        assert_eq!(normalize_remote_status("FAILED"), SessionStatus::Failed);
        assert_eq!(normalize_remote_status("paused"), SessionStatus::Paused);
    }

    #[test]
    fn test_unknown_status_kept_as_label() {
        assert_eq!(
            normalize_remote_status("queued_for_retry"),
            SessionStatus::Unrecognized("QUEUED_FOR_RETRY".to_string())
        );
    }

    #[test]
    fn test_terminal_statuses_have_no_outgoing_edges() {
        let terminal = [
            SessionStatus::Stopped,
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::FailedStart,
            SessionStatus::FailedNoId,
            SessionStatus::Error("boom".into()),
        ];
        for from in &terminal {
            assert!(from.is_terminal());
            assert!(!from.can_transition_to(&SessionStatus::Running));
            assert!(!from.can_transition_to(&SessionStatus::Completed));
        }
    }

    #[test]
    fn test_state_machine_edges() {
        use SessionStatus::*;

        assert!(Pending.can_transition_to(&Running));
        assert!(Pending.can_transition_to(&FailedNoId));
        assert!(Pending.can_transition_to(&Error("timeout".into())));
        assert!(!Pending.can_transition_to(&Paused));
        assert!(!Pending.can_transition_to(&Completed));

        assert!(Running.can_transition_to(&Paused));
        assert!(Running.can_transition_to(&Completed));
        assert!(Running.can_transition_to(&Unrecognized("QUEUED".into())));
        assert!(!Running.can_transition_to(&Running));
        assert!(!Running.can_transition_to(&FailedStart));

        assert!(Paused.can_transition_to(&Running));
        assert!(Paused.can_transition_to(&Stopped));
        assert!(Unrecognized("QUEUED".into()).can_transition_to(&Running));
        assert!(!Unrecognized("QUEUED".into()).is_terminal());
    }

    #[test]
    fn test_label_roundtrip_preserves_detail() {
        let status = SessionStatus::Error("connection refused".into());
        let restored =
            SessionStatus::from_parts(status.label(), status.detail().map(str::to_string));
        assert_eq!(restored, Some(status));
        assert_eq!(SessionStatus::from_parts("BOGUS", None), None);
    }
}
