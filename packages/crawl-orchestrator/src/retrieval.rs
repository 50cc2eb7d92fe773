//! Report and file retrieval for crawl sessions.
//!
//! Read-only with respect to session state: failures are returned to the
//! caller and never touch the stored record.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::orchestrator::CrawlOrchestrator;
use crate::session::{SessionId, SessionReport};

/// Category holding extracted page content.
pub const CONTENT_CATEGORY: &str = "content";

impl CrawlOrchestrator {
    /// The categorized file listing of a session's crawl. No network call is
    /// made while the session has no remote id.
    pub async fn get_report(&self, id: SessionId) -> Result<SessionReport> {
        let session = self.session(id)?;
        let Some(remote_id) = session.remote_id() else {
            return Err(OrchestratorError::ReportUnavailable {
                id,
                reason: "remote id missing".to_string(),
            });
        };

        let report = self
            .service()
            .get_report(remote_id.as_str())
            .await
            .map_err(|e| OrchestratorError::ReportUnavailable {
                id,
                reason: e.to_string(),
            })?;

        debug!(session_id = %id, files = report.file_count(), "Fetched crawl report");
        Ok(report)
    }

    /// Download a file from the `content` category and decode it as UTF-8 text.
    pub async fn get_file_content(&self, id: SessionId, filename: &str) -> Result<String> {
        let bytes = self.fetch_file(id, CONTENT_CATEGORY, filename).await?;

        String::from_utf8(bytes.to_vec()).map_err(|e| OrchestratorError::FileFetchFailed {
            id,
            filename: filename.to_string(),
            reason: format!("not valid UTF-8 text: {e}"),
        })
    }

    /// Download a file into `<output_path>/<category>/<filename>` and return
    /// the written path.
    pub async fn download_artifact(
        &self,
        id: SessionId,
        category: &str,
        filename: &str,
    ) -> Result<PathBuf> {
        for part in [category, filename] {
            if !is_plain_file_name(part) {
                return Err(OrchestratorError::InvalidRequest(format!(
                    "{part} is not a plain file name"
                )));
            }
        }

        let session = self.session(id)?;
        let bytes = self.fetch_file(id, category, filename).await?;

        let dir = session.output_path.join(category);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;

        info!(session_id = %id, path = %path.display(), bytes = bytes.len(), "Saved crawl artifact");
        Ok(path)
    }

    async fn fetch_file(&self, id: SessionId, category: &str, filename: &str) -> Result<bytes::Bytes> {
        let session = self.session(id)?;
        let remote_id = session
            .remote_id()
            .ok_or(OrchestratorError::RemoteIdMissing(id))?;

        self.service()
            .download_file(remote_id.as_str(), category, filename)
            .await
            .map_err(|e| OrchestratorError::FileFetchFailed {
                id,
                filename: filename.to_string(),
                reason: e.to_string(),
            })
    }
}

/// A single normal path component: no separators, no `..`, not empty.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
