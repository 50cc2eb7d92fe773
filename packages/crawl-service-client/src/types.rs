use serde::{Deserialize, Deserializer, Serialize};

/// Form body for `POST /crawl`.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlRequest {
    pub url: String,
    pub depth: u32,
}

/// Response of `POST /crawl`.
///
/// The service is loosely typed: the id may be missing, null, empty or numeric.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCrawlResponse {
    #[serde(default)]
    crawl_id: Option<serde_json::Value>,
}

impl CreateCrawlResponse {
    /// The job id, if the service actually assigned one.
    pub fn crawl_id(&self) -> Option<String> {
        match self.crawl_id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Response of `GET /status/{crawl_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlStatusResponse {
    pub status: String,
    #[serde(default, alias = "pages_crawled", deserialize_with = "lenient_u64")]
    pub crawled: Option<u64>,
    #[serde(default, alias = "pages_total", deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
    #[serde(default, alias = "pages_queued", deserialize_with = "lenient_u64")]
    pub queued: Option<u64>,
    #[serde(default, alias = "currentUrl")]
    pub current_url: Option<String>,
}

/// Control command accepted by `POST /control/{crawl_id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Resume,
    Stop,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement body of a control command. Kept raw; the service
/// does not document its shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlAck(pub serde_json::Value);

/// Response of `GET /report/{crawl_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportResponse {
    #[serde(default)]
    pub files: ReportFiles,
}

/// File identifiers produced by a crawl, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFiles {
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Accepts `12`, `12.0`, `"12"` and `null`. Negative or garbage values become `None`.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_id_variants() {
        let parse = |raw: &str| serde_json::from_str::<CreateCrawlResponse>(raw).unwrap().crawl_id();

        assert_eq!(parse(r#"{"crawl_id": "abc123"}"#), Some("abc123".to_string()));
        assert_eq!(parse(r#"{"crawl_id": 42}"#), Some("42".to_string()));
        assert_eq!(parse(r#"{"crawl_id": ""}"#), None);
        assert_eq!(parse(r#"{"crawl_id": null}"#), None);
        assert_eq!(parse(r#"{"message": "accepted"}"#), None);
    }

    #[test]
    fn test_status_accepts_aliases_and_loose_numbers() {
        let status: CrawlStatusResponse = serde_json::from_str(
            r#"{"status": "Running", "pages_crawled": "5", "total": 50.0, "queued": -1, "currentUrl": "https://example.com/a"}"#,
        )
        .unwrap();

        assert_eq!(status.status, "Running");
        assert_eq!(status.crawled, Some(5));
        assert_eq!(status.total, Some(50));
        assert_eq!(status.queued, None);
        assert_eq!(status.current_url.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_report_missing_categories_default_empty() {
        let report: ReportResponse =
            serde_json::from_str(r#"{"files": {"content": ["index.md"]}}"#).unwrap();

        assert_eq!(report.files.content, vec!["index.md".to_string()]);
        assert!(report.files.images.is_empty());
        assert!(report.files.documents.is_empty());
    }
}
