//! Testing utilities including a scripted crawl service.
//!
//! Useful for exercising the orchestrator without a running crawl service.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use crawl_service_client::{ControlAck, ControlAction, CrawlServiceError};
use tokio::sync::Notify;

use crate::session::{RemoteId, SessionReport};
use crate::traits::{BaseCrawlService, CreatedJob, RemoteStatus};

/// Record of a call made to the mock service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateJob { url: String, depth: u32 },
    GetStatus { job_id: String },
    Control { job_id: String, action: ControlAction },
    GetReport { job_id: String },
    DownloadFile { job_id: String, category: String, filename: String },
}

/// Holds a remote call until the test releases it.
///
/// `entered` is notified when the call arrives; the call then waits on
/// `release`.
#[derive(Default)]
pub struct CallGate {
    pub entered: Notify,
    pub release: Notify,
}

impl CallGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

type StatusReply = Result<RemoteStatus, CrawlServiceError>;

/// Queued status replies for one job plus the last one served.
#[derive(Default)]
struct StatusScript {
    queued: VecDeque<StatusReply>,
    last: Option<StatusReply>,
}

impl StatusScript {
    fn next(&mut self) -> Option<StatusReply> {
        if let Some(reply) = self.queued.pop_front() {
            let repeat = match &reply {
                Ok(status) => Ok(status.clone()),
                Err(e) => Err(duplicate_error(e)),
            };
            self.last = Some(repeat);
            return Some(reply);
        }
        self.last.as_ref().map(|reply| match reply {
            Ok(status) => Ok(status.clone()),
            Err(e) => Err(duplicate_error(e)),
        })
    }
}

/// A scripted crawl service.
///
/// Queued replies are consumed in order. Status replies are per job; once a
/// job's queue runs dry its last reply keeps repeating. Unscripted calls get defaults:
/// `create_job` assigns `job-1`, `job-2`, ...; `control` acknowledges;
/// everything else fails with a 404.
#[derive(Default)]
pub struct MockCrawlService {
    create_replies: Mutex<VecDeque<Result<CreatedJob, CrawlServiceError>>>,
    status_replies: Mutex<HashMap<String, StatusScript>>,
    control_failures: Mutex<HashMap<ControlAction, CrawlServiceError>>,
    reports: Mutex<HashMap<String, SessionReport>>,
    files: Mutex<HashMap<(String, String, String), Bytes>>,
    create_gate: Mutex<Option<Arc<CallGate>>>,
    status_gate: Mutex<Option<Arc<CallGate>>>,
    calls: Mutex<Vec<MockCall>>,
    next_job: Mutex<u64>,
}

impl MockCrawlService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful submission with the given id.
    pub fn with_created_job(self, job_id: &str) -> Self {
        self.push_create(Ok(CreatedJob {
            job_id: Some(job_id.to_string()),
        }))
    }

    /// Queue a successful submission that carries no id.
    pub fn with_created_job_without_id(self) -> Self {
        self.push_create(Ok(CreatedJob { job_id: None }))
    }

    /// Queue a failed submission.
    pub fn with_create_error(self, error: CrawlServiceError) -> Self {
        self.push_create(Err(error))
    }

    /// Queue a status reply for a job.
    pub fn with_status(self, job_id: &str, status: RemoteStatus) -> Self {
        self.push_status(job_id, Ok(status));
        self
    }

    /// Queue a failed status poll for a job.
    pub fn with_status_error(self, job_id: &str, error: CrawlServiceError) -> Self {
        self.push_status(job_id, Err(error));
        self
    }

    /// Make every `action` command fail.
    pub fn with_control_error(self, action: ControlAction, error: CrawlServiceError) -> Self {
        self.control_failures.lock().unwrap().insert(action, error);
        self
    }

    pub fn with_report(self, job_id: &str, content: &[&str], images: &[&str], documents: &[&str]) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        self.reports.lock().unwrap().insert(
            job_id.to_string(),
            SessionReport {
                remote_id: RemoteId::new(job_id),
                content: owned(content),
                images: owned(images),
                documents: owned(documents),
            },
        );
        self
    }

    pub fn with_file(self, job_id: &str, category: &str, filename: &str, body: impl Into<Bytes>) -> Self {
        self.files.lock().unwrap().insert(
            (job_id.to_string(), category.to_string(), filename.to_string()),
            body.into(),
        );
        self
    }

    /// Hold every `create_job` call on `gate`.
    pub fn with_create_gate(self, gate: Arc<CallGate>) -> Self {
        *self.create_gate.lock().unwrap() = Some(gate);
        self
    }

    /// Hold every `get_status` call on `gate`.
    pub fn with_status_gate(self, gate: Arc<CallGate>) -> Self {
        *self.status_gate.lock().unwrap() = Some(gate);
        self
    }

    /// Queue another status reply after construction.
    pub fn push_status(&self, job_id: &str, reply: Result<RemoteStatus, CrawlServiceError>) {
        self.status_replies
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .queued
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::GetStatus { job_id: id } if id == job_id))
            .count()
    }

    fn push_create(self, reply: Result<CreatedJob, CrawlServiceError>) -> Self {
        self.create_replies.lock().unwrap().push_back(reply);
        self
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pass_gate(gate: Option<Arc<CallGate>>) {
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

/// Errors are not `Clone`; repeating replies rebuild them.
fn duplicate_error(error: &CrawlServiceError) -> CrawlServiceError {
    match error {
        CrawlServiceError::Api { status, message } => CrawlServiceError::Api {
            status: *status,
            message: message.clone(),
        },
        CrawlServiceError::Network(m) => CrawlServiceError::Network(m.clone()),
        CrawlServiceError::Parse(m) => CrawlServiceError::Parse(m.clone()),
        CrawlServiceError::InvalidUrl(m) => CrawlServiceError::InvalidUrl(m.clone()),
    }
}

fn not_found(what: &str) -> CrawlServiceError {
    CrawlServiceError::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl BaseCrawlService for MockCrawlService {
    async fn create_job(&self, url: &str, depth: u32) -> Result<CreatedJob, CrawlServiceError> {
        self.record(MockCall::CreateJob {
            url: url.to_string(),
            depth,
        });

        let gate = self.create_gate.lock().unwrap().clone();
        Self::pass_gate(gate).await;

        if let Some(reply) = self.create_replies.lock().unwrap().pop_front() {
            return reply;
        }

        let mut next = self.next_job.lock().unwrap();
        *next += 1;
        Ok(CreatedJob {
            job_id: Some(format!("job-{}", *next)),
        })
    }

    async fn get_status(&self, job_id: &str) -> Result<RemoteStatus, CrawlServiceError> {
        self.record(MockCall::GetStatus {
            job_id: job_id.to_string(),
        });

        let gate = self.status_gate.lock().unwrap().clone();
        Self::pass_gate(gate).await;

        self.status_replies
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(StatusScript::next)
            .unwrap_or_else(|| Err(not_found("crawl")))
    }

    async fn control(
        &self,
        job_id: &str,
        action: ControlAction,
    ) -> Result<ControlAck, CrawlServiceError> {
        self.record(MockCall::Control {
            job_id: job_id.to_string(),
            action,
        });

        if let Some(error) = self.control_failures.lock().unwrap().get(&action) {
            return Err(duplicate_error(error));
        }
        Ok(ControlAck(serde_json::json!({ "crawl_id": job_id, "action": action.as_str() })))
    }

    async fn get_report(&self, job_id: &str) -> Result<SessionReport, CrawlServiceError> {
        self.record(MockCall::GetReport {
            job_id: job_id.to_string(),
        });

        self.reports
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| not_found("report"))
    }

    async fn download_file(
        &self,
        job_id: &str,
        category: &str,
        filename: &str,
    ) -> Result<Bytes, CrawlServiceError> {
        self.record(MockCall::DownloadFile {
            job_id: job_id.to_string(),
            category: category.to_string(),
            filename: filename.to_string(),
        });

        self.files
            .lock()
            .unwrap()
            .get(&(job_id.to_string(), category.to_string(), filename.to_string()))
            .cloned()
            .ok_or_else(|| not_found("file"))
    }
}
