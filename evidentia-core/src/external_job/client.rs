//! Start and poll requests against the external job API.

use super::{ExternalJobStatus, JobState};
use crate::error::JobError;
use crate::http::{HttpReply, HttpTransport};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Remote job API.
#[async_trait]
pub trait ExternalJobClient: Send + Sync {
    /// Submit `query` as a background job and return its id.
    async fn start(&self, api_key: &str, query: &str) -> Result<String, JobError>;

    /// Fetch the current status of a job.
    async fn poll(&self, api_key: &str, job_id: &str) -> Result<ExternalJobStatus, JobError>;
}

/// JSON-over-HTTP job client: `POST {base}` to start, `GET {base}/{id}` to poll.
pub struct HttpJobClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    model: Option<String>,
}

impl HttpJobClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>, model: Option<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
        }
    }

    fn start_body(&self, query: &str) -> Value {
        let mut body = json!({
            "input": query,
            "background": true,
        });
        if let Some(model) = &self.model {
            body["model"] = json!(model);
        }
        body
    }
}

fn transport_error(e: crate::http::TransportError) -> JobError {
    JobError::Transport {
        message: e.to_string(),
    }
}

fn parse_body(reply: &HttpReply) -> Result<Value, JobError> {
    reply.json().map_err(|e| JobError::ResponseParse {
        message: format!("Invalid JSON: {e}"),
    })
}

#[async_trait]
impl ExternalJobClient for HttpJobClient {
    async fn start(&self, api_key: &str, query: &str) -> Result<String, JobError> {
        let auth = format!("Bearer {api_key}");
        let reply = self
            .transport
            .post_json(&self.base_url, &[("Authorization", auth.as_str())], &self.start_body(query))
            .await
            .map_err(transport_error)?;
        if !reply.is_success() {
            return Err(JobError::StartFailed {
                status: reply.status,
                body: reply.body,
            });
        }
        let body = parse_body(&reply)?;
        let id = body["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| JobError::ResponseParse {
                message: "start response has no job id".to_string(),
            })?;
        debug!(job_id = id, "External job started");
        Ok(id.to_string())
    }

    async fn poll(&self, api_key: &str, job_id: &str) -> Result<ExternalJobStatus, JobError> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(job_id));
        let auth = format!("Bearer {api_key}");
        let reply = self
            .transport
            .get(&url, &[("Authorization", auth.as_str())])
            .await
            .map_err(transport_error)?;
        if !reply.is_success() {
            return Err(JobError::PollFailed {
                status: reply.status,
                body: reply.body,
            });
        }
        Ok(ExternalJobStatus::from_json(job_id, &parse_body(&reply)?))
    }
}

// ---------------------------------------------------------------------------
// Scripted client
// ---------------------------------------------------------------------------

/// Job client that replays queued poll results and counts requests.
///
/// When the queue is empty every poll reports the job as still running.
pub struct ScriptedJobClient {
    job_id: String,
    start_error: Mutex<Option<JobError>>,
    polls: Mutex<VecDeque<Result<ExternalJobStatus, JobError>>>,
    poll_count: AtomicUsize,
    start_count: AtomicUsize,
}

impl ScriptedJobClient {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            start_error: Mutex::new(None),
            polls: Mutex::new(VecDeque::new()),
            poll_count: AtomicUsize::new(0),
            start_count: AtomicUsize::new(0),
        }
    }

    pub fn fail_start(self, error: JobError) -> Self {
        *self.start_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self
    }

    pub fn queue_status(&self, status: JobState) {
        self.queue(Ok(ExternalJobStatus::new(self.job_id.clone(), status)));
    }

    pub fn queue(&self, result: Result<ExternalJobStatus, JobError>) {
        self.polls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(result);
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalJobClient for ScriptedJobClient {
    async fn start(&self, _api_key: &str, _query: &str) -> Result<String, JobError> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        match self
            .start_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            Some(err) => Err(err),
            None => Ok(self.job_id.clone()),
        }
    }

    async fn poll(&self, _api_key: &str, job_id: &str) -> Result<ExternalJobStatus, JobError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(ExternalJobStatus::new(job_id, JobState::Running)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ScriptedTransport;

    fn client(transport: Arc<ScriptedTransport>) -> HttpJobClient {
        HttpJobClient::new(
            transport,
            "https://api.example.com/v1/responses/",
            Some("o3-deep-research".into()),
        )
    }

    #[tokio::test]
    async fn test_start_posts_background_job() {
        let transport = Arc::new(
            ScriptedTransport::new().with_reply(HttpReply::ok_json(&json!({"id": "resp_42", "status": "queued"}))),
        );
        let id = client(transport.clone()).start("sk", "sleep and memory").await.unwrap();
        assert_eq!(id, "resp_42");

        let req = &transport.requests()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "https://api.example.com/v1/responses");
        assert_eq!(req.header("Authorization"), Some("Bearer sk"));
        let body = req.body.as_ref().unwrap();
        assert_eq!(body["input"], "sleep and memory");
        assert_eq!(body["background"], true);
        assert_eq!(body["model"], "o3-deep-research");
    }

    #[tokio::test]
    async fn test_start_without_model_omits_field() {
        let transport =
            Arc::new(ScriptedTransport::new().with_reply(HttpReply::ok_json(&json!({"id": "x"}))));
        HttpJobClient::new(transport.clone(), "https://h/jobs", None)
            .start("k", "q")
            .await
            .unwrap();
        assert!(transport.requests()[0].body.as_ref().unwrap().get("model").is_none());
    }

    #[tokio::test]
    async fn test_start_errors() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_reply(HttpReply::new(401, "bad key"))
                .with_reply(HttpReply::ok_json(&json!({"status": "queued"}))),
        );
        let c = client(transport);
        assert!(matches!(
            c.start("k", "q").await,
            Err(JobError::StartFailed { status: 401, .. })
        ));
        assert!(matches!(
            c.start("k", "q").await,
            Err(JobError::ResponseParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_poll_gets_job_by_id() {
        let transport = Arc::new(ScriptedTransport::new().with_reply(HttpReply::ok_json(&json!({
            "id": "resp_42",
            "status": "completed",
            "output": [{"content": [{"text": "final report"}]}]
        }))));
        let status = client(transport.clone()).poll("sk", "resp_42").await.unwrap();
        assert_eq!(status.status, JobState::Completed);
        assert_eq!(status.outputs, Some(vec!["final report".to_string()]));
        let req = &transport.requests()[0];
        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "https://api.example.com/v1/responses/resp_42");
    }

    #[tokio::test]
    async fn test_poll_http_error() {
        let transport = Arc::new(ScriptedTransport::new().with_reply(HttpReply::new(404, "gone")));
        let err = client(transport).poll("sk", "resp_1").await.unwrap_err();
        assert!(matches!(err, JobError::PollFailed { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_poll_escapes_job_id() {
        let transport = Arc::new(
            ScriptedTransport::new().with_reply(HttpReply::ok_json(&json!({"status": "queued"}))),
        );
        let status = client(transport.clone()).poll("sk", "a/b c").await.unwrap();
        assert_eq!(status.job_id, "a/b c");
        assert_eq!(
            transport.requests()[0].url,
            "https://api.example.com/v1/responses/a%2Fb%20c"
        );
    }
}
