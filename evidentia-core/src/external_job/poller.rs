//! Poll loop with wall-clock timeout and cooperative cancellation.

use super::{ExternalJobClient, ExternalJobStatus, JobState};
use crate::config::ExternalAgentConfig;
use crate::error::JobError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Separator between output texts in the final report.
pub const OUTPUT_SEPARATOR: &str = "\n\n";

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: String,
    pub report: String,
    pub polls: u32,
    pub elapsed: Duration,
}

/// Drives one job from start to a terminal state.
pub struct ExternalJobPoller {
    client: Arc<dyn ExternalJobClient>,
    interval: Duration,
    timeout: Duration,
}

impl ExternalJobPoller {
    pub fn new(client: Arc<dyn ExternalJobClient>, interval: Duration, timeout: Duration) -> Self {
        Self {
            client,
            interval,
            timeout,
        }
    }

    pub fn from_config(client: Arc<dyn ExternalJobClient>, config: &ExternalAgentConfig) -> Self {
        Self::new(client, config.poll_interval(), config.timeout())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a job for `query` and poll it until it finishes.
    ///
    /// Every snapshot is sent to `observer` before the next sleep. Once the
    /// deadline passes or `cancel` fires, no further requests are issued.
    pub async fn run(
        &self,
        api_key: &str,
        query: &str,
        cancel: &CancellationToken,
        observer: Option<&mpsc::UnboundedSender<ExternalJobStatus>>,
    ) -> Result<JobOutcome, JobError> {
        if api_key.trim().is_empty() {
            return Err(JobError::ConfigMissing);
        }
        let started = Instant::now();
        let deadline = started + self.timeout;

        let job_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(JobError::Aborted { job_id: String::new() });
            }
            submitted = tokio::time::timeout_at(deadline, self.client.start(api_key, query)) => {
                match submitted {
                    Ok(id) => id?,
                    Err(_) => {
                        return Err(JobError::Timeout {
                            job_id: String::new(),
                            elapsed_ms: elapsed_ms(started),
                        });
                    }
                }
            }
        };
        info!(job_id = %job_id, timeout_secs = self.timeout.as_secs(), "External job submitted");

        let mut polls = 0u32;
        let outcome = tokio::time::timeout_at(
            deadline,
            self.poll_until_done(api_key, &job_id, cancel, observer, &mut polls),
        )
        .await;

        match outcome {
            Ok(Ok(report)) => {
                let elapsed = started.elapsed();
                info!(job_id = %job_id, polls, elapsed_ms = elapsed.as_millis() as u64, "External job completed");
                Ok(JobOutcome {
                    job_id,
                    report,
                    polls,
                    elapsed,
                })
            }
            Ok(Err(e)) => {
                warn!(job_id = %job_id, polls, error = %e, "External job ended without a report");
                Err(e)
            }
            Err(_) => {
                let elapsed_ms = elapsed_ms(started);
                warn!(job_id = %job_id, polls, elapsed_ms, "External job timed out");
                Err(JobError::Timeout { job_id, elapsed_ms })
            }
        }
    }

    async fn poll_until_done(
        &self,
        api_key: &str,
        job_id: &str,
        cancel: &CancellationToken,
        observer: Option<&mpsc::UnboundedSender<ExternalJobStatus>>,
        polls: &mut u32,
    ) -> Result<String, JobError> {
        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(aborted(job_id)),
                status = self.client.poll(api_key, job_id) => status?,
            };
            *polls += 1;
            debug!(job_id, poll = *polls, status = ?status.status, progress = ?status.progress, "External job status");

            if let Some(tx) = observer {
                let _ = tx.send(status.clone());
            }

            match status.status {
                JobState::Completed => return completed_report(job_id, status),
                JobState::Failed => {
                    return Err(JobError::JobFailed {
                        job_id: job_id.to_string(),
                        message: status
                            .error
                            .unwrap_or_else(|| "no error details reported".to_string()),
                    });
                }
                JobState::Cancelled => {
                    return Err(JobError::JobCancelled {
                        job_id: job_id.to_string(),
                    });
                }
                JobState::Pending | JobState::Running => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(aborted(job_id)),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

fn aborted(job_id: &str) -> JobError {
    JobError::Aborted {
        job_id: job_id.to_string(),
    }
}

fn completed_report(job_id: &str, status: ExternalJobStatus) -> Result<String, JobError> {
    match status.outputs {
        Some(outputs) if !outputs.is_empty() => Ok(outputs.join(OUTPUT_SEPARATOR)),
        _ => Err(JobError::ResponseParse {
            message: format!("job {job_id} completed without output"),
        }),
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_job::ScriptedJobClient;

    fn poller(client: Arc<ScriptedJobClient>, interval_ms: u64, timeout_ms: u64) -> ExternalJobPoller {
        ExternalJobPoller::new(
            client,
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    fn done(job_id: &str, outputs: &[&str]) -> ExternalJobStatus {
        let mut status = ExternalJobStatus::new(job_id, JobState::Completed);
        status.outputs = Some(outputs.iter().map(|s| s.to_string()).collect());
        status
    }

    #[tokio::test]
    async fn test_completes_and_joins_outputs() {
        let client = Arc::new(ScriptedJobClient::new("job-1"));
        client.queue_status(JobState::Pending);
        client.queue_status(JobState::Running);
        client.queue(Ok(done("job-1", &["Findings", "Limitations"])));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = poller(client.clone(), 1, 5_000)
            .run("key", "q", &CancellationToken::new(), Some(&tx))
            .await
            .unwrap();

        assert_eq!(outcome.report, "Findings\n\nLimitations");
        assert_eq!(outcome.polls, 3);
        assert_eq!(client.poll_count(), 3);

        let mut seen = Vec::new();
        while let Ok(s) = rx.try_recv() {
            seen.push(s.status);
        }
        assert_eq!(
            seen,
            vec![JobState::Pending, JobState::Running, JobState::Completed]
        );
    }

    #[tokio::test]
    async fn test_missing_key_skips_requests() {
        let client = Arc::new(ScriptedJobClient::new("job-1"));
        let err = poller(client.clone(), 1, 100)
            .run("  ", "q", &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::ConfigMissing));
        assert_eq!(client.start_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_and_cancellation() {
        let client = Arc::new(ScriptedJobClient::new("job-2"));
        let mut failed = ExternalJobStatus::new("job-2", JobState::Failed);
        failed.error = Some("quota exceeded".into());
        client.queue(Ok(failed));
        let err = poller(client, 1, 5_000)
            .run("key", "q", &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::JobFailed { ref message, .. } if message == "quota exceeded"));

        let client = Arc::new(ScriptedJobClient::new("job-3"));
        client.queue_status(JobState::Cancelled);
        let err = poller(client, 1, 5_000)
            .run("key", "q", &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::JobCancelled { .. }));
    }

    #[tokio::test]
    async fn test_completed_without_output_is_error() {
        let client = Arc::new(ScriptedJobClient::new("job-4"));
        client.queue_status(JobState::Completed);
        let err = poller(client, 1, 5_000)
            .run("key", "q", &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::ResponseParse { .. }));
    }

    #[tokio::test]
    async fn test_timeout_stops_polling() {
        let client = Arc::new(ScriptedJobClient::new("slow"));
        let err = poller(client.clone(), 2, 10)
            .run("key", "q", &CancellationToken::new(), None)
            .await
            .unwrap_err();
        match err {
            JobError::Timeout { job_id, elapsed_ms } => {
                assert_eq!(job_id, "slow");
                assert!(elapsed_ms >= 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let polls_at_timeout = client.poll_count();
        assert!(polls_at_timeout >= 1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(client.poll_count(), polls_at_timeout);
    }

    #[tokio::test]
    async fn test_cancel_aborts_between_polls() {
        let client = Arc::new(ScriptedJobClient::new("job-5"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = poller(client.clone(), 5, 5_000)
            .run("key", "q", &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Aborted { ref job_id } if job_id == "job-5"));

        let polls = client.poll_count();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.poll_count(), polls);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = Arc::new(ScriptedJobClient::new("job-6"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = poller(client.clone(), 1, 1_000)
            .run("key", "q", &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Aborted { .. }));
        assert_eq!(client.start_count(), 0);
    }

    #[tokio::test]
    async fn test_start_error_propagates() {
        let client = Arc::new(
            ScriptedJobClient::new("job-7").fail_start(JobError::StartFailed {
                status: 500,
                body: "boom".into(),
            }),
        );
        let err = poller(client.clone(), 1, 1_000)
            .run("key", "q", &CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::StartFailed { status: 500, .. }));
        assert_eq!(client.poll_count(), 0);
    }
}
