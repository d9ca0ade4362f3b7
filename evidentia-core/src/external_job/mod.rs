//! Long-running external research jobs.
//!
//! A job is started with one request and then polled until it reaches a
//! terminal state, the wall-clock budget runs out, or the caller cancels.
//! Only the latest status snapshot is kept.

pub mod client;
pub mod poller;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::{ExternalJobClient, HttpJobClient, ScriptedJobClient};
pub use poller::{ExternalJobPoller, JobOutcome};

/// Lifecycle state reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_lowercase().as_str() {
            "queued" | "pending" | "created" | "submitted" => Some(JobState::Pending),
            "in_progress" | "running" | "processing" => Some(JobState::Running),
            "completed" | "succeeded" | "success" | "done" => Some(JobState::Completed),
            "failed" | "error" | "incomplete" | "expired" => Some(JobState::Failed),
            "cancelled" | "canceled" | "cancelling" => Some(JobState::Cancelled),
            _ => None,
        }
    }
}

/// Snapshot of a remote job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalJobStatus {
    pub job_id: String,
    pub status: JobState,
    /// Fraction complete in `[0, 1]`, when reported.
    pub progress: Option<f64>,
    pub outputs: Option<Vec<String>>,
    pub error: Option<String>,
}

impl ExternalJobStatus {
    pub fn new(job_id: impl Into<String>, status: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: None,
            outputs: None,
            error: None,
        }
    }

    /// Build a snapshot from a remote job document.
    ///
    /// Reads `status`, falling back to the `done` flag; a non-null `error`
    /// marks an otherwise unfinished job as failed.
    pub fn from_json(job_id: &str, body: &Value) -> Self {
        let error = error_message(&body["error"]);
        let done = body["done"].as_bool();
        let status = body["status"]
            .as_str()
            .and_then(JobState::from_remote)
            .unwrap_or(match (done, &error) {
                (_, Some(_)) => JobState::Failed,
                (Some(true), None) => JobState::Completed,
                (Some(false), None) => JobState::Running,
                (None, None) => JobState::Running,
            });
        let status = match (status, &error) {
            (JobState::Pending | JobState::Running, Some(_)) => JobState::Failed,
            (s, _) => s,
        };

        Self {
            job_id: body["id"].as_str().unwrap_or(job_id).to_string(),
            status,
            progress: body["progress"].as_f64().map(|p| p.clamp(0.0, 1.0)),
            outputs: extract_outputs(body),
            error,
        }
    }
}

fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => Some(
            map.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// Collect output texts from `output[].content[].text`, `outputs[]`, or `output_text`.
pub fn extract_outputs(body: &Value) -> Option<Vec<String>> {
    let mut texts = Vec::new();
    if let Some(items) = body["output"].as_array() {
        for item in items {
            if let Some(parts) = item["content"].as_array() {
                texts.extend(
                    parts
                        .iter()
                        .filter_map(|p| p["text"].as_str())
                        .map(str::to_string),
                );
            } else if let Some(text) = item["text"].as_str() {
                texts.push(text.to_string());
            }
        }
    }
    if texts.is_empty()
        && let Some(list) = body["outputs"].as_array()
    {
        texts.extend(list.iter().filter_map(|v| v.as_str()).map(str::to_string));
    }
    if texts.is_empty()
        && let Some(text) = body["output_text"].as_str()
    {
        texts.push(text.to_string());
    }
    texts.retain(|t| !t.trim().is_empty());
    (!texts.is_empty()).then_some(texts)
}
