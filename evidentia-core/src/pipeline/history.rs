//! Run history store.
//!
//! Completed pipeline runs are recorded as `(topic, prompt, report, phases)`.
//! The pipeline treats the store as best-effort: a failed save is logged and
//! never fails the run.

use super::phase::ResearchPhase;
use crate::error::HistoryError;
use crate::persistence::{atomic_write_json, list_json_files, load_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// One recorded research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub topic: String,
    /// The prompt the phases actually ran on (enhanced, if enhancement was on).
    pub prompt: String,
    pub report: String,
    pub phases: Vec<ResearchPhase>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        topic: impl Into<String>,
        prompt: impl Into<String>,
        report: impl Into<String>,
        phases: Vec<ResearchPhase>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            prompt: prompt.into(),
            report: report.into(),
            phases,
            created_at: Utc::now(),
        }
    }
}

/// Summary row for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub id: Uuid,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub report_chars: usize,
}

impl From<&HistoryEntry> for HistorySummary {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id,
            topic: entry.topic.clone(),
            created_at: entry.created_at,
            report_chars: entry.report.chars().count(),
        }
    }
}

/// Persistence collaborator for completed runs.
pub trait HistoryStore: Send + Sync {
    fn save(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;

    /// Entries, newest first.
    fn list(&self) -> Result<Vec<HistorySummary>, HistoryError>;

    fn load(&self, id: &Uuid) -> Result<HistoryEntry, HistoryError>;
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn save(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<HistorySummary>, HistoryError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut summaries: Vec<HistorySummary> = entries.iter().map(HistorySummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn load(&self, id: &Uuid) -> Result<HistoryEntry, HistoryError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.id == *id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound { id: id.to_string() })
    }
}

/// One JSON file per run under a directory.
pub struct JsonFileHistoryStore {
    dir: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

fn persistence_error(e: std::io::Error) -> HistoryError {
    HistoryError::Persistence {
        message: e.to_string(),
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn save(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        atomic_write_json(&self.path_for(&entry.id), entry).map_err(persistence_error)
    }

    fn list(&self) -> Result<Vec<HistorySummary>, HistoryError> {
        let mut summaries = Vec::new();
        for path in list_json_files(&self.dir).map_err(persistence_error)? {
            match load_json::<HistoryEntry>(&path) {
                Ok(Some(entry)) => summaries.push(HistorySummary::from(&entry)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable history entry");
                }
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn load(&self, id: &Uuid) -> Result<HistoryEntry, HistoryError> {
        load_json(&self.path_for(id))
            .map_err(persistence_error)?
            .ok_or_else(|| HistoryError::NotFound { id: id.to_string() })
    }
}
