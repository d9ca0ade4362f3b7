//! The contract every bibliographic source client implements.

use super::paper::AcademicPaper;
use crate::error::SourceError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A searchable bibliographic database.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Stable identifier recorded as [`AcademicPaper::source_id`].
    fn name(&self) -> &str;

    /// Search for up to `limit` papers matching `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<AcademicPaper>, SourceError>;
}

/// In-memory source for tests: fixed results per query, a default list, or
/// a forced failure. Records every query it receives.
pub struct MockPaperSource {
    name: String,
    by_query: HashMap<String, Vec<AcademicPaper>>,
    default: Vec<AcademicPaper>,
    fail_status: Option<u16>,
    queries: Mutex<Vec<String>>,
}

impl MockPaperSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            by_query: HashMap::new(),
            default: Vec::new(),
            fail_status: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Return `papers` for any query without a specific entry.
    pub fn with_default(mut self, papers: Vec<AcademicPaper>) -> Self {
        self.default = papers;
        self
    }

    /// Return `papers` for exactly `query`.
    pub fn with_query(mut self, query: &str, papers: Vec<AcademicPaper>) -> Self {
        self.by_query.insert(query.to_string(), papers);
        self
    }

    /// Fail every search with the given HTTP status.
    pub fn failing(name: &str, status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new(name)
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PaperSource for MockPaperSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<AcademicPaper>, SourceError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());
        if let Some(status) = self.fail_status {
            return Err(SourceError::Http {
                source_id: self.name.clone(),
                status,
            });
        }
        let papers = self.by_query.get(query).unwrap_or(&self.default);
        Ok(papers.iter().take(limit).cloned().collect())
    }
}
