//! Semantic Scholar Graph API search client.

use crate::client::SourceHttp;
use async_trait::async_trait;
use evidentia_core::config::SourcesConfig;
use evidentia_core::error::SourceError;
use evidentia_core::evidence::{AcademicPaper, PaperSource};
use evidentia_core::http::HttpTransport;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const SOURCE_ID: &str = "semantic_scholar";

const SEMANTIC_SCHOLAR_API: &str = "https://api.semanticscholar.org/graph/v1";
const SEARCH_FIELDS: &str = "paperId,title,abstract,authors,year,venue,citationCount,externalIds,url";
/// The API caps search pages at 100 results.
const MAX_LIMIT: usize = 100;

/// Unauthenticated clients share a 1 request/second pool.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct SemanticScholarSource {
    http: SourceHttp,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarSource {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &SourcesConfig) -> Self {
        Self {
            http: SourceHttp::from_config(SOURCE_ID, transport, config, MIN_INTERVAL),
            api_key: config
                .semantic_scholar
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            base_url: SEMANTIC_SCHOLAR_API.to_string(),
        }
    }

    /// Client over a prepared [`SourceHttp`], for tests and custom endpoints.
    pub fn with_http(http: SourceHttp, api_key: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, MAX_LIMIT),
            SEARCH_FIELDS
        )
    }
}

#[async_trait]
impl PaperSource for SemanticScholarSource {
    fn name(&self) -> &str {
        SOURCE_ID
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<AcademicPaper>, SourceError> {
        let url = self.search_url(query, limit);
        let body = match &self.api_key {
            Some(key) => self.http.get_json(&url, &[("x-api-key", key.as_str())]).await?,
            None => self.http.get_json(&url, &[]).await?,
        };
        let mut papers = parse_search_response(&body)?;
        papers.truncate(limit);
        Ok(papers)
    }
}

/// Parse a `/paper/search` body. Entries without a title are skipped.
pub fn parse_search_response(body: &Value) -> Result<Vec<AcademicPaper>, SourceError> {
    let data: &[Value] = match body.get("data") {
        Some(Value::Array(items)) => items.as_slice(),
        // An empty result set omits `data` entirely.
        None | Some(Value::Null) if body.get("total").is_some() => &[],
        _ => {
            return Err(SourceError::Parse {
                source_id: SOURCE_ID.to_string(),
                message: "response has no data array".to_string(),
            });
        }
    };
    Ok(data.iter().filter_map(parse_paper).collect())
}

fn parse_paper(item: &Value) -> Option<AcademicPaper> {
    let title = item.get("title")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }
    let id = item
        .get("paperId")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let mut paper = AcademicPaper::new(id, title, SOURCE_ID);
    paper.authors = item
        .get("authors")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    paper.year = item
        .get("year")
        .and_then(|v| v.as_i64())
        .and_then(|y| i32::try_from(y).ok());
    paper.abstract_text = non_empty(item.get("abstract"));
    paper.venue = non_empty(item.get("venue"));
    paper.citation_count = item.get("citationCount").and_then(|v| v.as_u64());
    paper.doi = non_empty(item.get("externalIds").and_then(|ids| ids.get("DOI")));
    paper.url = non_empty(item.get("url"));
    Some(paper)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
