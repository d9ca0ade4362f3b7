//! Crossref REST API works search client.

use crate::client::SourceHttp;
use async_trait::async_trait;
use evidentia_core::config::SourcesConfig;
use evidentia_core::error::SourceError;
use evidentia_core::evidence::{AcademicPaper, PaperSource};
use evidentia_core::http::HttpTransport;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub const SOURCE_ID: &str = "crossref";

const CROSSREF_API: &str = "https://api.crossref.org";
const MAX_ROWS: usize = 1000;
const MIN_INTERVAL: Duration = Duration::from_millis(200);

static JATS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9:_-]*[^>]*>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub struct CrossrefSource {
    http: SourceHttp,
    mailto: Option<String>,
    base_url: String,
}

impl CrossrefSource {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &SourcesConfig) -> Self {
        Self {
            http: SourceHttp::from_config(SOURCE_ID, transport, config, MIN_INTERVAL),
            mailto: config.crossref.mailto.clone().filter(|m| !m.trim().is_empty()),
            base_url: CROSSREF_API.to_string(),
        }
    }

    pub fn with_http(http: SourceHttp, mailto: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            mailto,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, query: &str, limit: usize) -> String {
        let mut url = format!(
            "{}/works?query={}&rows={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, MAX_ROWS)
        );
        if let Some(mailto) = &self.mailto {
            url.push_str("&mailto=");
            url.push_str(&urlencoding::encode(mailto));
        }
        url
    }
}

#[async_trait]
impl PaperSource for CrossrefSource {
    fn name(&self) -> &str {
        SOURCE_ID
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<AcademicPaper>, SourceError> {
        let body = self.http.get_json(&self.search_url(query, limit), &[]).await?;
        let mut papers = parse_works_response(&body)?;
        papers.truncate(limit);
        Ok(papers)
    }
}

pub fn parse_works_response(body: &Value) -> Result<Vec<AcademicPaper>, SourceError> {
    let items = body
        .pointer("/message/items")
        .and_then(|i| i.as_array())
        .ok_or_else(|| SourceError::Parse {
            source_id: SOURCE_ID.to_string(),
            message: "response has no message.items array".to_string(),
        })?;
    Ok(items.iter().filter_map(parse_item).collect())
}

fn first_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(arr) => arr.first()?.as_str().map(|s| s.trim().to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

/// Year from the first of `published-print`, `published-online`, `issued`, `created`.
fn publication_year(item: &Value) -> Option<i32> {
    ["published-print", "published-online", "issued", "created"]
        .iter()
        .find_map(|field| item.get(*field)?.pointer("/date-parts/0/0")?.as_i64())
        .and_then(|y| i32::try_from(y).ok())
}

fn author_name(author: &Value) -> Option<String> {
    let given = author.get("given").and_then(|g| g.as_str()).unwrap_or("").trim();
    let family = author.get("family").and_then(|f| f.as_str()).unwrap_or("").trim();
    let name = match (given.is_empty(), family.is_empty()) {
        (false, false) => format!("{given} {family}"),
        (true, false) => family.to_string(),
        (false, true) => given.to_string(),
        (true, true) => author.get("name")?.as_str()?.trim().to_string(),
    };
    (!name.is_empty()).then_some(name)
}

fn parse_item(item: &Value) -> Option<AcademicPaper> {
    let title = first_string(item.get("title"))?;
    let doi = item.get("DOI").and_then(|d| d.as_str()).map(str::to_string);
    let id = doi.clone().unwrap_or_else(|| title.clone());

    let mut paper = AcademicPaper::new(id, title, SOURCE_ID);
    paper.doi = doi;
    paper.authors = item
        .get("author")
        .and_then(|a| a.as_array())
        .map(|arr| arr.iter().filter_map(author_name).collect())
        .unwrap_or_default();
    paper.year = publication_year(item);
    paper.citation_count = item.get("is-referenced-by-count").and_then(|c| c.as_u64());
    paper.venue = first_string(item.get("container-title"));
    paper.url = item.get("URL").and_then(|u| u.as_str()).map(str::to_string);
    paper.abstract_text = item
        .get("abstract")
        .and_then(|a| a.as_str())
        .map(strip_jats)
        .filter(|a| !a.is_empty());
    Some(paper)
}

/// Remove JATS/XML markup from a Crossref abstract and collapse whitespace.
pub fn strip_jats(text: &str) -> String {
    let stripped = JATS_TAG.replace_all(text, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}
