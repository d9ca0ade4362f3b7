//! OpenAlex works search client.
//!
//! OpenAlex publishes abstracts as an inverted index (`word -> [positions]`);
//! [`reconstruct_abstract`] turns that back into running text.

use crate::client::SourceHttp;
use async_trait::async_trait;
use evidentia_core::config::SourcesConfig;
use evidentia_core::error::SourceError;
use evidentia_core::evidence::{AcademicPaper, PaperSource};
use evidentia_core::http::HttpTransport;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const SOURCE_ID: &str = "openalex";

const OPENALEX_API: &str = "https://api.openalex.org";
const MAX_PER_PAGE: usize = 200;
const MIN_INTERVAL: Duration = Duration::from_millis(100);
/// Positions beyond this are treated as corrupt and ignored.
const MAX_ABSTRACT_WORDS: u64 = 5_000;

pub struct OpenAlexSource {
    http: SourceHttp,
    mailto: Option<String>,
    base_url: String,
}

impl OpenAlexSource {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &SourcesConfig) -> Self {
        Self {
            http: SourceHttp::from_config(SOURCE_ID, transport, config, MIN_INTERVAL),
            mailto: config.openalex.mailto.clone().filter(|m| !m.trim().is_empty()),
            base_url: OPENALEX_API.to_string(),
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
            "{}/works?search={}&per-page={}",
            self.base_url,
            urlencoding::encode(query),
            limit.clamp(1, MAX_PER_PAGE)
        );
        if let Some(mailto) = &self.mailto {
            url.push_str("&mailto=");
            url.push_str(&urlencoding::encode(mailto));
        }
        url
    }
}

#[async_trait]
impl PaperSource for OpenAlexSource {
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
    let results = body
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| SourceError::Parse {
            source_id: SOURCE_ID.to_string(),
            message: "response has no results array".to_string(),
        })?;
    Ok(results.iter().filter_map(parse_work).collect())
}

fn parse_work(work: &Value) -> Option<AcademicPaper> {
    let title = work
        .get("display_name")
        .or_else(|| work.get("title"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    let id = work
        .get("id")
        .and_then(|v| v.as_str())
        .map(|id| id.rsplit('/').next().unwrap_or(id))
        .unwrap_or_default();

    let mut paper = AcademicPaper::new(id, title, SOURCE_ID);
    paper.authors = work
        .get("authorships")
        .and_then(|a| a.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|a| a.pointer("/author/display_name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    paper.year = work
        .get("publication_year")
        .and_then(|y| y.as_i64())
        .and_then(|y| i32::try_from(y).ok());
    paper.citation_count = work.get("cited_by_count").and_then(|c| c.as_u64());
    paper.doi = work
        .get("doi")
        .and_then(|d| d.as_str())
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    paper.venue = work
        .pointer("/primary_location/source/display_name")
        .or_else(|| work.pointer("/host_venue/display_name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    paper.url = work
        .pointer("/primary_location/landing_page_url")
        .and_then(|u| u.as_str())
        .or_else(|| work.get("id").and_then(|u| u.as_str()))
        .map(str::to_string);
    paper.abstract_text = work
        .get("abstract_inverted_index")
        .and_then(reconstruct_abstract);
    Some(paper)
}

/// Rebuild abstract text from an OpenAlex inverted index.
pub fn reconstruct_abstract(index: &Value) -> Option<String> {
    let map = index.as_object()?;
    let mut positioned: Vec<(u64, &str)> = map
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|p| p.as_u64())
                .filter(|p| *p < MAX_ABSTRACT_WORDS)
                .map(move |p| (p, word.as_str()))
        })
        .collect();
    if positioned.is_empty() {
        return None;
    }
    positioned.sort_by_key(|(pos, _)| *pos);
    positioned.dedup_by_key(|(pos, _)| *pos);
    Some(
        positioned
            .into_iter()
            .map(|(_, word)| word)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ApiResponseCache;
    use evidentia_core::http::{HttpReply, ScriptedTransport};
    use serde_json::json;

    fn fixture() -> Value {
        json!({
            "meta": {"count": 1},
            "results": [{
                "id": "https://openalex.org/W2741809807",
                "doi": "https://doi.org/10.7717/peerj.4375",
                "display_name": "The state of OA",
                "publication_year": 2018,
                "cited_by_count": 850,
                "authorships": [
                    {"author": {"display_name": "Heather Piwowar"}},
                    {"author": {"display_name": "Jason Priem"}}
                ],
                "primary_location": {
                    "landing_page_url": "https://peerj.com/articles/4375",
                    "source": {"display_name": "PeerJ"}
                },
                "abstract_inverted_index": {"Despite": [0], "growing": [1], "interest": [2], "in": [3, 5], "OA": [4], "science": [6]}
            }]
        })
    }

    #[test]
    fn test_parse_work() {
        let papers = parse_works_response(&fixture()).unwrap();
        let p = &papers[0];
        assert_eq!(p.paper_id, "W2741809807");
        assert_eq!(p.title, "The state of OA");
        assert_eq!(p.authors, vec!["Heather Piwowar", "Jason Priem"]);
        assert_eq!(p.year, Some(2018));
        assert_eq!(p.citation_count, Some(850));
        assert_eq!(p.venue.as_deref(), Some("PeerJ"));
        assert_eq!(p.url.as_deref(), Some("https://peerj.com/articles/4375"));
        assert!(p.has_doi());
        assert_eq!(
            p.abstract_text.as_deref(),
            Some("Despite growing interest in OA in science")
        );
    }

    #[test]
    fn test_reconstruct_abstract_edge_cases() {
        assert_eq!(reconstruct_abstract(&json!(null)), None);
        assert_eq!(reconstruct_abstract(&json!({})), None);
        assert_eq!(
            reconstruct_abstract(&json!({"b": [1], "a": [0], "junk": [999999]})),
            Some("a b".to_string())
        );
    }

    #[test]
    fn test_missing_results_is_parse_error() {
        assert!(matches!(
            parse_works_response(&json!({"error": "x"})),
            Err(SourceError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_url_with_mailto() {
        let transport = Arc::new(ScriptedTransport::new().with_reply(HttpReply::ok_json(&fixture())));
        let http = SourceHttp::new(SOURCE_ID, transport.clone(), ApiResponseCache::disabled(), Duration::ZERO);
        let source = OpenAlexSource::with_http(http, Some("me@lab.org".into()), "https://oa.test");

        let papers = source.search("open access", 3).await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(
            transport.requests()[0].url,
            "https://oa.test/works?search=open%20access&per-page=3&mailto=me%40lab.org"
        );
    }
}
