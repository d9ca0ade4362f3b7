//! # Evidentia Sources
//!
//! Bibliographic database clients implementing
//! [`evidentia_core::evidence::PaperSource`]: Semantic Scholar, OpenAlex and
//! Crossref. Each client normalizes its API's records into
//! [`AcademicPaper`](evidentia_core::evidence::AcademicPaper), caches
//! successful responses and spaces its requests.

pub mod cache;
pub mod client;
pub mod crossref;
pub mod openalex;
pub mod semantic_scholar;

pub use cache::{ApiResponseCache, RequestSpacer};
pub use client::SourceHttp;
pub use crossref::CrossrefSource;
pub use openalex::OpenAlexSource;
pub use semantic_scholar::SemanticScholarSource;

use evidentia_core::config::{HttpConfig, SourcesConfig};
use evidentia_core::evidence::PaperSource;
use evidentia_core::http::{HttpTransport, ReqwestTransport, TransportError};
use std::sync::Arc;
use tracing::info;

/// Enabled sources over a shared transport, in a fixed order
/// (Semantic Scholar, OpenAlex, Crossref). Earlier sources win deduplication.
pub fn build_sources(
    config: &SourcesConfig,
    transport: Arc<dyn HttpTransport>,
) -> Vec<Arc<dyn PaperSource>> {
    let mut sources: Vec<Arc<dyn PaperSource>> = Vec::new();
    if config.semantic_scholar.enabled {
        sources.push(Arc::new(SemanticScholarSource::new(transport.clone(), config)));
    }
    if config.openalex.enabled {
        sources.push(Arc::new(OpenAlexSource::new(transport.clone(), config)));
    }
    if config.crossref.enabled {
        sources.push(Arc::new(CrossrefSource::new(transport, config)));
    }
    info!(
        sources = ?sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Bibliographic sources configured"
    );
    sources
}

/// Like [`build_sources`], with a real HTTP client using the source timeout.
pub fn sources_from_config(
    config: &SourcesConfig,
    http: &HttpConfig,
) -> Result<Vec<Arc<dyn PaperSource>>, TransportError> {
    let transport = ReqwestTransport::new(&HttpConfig {
        timeout_secs: config.timeout_secs,
        ..http.clone()
    })?;
    Ok(build_sources(config, Arc::new(transport)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidentia_core::http::ScriptedTransport;
    use pretty_assertions::assert_eq;

    fn names(sources: &[Arc<dyn PaperSource>]) -> Vec<String> {
        sources.iter().map(|s| s.name().to_string()).collect()
    }

    #[test]
    fn test_all_sources_by_default() {
        let sources = build_sources(&SourcesConfig::default(), Arc::new(ScriptedTransport::new()));
        assert_eq!(names(&sources), vec!["semantic_scholar", "openalex", "crossref"]);
    }

    #[test]
    fn test_disabled_sources_skipped() {
        let mut config = SourcesConfig::default();
        config.openalex.enabled = false;
        config.semantic_scholar.enabled = false;
        let sources = build_sources(&config, Arc::new(ScriptedTransport::new()));
        assert_eq!(names(&sources), vec!["crossref"]);
    }
}
