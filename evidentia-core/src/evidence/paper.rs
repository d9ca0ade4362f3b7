//! Normalized bibliographic records.

use serde::{Deserialize, Serialize};

/// Length of the title prefix used as identity when a paper has no DOI.
pub const TITLE_KEY_CHARS: usize = 50;

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// One paper as returned by any bibliographic source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicPaper {
    /// Source-specific identifier.
    pub paper_id: String,
    pub title: String,
    /// Author display names, in publication order.
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Bare DOI (`10.xxxx/...`), normalized by [`normalize_doi`].
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub citation_count: Option<u64>,
    #[serde(default)]
    pub venue: Option<String>,
    /// Name of the source that produced this record.
    pub source_id: String,
}

impl AcademicPaper {
    /// A paper with only the required fields set.
    pub fn new(
        paper_id: impl Into<String>,
        title: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: title.into(),
            authors: Vec::new(),
            year: None,
            abstract_text: None,
            doi: None,
            url: None,
            citation_count: None,
            venue: None,
            source_id: source_id.into(),
        }
    }

    /// Deduplication identity: normalized DOI when present, else a title prefix.
    pub fn dedup_key(&self) -> String {
        match self.doi.as_deref().and_then(normalize_doi) {
            Some(doi) => doi,
            None => {
                let prefix: String = self
                    .title
                    .trim()
                    .to_lowercase()
                    .chars()
                    .take(TITLE_KEY_CHARS)
                    .collect();
                format!("title:{prefix}")
            }
        }
    }

    pub fn has_doi(&self) -> bool {
        self.doi.as_deref().and_then(normalize_doi).is_some()
    }
}

/// Lower-case a DOI and strip resolver prefixes. Blank input yields `None`.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let bare = DOI_PREFIXES
        .iter()
        .find_map(|prefix| lower.strip_prefix(*prefix))
        .unwrap_or(lower.as_str())
        .trim();
    (!bare.is_empty()).then(|| bare.to_string())
}

/// A paper with its quality assessment.
///
/// Derived from an [`AcademicPaper`]; re-scoring produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPaper {
    #[serde(flatten)]
    pub paper: AcademicPaper,
    /// Additive heuristic in `[0, 1]`, rounded to two decimals.
    pub quality_score: f64,
    /// True iff the paper carries a DOI.
    pub verified: bool,
}

impl ScoredPaper {
    /// One-line reference suitable for an LLM prompt.
    pub fn reference_line(&self) -> String {
        let p = &self.paper;
        let authors = match p.authors.len() {
            0 => "Unknown authors".to_string(),
            1..=3 => p.authors.join(", "),
            _ => format!("{} et al.", p.authors[0]),
        };
        let mut line = format!("{} ({})", p.title, authors);
        if let Some(year) = p.year {
            line.push_str(&format!(", {year}"));
        }
        if let Some(venue) = p.venue.as_deref().filter(|v| !v.is_empty()) {
            line.push_str(&format!(", {venue}"));
        }
        if let Some(doi) = &p.doi {
            line.push_str(&format!(", doi:{doi}"));
        }
        if let Some(citations) = p.citation_count {
            line.push_str(&format!(", {citations} citations"));
        }
        line.push_str(&format!(" [quality {:.2}]", self.quality_score));
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1038/NATURE123").as_deref(),
            Some("10.1038/nature123")
        );
        assert_eq!(normalize_doi("doi:10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("10.1/X").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("   "), None);
        assert_eq!(normalize_doi("https://doi.org/"), None);
    }

    #[test]
    fn test_dedup_key_prefers_doi() {
        let mut a = AcademicPaper::new("s2:1", "Deep Learning", "semantic_scholar");
        a.doi = Some("https://doi.org/10.1/ABC".into());
        let mut b = AcademicPaper::new("oa:W1", "A different title", "openalex");
        b.doi = Some("10.1/abc".into());
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert!(a.has_doi());
    }

    #[test]
    fn test_dedup_key_title_prefix() {
        let long = "A".repeat(80);
        let a = AcademicPaper::new("1", format!("  {long} suffix one"), "x");
        let b = AcademicPaper::new("2", format!("{long} suffix two"), "y");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key(), format!("title:{}", "a".repeat(50)));

        let mut blank_doi = AcademicPaper::new("3", "Short", "z");
        blank_doi.doi = Some(String::new());
        assert_eq!(blank_doi.dedup_key(), "title:short");
        assert!(!blank_doi.has_doi());
    }

    #[test]
    fn test_abstract_serde_name() {
        let mut p = AcademicPaper::new("1", "T", "crossref");
        p.abstract_text = Some("An abstract".into());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["abstract"], "An abstract");
    }

    #[test]
    fn test_reference_line() {
        let mut p = AcademicPaper::new("1", "Sleep and memory", "openalex");
        p.authors = vec!["Walker M".into(), "Stickgold R".into(), "A".into(), "B".into()];
        p.year = Some(2020);
        p.venue = Some("Nature".into());
        p.doi = Some("10.1/x".into());
        p.citation_count = Some(120);
        let scored = ScoredPaper {
            paper: p,
            quality_score: 0.95,
            verified: true,
        };
        assert_eq!(
            scored.reference_line(),
            "Sleep and memory (Walker M et al.), 2020, Nature, doi:10.1/x, 120 citations [quality 0.95]"
        );
    }
}
