//! Multi-source evidence aggregation with escalating search.
//!
//! # Four attempts
//!
//! 1. The first decomposed variants, stopping early at twice the target.
//! 2. The remaining variants, if still short of the target.
//! 3. A two-token core-concept query.
//! 4. Fixed cross-domain fallback queries built on the core concept.
//!
//! Each variant is searched across every source concurrently. A failing
//! source contributes nothing for that query and is logged; the others
//! still count.

use super::decompose::{QueryDecomposer, normalize_query};
use super::paper::{AcademicPaper, ScoredPaper};
use super::scoring::{rank_order, score_paper};
use super::source::PaperSource;
use crate::config::EvidenceConfig;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "onto", "about", "of", "in", "on", "at", "to",
    "by", "an", "a", "is", "are", "was", "were", "be", "how", "what", "why", "when", "which",
    "does", "do", "can", "between", "among", "its", "their", "this", "that", "these", "those",
    "vs", "versus", "effect", "effects", "role", "impact", "use", "using",
];

const FALLBACK_TEMPLATES: &[&str] = &["{} interdisciplinary", "{} meta-analysis", "{} state of the art"];

/// Outcome of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSet {
    /// Scored, filtered, ranked and capped papers.
    pub papers: Vec<ScoredPaper>,
    /// Every query issued, in order.
    pub queries: Vec<String>,
    /// Highest attempt reached (1..=4).
    pub attempts: u8,
    /// Unique papers found before scoring and filtering.
    pub candidates: usize,
}

/// Two-token core concept: the first two significant tokens, else the first two tokens.
pub fn core_concept(query: &str) -> String {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let significant: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| {
            let word = t
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            word.chars().count() > 2 && !STOPWORDS.contains(&word.as_str())
        })
        .collect();
    let chosen = if significant.len() >= 2 {
        &significant[..2]
    } else {
        &tokens[..tokens.len().min(2)]
    };
    chosen.join(" ")
}

/// Per-run accumulator; owned by a single `aggregate` call.
#[derive(Default)]
struct Accumulator {
    seen_keys: HashSet<String>,
    searched: HashSet<String>,
    papers: Vec<AcademicPaper>,
    queries: Vec<String>,
}

impl Accumulator {
    fn merge(&mut self, batch: Vec<AcademicPaper>) -> usize {
        let before = self.papers.len();
        for paper in batch {
            if self.seen_keys.insert(paper.dedup_key()) {
                self.papers.push(paper);
            }
        }
        self.papers.len() - before
    }
}

/// Drives the decomposer and the sources to a ranked evidence set.
pub struct EvidenceAggregator {
    sources: Vec<Arc<dyn PaperSource>>,
    decomposer: QueryDecomposer,
    config: EvidenceConfig,
    current_year: Option<i32>,
}

impl EvidenceAggregator {
    pub fn new(sources: Vec<Arc<dyn PaperSource>>, config: EvidenceConfig) -> Self {
        Self {
            decomposer: QueryDecomposer::new(config.max_variants),
            sources,
            config,
            current_year: None,
        }
    }

    /// Pin the year used for recency scoring.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    pub fn config(&self) -> &EvidenceConfig {
        &self.config
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Aggregate using the configured per-source limit and target.
    pub async fn aggregate_default(&self, query: &str) -> EvidenceSet {
        self.aggregate(query, self.config.limit_per_source, self.config.min_results)
            .await
    }

    /// Run the escalating search for `query`.
    pub async fn aggregate(&self, query: &str, limit_per_source: usize, min_results: usize) -> EvidenceSet {
        let mut acc = Accumulator::default();
        let variants = self.decomposer.decompose(query);
        let early_stop = min_results.saturating_mul(2);
        let split = self.config.initial_variants.min(variants.len());
        let mut attempts = 1u8;

        info!(query, variants = variants.len(), sources = self.sources.len(), "Attempt 1: initial variants");
        for variant in &variants[..split] {
            self.search_variant(variant, limit_per_source, &mut acc).await;
            if acc.papers.len() >= early_stop {
                debug!(found = acc.papers.len(), "Early stop: reached twice the target");
                break;
            }
        }

        if acc.papers.len() < min_results && split < variants.len() {
            attempts = 2;
            info!(found = acc.papers.len(), min_results, "Attempt 2: remaining variants");
            for variant in &variants[split..] {
                self.search_variant(variant, limit_per_source, &mut acc).await;
                if acc.papers.len() >= early_stop {
                    break;
                }
            }
        }

        let core = core_concept(query);
        if acc.papers.len() < min_results && !core.is_empty() {
            attempts = 3;
            info!(found = acc.papers.len(), core = %core, "Attempt 3: core concept");
            self.search_variant(&core, limit_per_source, &mut acc).await;
        }

        if acc.papers.len() < min_results && !core.is_empty() {
            attempts = 4;
            info!(found = acc.papers.len(), "Attempt 4: cross-domain fallbacks");
            for template in FALLBACK_TEMPLATES {
                let fallback = template.replace("{}", &core);
                self.search_variant(&fallback, limit_per_source, &mut acc).await;
                if acc.papers.len() >= min_results {
                    break;
                }
            }
        }

        let candidates = acc.papers.len();
        let papers = self.rank(acc.papers);
        info!(candidates, kept = papers.len(), attempts, "Aggregation complete");

        EvidenceSet {
            papers,
            queries: acc.queries,
            attempts,
            candidates,
        }
    }

    /// Search one query across all sources concurrently and merge in source order.
    async fn search_variant(&self, query: &str, limit: usize, acc: &mut Accumulator) {
        if !acc.searched.insert(normalize_query(query)) {
            debug!(query, "Skipping already-searched query");
            return;
        }
        acc.queries.push(query.to_string());

        let searches = self.sources.iter().map(|source| source.search(query, limit));
        let results = futures::future::join_all(searches).await;

        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(batch) => {
                    let returned = batch.len();
                    let added = acc.merge(batch);
                    debug!(source = source.name(), query, returned, added, "Source results merged");
                }
                Err(e) => {
                    warn!(source = source.name(), query, error = %e, "Source search failed; continuing");
                }
            }
        }
    }

    /// Score, filter by minimum quality, sort, and cap.
    fn rank(&self, papers: Vec<AcademicPaper>) -> Vec<ScoredPaper> {
        let year = self
            .current_year
            .unwrap_or_else(|| chrono::Utc::now().year());
        let mut scored: Vec<ScoredPaper> = papers
            .into_iter()
            .map(|p| score_paper(p, year))
            .filter(|s| s.quality_score >= self.config.min_quality)
            .collect();
        scored.sort_by(rank_order);
        scored.truncate(self.config.max_results);
        scored
    }
}
