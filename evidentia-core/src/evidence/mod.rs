//! Bibliographic evidence: decomposition, multi-source search, dedup and scoring.

pub mod aggregator;
pub mod decompose;
pub mod paper;
pub mod scoring;
pub mod source;

pub use aggregator::{EvidenceAggregator, EvidenceSet, core_concept};
pub use decompose::{MAX_VARIANTS, QueryDecomposer, normalize_query};
pub use paper::{AcademicPaper, ScoredPaper, normalize_doi};
pub use scoring::{quality_score, rank_order, score_paper};
pub use source::{MockPaperSource, PaperSource};

/// Render the top `limit` papers as a numbered reference list for a prompt.
pub fn format_evidence(papers: &[ScoredPaper], limit: usize) -> String {
    papers
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.reference_line()))
        .collect::<Vec<_>>()
        .join("\n")
}
