//! Quality scoring heuristic for aggregated papers.
//!
//! Additive weights, capped at 1.0 and rounded to two decimals:
//!
//! | Signal | Weight |
//! |---|---|
//! | DOI present | 0.2 |
//! | citations ≥1 / ≥10 / ≥50 / ≥100 | 0.1 / 0.2 / 0.25 / 0.3 |
//! | high-quality venue keyword, else any non-preprint venue | 0.2, else 0.1 |
//! | age ≤2 / ≤5 / ≤10 years | 0.15 / 0.1 / 0.05 |
//! | abstract longer than 100 chars | 0.1 |
//! | at least one author | 0.05 |
//!
//! The score is a pure function of the paper and the current year.

use super::paper::{AcademicPaper, ScoredPaper};
use std::cmp::Ordering;

const HIGH_QUALITY_VENUES: &[&str] = &[
    "nature",
    "science",
    "lancet",
    "cell",
    "nejm",
    "new england journal",
    "jama",
    "bmj",
    "pnas",
    "proceedings of the national academy",
    "ieee",
    "acm",
    "plos",
    "journal of",
    "annals of",
    "neurips",
    "icml",
    "psychological bulletin",
    "american economic review",
];

const PREPRINT_MARKERS: &[&str] = &[
    "arxiv",
    "biorxiv",
    "medrxiv",
    "ssrn",
    "preprint",
    "research square",
    "psyarxiv",
];

fn citation_weight(citations: u64) -> f64 {
    match citations {
        100.. => 0.3,
        50..=99 => 0.25,
        10..=49 => 0.2,
        1..=9 => 0.1,
        0 => 0.0,
    }
}

fn venue_weight(venue: &str) -> f64 {
    let venue = venue.trim().to_lowercase();
    if venue.is_empty() {
        return 0.0;
    }
    if HIGH_QUALITY_VENUES.iter().any(|k| venue.contains(k)) {
        0.2
    } else if PREPRINT_MARKERS.iter().any(|k| venue.contains(k)) {
        0.0
    } else {
        0.1
    }
}

fn recency_weight(year: i32, current_year: i32) -> f64 {
    match current_year - year {
        age if age <= 2 => 0.15,
        age if age <= 5 => 0.1,
        age if age <= 10 => 0.05,
        _ => 0.0,
    }
}

/// Quality score in `[0, 1]`, rounded to two decimals.
pub fn quality_score(paper: &AcademicPaper, current_year: i32) -> f64 {
    let mut score = 0.0;
    if paper.has_doi() {
        score += 0.2;
    }
    score += citation_weight(paper.citation_count.unwrap_or(0));
    score += paper.venue.as_deref().map(venue_weight).unwrap_or(0.0);
    score += paper
        .year
        .map(|y| recency_weight(y, current_year))
        .unwrap_or(0.0);
    if paper
        .abstract_text
        .as_deref()
        .is_some_and(|a| a.trim().chars().count() > 100)
    {
        score += 0.1;
    }
    if paper.authors.iter().any(|a| !a.trim().is_empty()) {
        score += 0.05;
    }
    (score.min(1.0) * 100.0).round() / 100.0
}

/// Score a paper, producing a new [`ScoredPaper`].
pub fn score_paper(paper: AcademicPaper, current_year: i32) -> ScoredPaper {
    let quality_score = quality_score(&paper, current_year);
    let verified = paper.has_doi();
    ScoredPaper {
        paper,
        quality_score,
        verified,
    }
}

/// Result ordering: score descending, then citation count descending.
pub fn rank_order(a: &ScoredPaper, b: &ScoredPaper) -> Ordering {
    b.quality_score.total_cmp(&a.quality_score).then_with(|| {
        b.paper
            .citation_count
            .unwrap_or(0)
            .cmp(&a.paper.citation_count.unwrap_or(0))
    })
}
