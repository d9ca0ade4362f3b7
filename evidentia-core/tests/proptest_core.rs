//! Property-based tests for core components using proptest.

use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use evidentia_core::config::EvidenceConfig;
use evidentia_core::dialectic::{CONTEXT_SEPARATOR, with_previous_outputs};
use evidentia_core::evidence::{
    AcademicPaper, EvidenceAggregator, MAX_VARIANTS, MockPaperSource, PaperSource, QueryDecomposer,
    normalize_doi, normalize_query, quality_score, rank_order, score_paper,
};

fn arb_paper() -> impl Strategy<Value = AcademicPaper> {
    (
        "[a-z]{1,8}",
        "[A-Za-z ]{0,40}",
        proptest::option::of("10\\.[0-9]{4}/[a-z0-9]{1,6}"),
        proptest::option::of(0u64..500),
        proptest::option::of(1950i32..2030),
        proptest::option::of("[A-Za-z ]{0,30}"),
        proptest::option::of("[a-z ]{0,200}"),
        0usize..4,
    )
        .prop_map(|(id, title, doi, citations, year, venue, abstract_text, n_authors)| {
            let mut p = AcademicPaper::new(id, title, "prop");
            p.doi = doi;
            p.citation_count = citations;
            p.year = year;
            p.venue = venue;
            p.abstract_text = abstract_text;
            p.authors = (0..n_authors).map(|i| format!("Author {i}")).collect();
            p
        })
}

// --- Query decomposition properties ---

proptest! {
    #[test]
    fn decompose_starts_with_trimmed_query(query in "[a-zA-Z ]{1,60}") {
        let variants = QueryDecomposer::default().decompose(&query);
        prop_assert_eq!(&variants[0], query.trim());
    }

    #[test]
    fn decompose_is_bounded_and_unique(query in "[a-z]{1,10}( [a-z]{1,10}){0,8}") {
        let variants = QueryDecomposer::default().decompose(&query);
        prop_assert!(!variants.is_empty());
        prop_assert!(variants.len() <= MAX_VARIANTS);
        let unique: HashSet<_> = variants.iter().map(|v| normalize_query(v)).collect();
        prop_assert_eq!(unique.len(), variants.len());
    }

    #[test]
    fn decompose_respects_custom_cap(query in "[a-z]{2,8}( [a-z]{2,8}){3,6}", cap in 1usize..8) {
        let variants = QueryDecomposer::new(cap).decompose(&query);
        prop_assert!(variants.len() <= cap);
    }
}

/// Papers whose DOIs collide across case and resolver-prefix forms.
fn arb_colliding_papers() -> impl Strategy<Value = Vec<AcademicPaper>> {
    proptest::collection::vec(
        (
            proptest::option::of((0u8..4, 0u8..3, any::<bool>())),
            proptest::option::of(0u64..200),
            "[A-Za-z]{3,12}",
        ),
        0..30,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (doi, citations, title))| {
                let mut p = AcademicPaper::new(format!("p{i}"), format!("{title} {i}"), "prop");
                p.doi = doi.map(|(n, form, upper)| {
                    let suffix = if upper { format!("ABC{n}") } else { format!("abc{n}") };
                    match form {
                        0 => format!("10.1000/{suffix}"),
                        1 => format!("https://doi.org/10.1000/{suffix}"),
                        _ => format!("doi:10.1000/{suffix}"),
                    }
                });
                p.citation_count = citations;
                p.authors = vec!["Author".into()];
                p
            })
            .collect()
    })
}

// --- Scoring properties ---

proptest! {
    #[test]
    fn quality_score_is_bounded(paper in arb_paper(), year in 2000i32..2100) {
        let score = quality_score(&paper, year);
        prop_assert!((0.0..=1.0).contains(&score));
        // rounded to two decimals
        prop_assert!(((score * 100.0).round() - score * 100.0).abs() < 1e-9);
    }

    #[test]
    fn quality_score_is_deterministic(paper in arb_paper()) {
        prop_assert_eq!(quality_score(&paper, 2026), quality_score(&paper.clone(), 2026));
    }

    #[test]
    fn adding_doi_never_lowers_score(paper in arb_paper()) {
        let mut with_doi = paper.clone();
        with_doi.doi = Some("10.1234/abc".into());
        prop_assert!(quality_score(&with_doi, 2026) >= quality_score(&paper, 2026));
    }

    #[test]
    fn more_citations_never_lowers_score(paper in arb_paper(), extra in 0u64..1000) {
        let mut cited = paper.clone();
        cited.citation_count = Some(paper.citation_count.unwrap_or(0) + extra);
        prop_assert!(quality_score(&cited, 2026) >= quality_score(&paper, 2026));
    }

    #[test]
    fn rank_order_sorts_descending(papers in proptest::collection::vec(arb_paper(), 0..30)) {
        let mut scored: Vec<_> = papers.into_iter().map(|p| score_paper(p, 2026)).collect();
        scored.sort_by(rank_order);
        for pair in scored.windows(2) {
            prop_assert!(pair[0].quality_score >= pair[1].quality_score);
            if pair[0].quality_score == pair[1].quality_score {
                prop_assert!(
                    pair[0].paper.citation_count.unwrap_or(0) >= pair[1].paper.citation_count.unwrap_or(0)
                );
            }
        }
    }
}

// --- Aggregation properties ---

proptest! {
    #[test]
    fn aggregate_output_is_deduplicated_and_ranked(papers in arb_colliding_papers()) {
        let source: Arc<dyn PaperSource> = Arc::new(MockPaperSource::new("prop").with_default(papers));
        let aggregator = EvidenceAggregator::new(vec![source], EvidenceConfig::default())
            .with_current_year(2026);
        let set = tokio_test::block_on(aggregator.aggregate("sleep memory", 100, 1));

        let dois: Vec<String> = set
            .papers
            .iter()
            .filter_map(|p| p.paper.doi.as_deref().and_then(normalize_doi))
            .collect();
        let unique: HashSet<_> = dois.iter().collect();
        prop_assert_eq!(unique.len(), dois.len());

        for pair in set.papers.windows(2) {
            prop_assert_ne!(rank_order(&pair[0], &pair[1]), Ordering::Greater);
        }
    }
}

// --- DOI normalization properties ---

proptest! {
    #[test]
    fn doi_prefix_and_case_are_ignored(suffix in "[a-z0-9]{1,12}", upper in any::<bool>()) {
        let bare = format!("10.1000/{suffix}");
        let shown = if upper { bare.to_uppercase() } else { bare.clone() };
        prop_assert_eq!(normalize_doi(&format!("https://doi.org/{shown}")), Some(bare.clone()));
        prop_assert_eq!(normalize_doi(&format!("doi:{shown}")), Some(bare.clone()));
        prop_assert_eq!(normalize_doi(&shown), Some(bare));
    }

    #[test]
    fn doi_dedup_key_matches_across_forms(suffix in "[a-z0-9]{1,12}") {
        let mut a = AcademicPaper::new("a", "Title A", "x");
        a.doi = Some(format!("10.1000/{suffix}"));
        let mut b = AcademicPaper::new("b", "Completely different", "y");
        b.doi = Some(format!("https://doi.org/10.1000/{}", suffix.to_uppercase()));
        prop_assert_eq!(a.dedup_key(), b.dedup_key());
    }
}

// --- Prompt composition properties ---

proptest! {
    #[test]
    fn previous_outputs_are_all_included(
        prompt in "[a-z ]{1,40}",
        outputs in proptest::collection::vec("[a-z]{1,20}", 1..5),
    ) {
        let composed = with_previous_outputs(&prompt, &outputs);
        prop_assert!(composed.starts_with(&prompt));
        prop_assert!(composed.ends_with(&outputs.join(CONTEXT_SEPARATOR)));
    }

    #[test]
    fn no_previous_outputs_leaves_prompt_unchanged(prompt in "[a-z ]{0,40}") {
        prop_assert_eq!(with_previous_outputs(&prompt, &[]), prompt);
    }
}
