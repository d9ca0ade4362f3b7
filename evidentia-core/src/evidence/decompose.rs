//! Query decomposition into search variants.
//!
//! One research query becomes an ordered list of alternative search strings:
//! the verbatim query, thesaurus substitutions, concept pairs and
//! methodological suffixes. Earlier variants are searched first.

use std::collections::HashSet;

/// Maximum number of variants produced for one query.
pub const MAX_VARIANTS: usize = 8;
/// Synonyms used per recognized term.
const SYNONYMS_PER_TERM: usize = 2;
/// Synonym substitutions across the whole query.
const MAX_SYNONYM_VARIANTS: usize = 3;

const METHOD_SUFFIXES: &[&str] = &["systematic review", "empirical study"];

/// Domain terms and their search synonyms, keyed by lower-case token.
const THESAURUS: &[(&str, &[&str])] = &[
    ("ai", &["artificial intelligence", "machine learning"]),
    ("ml", &["machine learning", "statistical learning"]),
    ("llm", &["large language model", "foundation model"]),
    ("llms", &["large language models", "foundation models"]),
    ("effect", &["impact", "influence"]),
    ("effects", &["impacts", "outcomes"]),
    ("impact", &["effect", "influence"]),
    ("children", &["adolescents", "youth"]),
    ("elderly", &["older adults", "aging population"]),
    ("covid", &["sars-cov-2", "coronavirus"]),
    ("covid-19", &["sars-cov-2", "coronavirus"]),
    ("climate", &["global warming", "environmental change"]),
    ("treatment", &["therapy", "intervention"]),
    ("therapy", &["treatment", "intervention"]),
    ("depression", &["major depressive disorder", "depressive symptoms"]),
    ("anxiety", &["anxiety disorder", "stress"]),
    ("education", &["learning", "pedagogy"]),
    ("trading", &["investment", "portfolio management"]),
    ("economy", &["economic growth", "macroeconomics"]),
    ("health", &["wellbeing", "public health"]),
    ("cancer", &["oncology", "tumor"]),
    ("obesity", &["overweight", "body mass index"]),
    ("sleep", &["sleep quality", "circadian rhythm"]),
    ("memory", &["recall", "cognition"]),
    ("social", &["societal", "community"]),
    ("energy", &["power generation", "renewable energy"]),
    ("blockchain", &["distributed ledger", "cryptocurrency"]),
    ("genetics", &["genomics", "heredity"]),
];

/// Lower-case and collapse whitespace; the identity used for variant dedup.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn synonyms_for(token: &str) -> Option<&'static [&'static str]> {
    let key = token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
        .to_lowercase();
    THESAURUS
        .iter()
        .find(|(term, _)| *term == key)
        .map(|(_, synonyms)| *synonyms)
}

/// Expands a query into search variants.
#[derive(Debug, Clone)]
pub struct QueryDecomposer {
    max_variants: usize,
}

impl Default for QueryDecomposer {
    fn default() -> Self {
        Self::new(MAX_VARIANTS)
    }
}

impl QueryDecomposer {
    pub fn new(max_variants: usize) -> Self {
        Self {
            max_variants: max_variants.max(1),
        }
    }

    /// Ordered, de-duplicated variants. Always starts with `query` itself.
    pub fn decompose(&self, query: &str) -> Vec<String> {
        let query = query.trim();
        let tokens: Vec<&str> = query.split_whitespace().collect();
        if tokens.is_empty() {
            return vec![query.to_string()];
        }

        let mut candidates = vec![query.to_string()];
        candidates.extend(Self::synonym_variants(&tokens));

        let n = tokens.len();
        if n >= 3 {
            candidates.push(format!("{} {}", tokens[0], tokens[n - 1]));
        }
        if n >= 4 {
            let mid = n / 2;
            candidates.push(format!("{} {}", tokens[mid - 1], tokens[mid]));
        }
        for suffix in METHOD_SUFFIXES {
            candidates.push(format!("{query} {suffix}"));
        }

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(normalize_query(c)))
            .take(self.max_variants)
            .collect()
    }

    fn synonym_variants(tokens: &[&str]) -> Vec<String> {
        let mut variants = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            let Some(synonyms) = synonyms_for(token) else {
                continue;
            };
            for synonym in synonyms.iter().take(SYNONYMS_PER_TERM) {
                if variants.len() == MAX_SYNONYM_VARIANTS {
                    return variants;
                }
                let mut replaced: Vec<&str> = tokens.to_vec();
                replaced[i] = *synonym;
                variants.push(replaced.join(" "));
            }
        }
        variants
    }
}
