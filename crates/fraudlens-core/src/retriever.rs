//! Policy retrieval.
//!
//! The retriever returns the top-k policy sections for a query, most
//! relevant first. Scoring is delegated to a [`Ranker`] so the similarity
//! technology can be swapped (lexical overlap by default, an embedding
//! index in production) without touching callers.
//!
//! Ordering contract:
//! - Higher score = more relevant
//! - Ties keep original corpus order
//! - Same corpus, query and `k` always yield the same list

use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::corpus::PolicyCorpus;
use crate::types::{PolicyPassage, Transaction};

lazy_static! {
    /// Unicode word tokens (letters and digits, accents included).
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[\p{L}\p{N}]+").unwrap();
}

/// Separator placed between query fields.
pub const QUERY_SEPARATOR: &str = " ";

/// Scores every corpus section against a query.
///
/// Implementations must return exactly one score per section, aligned
/// with `corpus.sections()`. Scores only need to be comparable within a
/// single call.
pub trait Ranker: Send + Sync {
    fn score(&self, query: &str, corpus: &PolicyCorpus) -> Vec<f64>;

    /// Ranker name for logs.
    fn name(&self) -> &str {
        "ranker"
    }
}

/// Lexical ranker: distinct query terms found in a section, each weighted
/// by how rare the term is across the corpus.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapRanker;

impl Ranker for TermOverlapRanker {
    fn score(&self, query: &str, corpus: &PolicyCorpus) -> Vec<f64> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return vec![0.0; corpus.len()];
        }

        let section_terms: Vec<HashSet<String>> = corpus
            .sections()
            .iter()
            .map(|s| tokenize(&s.text))
            .collect();

        let total = section_terms.len() as f64;

        // Iterate query terms in sorted order so float summation is stable.
        let mut ordered_terms: Vec<&String> = query_terms.iter().collect();
        ordered_terms.sort();

        let weights: Vec<(&String, f64)> = ordered_terms
            .into_iter()
            .map(|term| {
                let df = section_terms.iter().filter(|t| t.contains(term)).count() as f64;
                let weight = if df == 0.0 { 0.0 } else { (1.0 + total / df).ln() };
                (term, weight)
            })
            .collect();

        section_terms
            .iter()
            .map(|terms| {
                weights
                    .iter()
                    .filter(|(term, _)| terms.contains(*term))
                    .map(|(_, weight)| weight)
                    .sum::<f64>()
            })
            .collect()
    }

    fn name(&self) -> &str {
        "term-overlap"
    }
}

/// Lower-cased, de-duplicated word tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Build the default retrieval query for a transaction:
/// description, category and amount joined by a single separator.
pub fn build_query(transaction: &Transaction) -> String {
    [
        transaction.description(),
        transaction.category(),
        transaction.amount(),
    ]
    .join(QUERY_SEPARATOR)
}

/// Top-k retrieval over a shared, read-only policy corpus.
#[derive(Clone)]
pub struct PolicyRetriever {
    corpus: Arc<PolicyCorpus>,
    ranker: Arc<dyn Ranker>,
}

impl PolicyRetriever {
    /// Create a retriever using [`TermOverlapRanker`].
    pub fn new(corpus: Arc<PolicyCorpus>) -> Self {
        Self::with_ranker(corpus, Arc::new(TermOverlapRanker))
    }

    /// Create a retriever with a custom ranker.
    pub fn with_ranker(corpus: Arc<PolicyCorpus>, ranker: Arc<dyn Ranker>) -> Self {
        Self { corpus, ranker }
    }

    pub fn corpus(&self) -> &PolicyCorpus {
        &self.corpus
    }

    /// Return at most `k` passages, most relevant first.
    ///
    /// An empty corpus yields an empty list.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<PolicyPassage> {
        if self.corpus.is_empty() || k == 0 {
            return Vec::new();
        }

        let scores = self.ranker.score(query, &self.corpus);
        if scores.len() != self.corpus.len() {
            tracing::warn!(
                ranker = self.ranker.name(),
                expected = self.corpus.len(),
                actual = scores.len(),
                "Ranker returned misaligned scores; missing entries rank last"
            );
        }

        let mut order: Vec<(usize, f64)> = (0..self.corpus.len())
            .map(|i| {
                let score = scores.get(i).copied().unwrap_or(f64::NEG_INFINITY);
                (i, if score.is_nan() { f64::NEG_INFINITY } else { score })
            })
            .collect();

        // Stable sort: equal scores keep corpus order.
        order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let passages: Vec<PolicyPassage> = order
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (index, score))| {
                let section = &self.corpus.sections()[index];
                PolicyPassage {
                    text: section.text.clone(),
                    source: section.source.clone(),
                    rank: rank + 1,
                    score,
                }
            })
            .collect();

        tracing::debug!(
            ranker = self.ranker.name(),
            k,
            returned = passages.len(),
            "Retrieved policy passages"
        );
        passages
    }

    /// Retrieve passages for a transaction using [`build_query`].
    pub fn retrieve_for(&self, transaction: &Transaction, k: usize) -> Vec<PolicyPassage> {
        self.retrieve(&build_query(transaction), k)
    }
}

impl std::fmt::Debug for PolicyRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRetriever")
            .field("sections", &self.corpus.len())
            .field("ranker", &self.ranker.name())
            .finish()
    }
}
