//! Correspondence correlation.
//!
//! Finds the email lines that plausibly refer to a transaction using three
//! rules, checked per line in order. The first rule that fires decides the
//! match and the line is counted once:
//!
//! 1. **Name**: the employee name appears in the line (case-insensitive).
//! 2. **Amount**: the amount's literal text appears in the line
//!    (case-sensitive, exact: `"3500.00"` does not match `"3500"`).
//! 3. **Keyword**: a significant description token appears in the
//!    lower-cased line.
//!
//! Results keep corpus order and are cut to the first [`MAX_MATCHED_LINES`]
//! matches. The cut is positional, not relevance-ranked.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::corpus::EmailCorpus;
use crate::types::{EmailLine, Transaction};

/// Upper bound on matched lines per transaction.
pub const MAX_MATCHED_LINES: usize = 80;

/// Description tokens this short (in characters) never count as keywords.
pub const MAX_IGNORED_TOKEN_LEN: usize = 3;

/// Description tokens that never count as keywords.
pub const STOP_WORDS: [&str; 8] = [
    "de", "do", "da", "para", "com", "despesa", "compra", "gasto",
];

/// The rule that matched a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MatchRule {
    Name,
    Amount,
    Keyword { token: String },
}

/// A matched line with the rule that selected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMatch {
    pub line: EmailLine,
    #[serde(flatten)]
    pub rule: MatchRule,
}

/// Normalized inputs for one correlation run.
struct MatchTerms {
    name: Option<String>,
    amount: Option<String>,
    keywords: Vec<String>,
}

impl MatchTerms {
    fn new(employee_name: &str, amount: &str, description: &str) -> Self {
        let name = employee_name.trim();
        Self {
            name: (!name.is_empty()).then(|| name.to_lowercase()),
            amount: (!amount.is_empty()).then(|| amount.to_string()),
            keywords: keyword_tokens(description),
        }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none() && self.amount.is_none() && self.keywords.is_empty()
    }

    /// First rule that fires for this line, if any.
    fn check(&self, text: &str) -> Option<MatchRule> {
        let lower = text.to_lowercase();

        if let Some(name) = &self.name {
            if lower.contains(name.as_str()) {
                return Some(MatchRule::Name);
            }
        }

        if let Some(amount) = &self.amount {
            if text.contains(amount.as_str()) {
                return Some(MatchRule::Amount);
            }
        }

        self.keywords
            .iter()
            .find(|token| lower.contains(token.as_str()))
            .map(|token| MatchRule::Keyword {
                token: token.clone(),
            })
    }
}

/// Significant tokens of a description, in description order.
///
/// Lower-cases, treats hyphens as spaces, splits on whitespace, then drops
/// tokens of [`MAX_IGNORED_TOKEN_LEN`] characters or fewer and
/// [`STOP_WORDS`]. Duplicates are dropped.
pub fn keyword_tokens(description: &str) -> Vec<String> {
    let normalized = description.to_lowercase().replace('-', " ");
    let mut tokens: Vec<String> = Vec::new();

    for token in normalized.split_whitespace() {
        if token.chars().count() <= MAX_IGNORED_TOKEN_LEN || STOP_WORDS.contains(&token) {
            continue;
        }
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }

    tokens
}

/// Match lines against a transaction's name, amount and description,
/// reporting which rule selected each line.
///
/// At most `limit` matches are returned, in corpus order.
pub fn correlate_explained(
    lines: &[EmailLine],
    employee_name: &str,
    amount: &str,
    description: &str,
    limit: usize,
) -> Vec<LineMatch> {
    let terms = MatchTerms::new(employee_name, amount, description);
    if terms.is_empty() || limit == 0 {
        return Vec::new();
    }

    lines
        .iter()
        .filter_map(|line| {
            terms.check(&line.text).map(|rule| LineMatch {
                line: line.clone(),
                rule,
            })
        })
        .take(limit)
        .collect()
}

/// Match lines against a transaction's name, amount and description.
///
/// Returns at most [`MAX_MATCHED_LINES`] lines in corpus order, each at
/// most once.
pub fn correlate(
    lines: &[EmailLine],
    employee_name: &str,
    amount: &str,
    description: &str,
) -> Vec<EmailLine> {
    correlate_explained(lines, employee_name, amount, description, MAX_MATCHED_LINES)
        .into_iter()
        .map(|m| m.line)
        .collect()
}

/// Correlator bound to a shared, read-only email corpus.
#[derive(Debug, Clone)]
pub struct EmailCorrelator {
    corpus: Arc<EmailCorpus>,
    max_lines: usize,
}

impl EmailCorrelator {
    pub fn new(corpus: Arc<EmailCorpus>) -> Self {
        Self {
            corpus,
            max_lines: MAX_MATCHED_LINES,
        }
    }

    /// Override the match cap.
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn corpus(&self) -> &EmailCorpus {
        &self.corpus
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Matched lines for explicit inputs.
    pub fn correlate(&self, employee_name: &str, amount: &str, description: &str) -> Vec<EmailLine> {
        self.explain(employee_name, amount, description)
            .into_iter()
            .map(|m| m.line)
            .collect()
    }

    /// Matched lines with the rule that selected each.
    pub fn explain(&self, employee_name: &str, amount: &str, description: &str) -> Vec<LineMatch> {
        let matches = correlate_explained(
            self.corpus.lines(),
            employee_name,
            amount,
            description,
            self.max_lines,
        );

        tracing::debug!(
            corpus_lines = self.corpus.len(),
            matched = matches.len(),
            "Correlated email lines"
        );
        matches
    }

    /// Matched lines for a transaction's name, amount and description.
    pub fn correlate_transaction(&self, transaction: &Transaction) -> Vec<EmailLine> {
        self.correlate(
            transaction.employee_name(),
            transaction.amount(),
            transaction.description(),
        )
    }
}
