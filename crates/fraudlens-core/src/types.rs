//! Core data model for transaction triage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known transaction field names.
pub mod fields {
    pub const ID: &str = "id";
    pub const EMPLOYEE_NAME: &str = "employee_name";
    pub const AMOUNT: &str = "amount";
    pub const DESCRIPTION: &str = "description";
    pub const CATEGORY: &str = "category";
    pub const CURRENCY: &str = "currency";
}

/// A single transaction row: field name to raw string value.
///
/// Amounts stay as exact decimal text. Keys are kept in a `BTreeMap` so
/// every rendering of a transaction is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction {
    fields: BTreeMap<String, String>,
}

impl Transaction {
    /// Create an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transaction from `(field, value)` pairs.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set a field, returning the updated transaction.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Raw value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value of a field, or the empty string when absent.
    pub fn field(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    pub fn employee_name(&self) -> &str {
        self.field(fields::EMPLOYEE_NAME)
    }

    pub fn amount(&self) -> &str {
        self.field(fields::AMOUNT)
    }

    pub fn description(&self) -> &str {
        self.field(fields::DESCRIPTION)
    }

    pub fn category(&self) -> &str {
        self.field(fields::CATEGORY)
    }

    pub fn currency(&self) -> &str {
        self.field(fields::CURRENCY)
    }

    /// Identifier used in logs. Falls back to `transaction_id`.
    pub fn id(&self) -> Option<&str> {
        self.get(fields::ID).or_else(|| self.get("transaction_id"))
    }

    /// Iterate fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A policy passage retrieved for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyPassage {
    /// Passage text
    pub text: String,

    /// Where the passage came from (e.g., "policy.md#3")
    pub source: String,

    /// 1-based rank in the result list (1 = most relevant)
    pub rank: usize,

    /// Relevance score assigned by the ranker
    pub score: f64,
}

/// One line of the internal-correspondence corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EmailLine {
    /// Raw line text
    pub text: String,

    /// 0-based position in the corpus
    pub position: usize,
}

impl EmailLine {
    pub fn new(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            position,
        }
    }

    /// 1-based line number, as shown in an editor.
    pub fn line_number(&self) -> usize {
        self.position + 1
    }
}

/// Which instruction set the oracle receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
    /// Policy-only review; used when no correspondence is available
    Simple,

    /// Policy plus correspondence review, looking for concealment or collusion
    Contextual,
}

impl PromptVariant {
    /// The boolean key the oracle answers with.
    pub fn verdict_key(&self) -> &'static str {
        match self {
            PromptVariant::Simple => "violation",
            PromptVariant::Contextual => "fraud_suspected",
        }
    }

    /// Whether the rendered prompt carries the correspondence block.
    pub fn includes_correspondence(&self) -> bool {
        matches!(self, PromptVariant::Contextual)
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptVariant::Simple => write!(f, "simple"),
            PromptVariant::Contextual => write!(f, "contextual"),
        }
    }
}
