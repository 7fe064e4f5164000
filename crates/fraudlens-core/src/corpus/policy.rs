//! The compliance-policy corpus.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::source::{read_source, SourceError, SourceKind};

/// One retrievable unit of policy text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicySection {
    /// Section text
    pub text: String,

    /// Source reference (e.g., "compliance_policy.md#4")
    pub source: String,
}

impl PolicySection {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// Immutable, ordered collection of policy sections.
///
/// Section order is the corpus order used to break ranking ties.
#[derive(Debug, Clone, Default)]
pub struct PolicyCorpus {
    sections: Vec<PolicySection>,
}

impl PolicyCorpus {
    /// Build a corpus from sections already split by the caller.
    pub fn new(sections: Vec<PolicySection>) -> Self {
        Self { sections }
    }

    /// Split a policy document into sections on blank lines.
    ///
    /// Each section's source is `<source_name>#<n>` with `n` starting at 1.
    pub fn from_text(text: &str, source_name: &str) -> Self {
        let mut sections = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                flush_section(&mut current, &mut sections, source_name);
            } else {
                current.push(line.trim_end());
            }
        }
        flush_section(&mut current, &mut sections, source_name);

        Self { sections }
    }

    /// Load and split a policy document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let contents = read_source(SourceKind::Policies, path)?;
        let source_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("policy");
        let corpus = Self::from_text(&contents, source_name);

        tracing::info!(
            path = %path.display(),
            sections = corpus.len(),
            "Loaded policy corpus"
        );
        Ok(corpus)
    }

    pub fn sections(&self) -> &[PolicySection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn flush_section(current: &mut Vec<&str>, sections: &mut Vec<PolicySection>, source_name: &str) {
    if current.is_empty() {
        return;
    }
    let ordinal = sections.len() + 1;
    sections.push(PolicySection::new(
        current.join("\n"),
        format!("{}#{}", source_name, ordinal),
    ));
    current.clear();
}
