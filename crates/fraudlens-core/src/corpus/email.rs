//! The internal-correspondence corpus.

use std::path::Path;

use super::source::{read_source, SourceError, SourceKind};
use crate::types::EmailLine;

/// Immutable, line-addressed correspondence corpus.
///
/// Blank lines keep their position so line numbers match the source file.
#[derive(Debug, Clone, Default)]
pub struct EmailCorpus {
    lines: Vec<EmailLine>,
}

impl EmailCorpus {
    /// Split raw text into lines.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .enumerate()
                .map(|(position, line)| EmailLine::new(line, position))
                .collect(),
        }
    }

    /// Load the corpus from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let contents = read_source(SourceKind::Emails, path)?;
        let corpus = Self::from_text(&contents);

        tracing::info!(
            path = %path.display(),
            lines = corpus.len(),
            "Loaded email corpus"
        );
        Ok(corpus)
    }

    pub fn lines(&self) -> &[EmailLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
