//! Evidence assembly.
//!
//! An [`EvidenceBundle`] is everything the oracle sees for one transaction.
//! Assembly is pure composition: upstream selection order is kept, nothing
//! is re-ranked, de-duplicated or dropped.

use serde::{Deserialize, Serialize};

use crate::types::{EmailLine, PolicyPassage, Transaction};

/// Delimiter placed between policy passages in the rendered context.
pub const PASSAGE_DELIMITER: &str = "\n\n---\n\n";

/// Delimiter placed between matched correspondence lines.
pub const LINE_DELIMITER: &str = "\n";

/// Evidence for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceBundle {
    /// Snapshot of the analysed transaction
    pub transaction: Transaction,

    /// Retrieved policy passages, most relevant first
    pub passages: Vec<PolicyPassage>,

    /// Matched correspondence lines, in corpus order
    pub matched_lines: Vec<EmailLine>,
}

impl EvidenceBundle {
    /// Passage texts joined with [`PASSAGE_DELIMITER`].
    pub fn policy_context(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_DELIMITER)
    }

    /// Matched line texts joined with newlines.
    pub fn correspondence_context(&self) -> String {
        self.matched_lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(LINE_DELIMITER)
    }

    pub fn has_passages(&self) -> bool {
        !self.passages.is_empty()
    }

    pub fn has_correspondence(&self) -> bool {
        !self.matched_lines.is_empty()
    }

    /// True when neither passages nor matched lines were found.
    pub fn is_empty(&self) -> bool {
        !self.has_passages() && !self.has_correspondence()
    }
}

/// Compose a bundle from upstream selections.
pub fn assemble(
    transaction: &Transaction,
    passages: Vec<PolicyPassage>,
    matched_lines: Vec<EmailLine>,
) -> EvidenceBundle {
    EvidenceBundle {
        transaction: transaction.clone(),
        passages,
        matched_lines,
    }
}
