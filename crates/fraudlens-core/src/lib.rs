//! # fraudlens-core
//!
//! Deterministic evidence engine for transaction triage.
//!
//! Given a transaction, this crate answers:
//! - Which compliance passages are relevant? ([`PolicyRetriever`])
//! - Which correspondence lines mention it? ([`EmailCorrelator`])
//! - What exactly does the judge get to see? ([`EvidenceBundle`])
//!
//! and turns the judge's parsed answer into a [`Verdict`].
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same corpora and transaction always produce the same bundle
//! 2. **No oracle calls**: Judgment lives in `fraudlens-runtime`
//! 3. **Order-preserving**: Passage order and line order are never re-sorted after selection
//! 4. **Share-safe**: Corpora are immutable and shared through `Arc`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fraudlens_core::{gather_evidence, EmailCorpus, EmailCorrelator, PolicyCorpus, PolicyRetriever};
//!
//! let retriever = PolicyRetriever::new(Arc::new(PolicyCorpus::from_file("policy.md")?));
//! let correlator = EmailCorrelator::new(Arc::new(EmailCorpus::from_file("emails.txt")?));
//!
//! for tx in fraudlens_core::load_transactions("transactions.json")? {
//!     let bundle = gather_evidence(&retriever, Some(&correlator), &tx, 4);
//!     println!("{} passages, {} lines", bundle.passages.len(), bundle.matched_lines.len());
//! }
//! ```

pub mod correlator;
pub mod corpus;
pub mod evidence;
pub mod retriever;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use correlator::{correlate, EmailCorrelator, LineMatch, MatchRule, MAX_MATCHED_LINES};
pub use corpus::{
    load_transactions, EmailCorpus, PolicyCorpus, PolicySection, SourceError, SourceKind,
};
pub use evidence::{assemble, EvidenceBundle};
pub use retriever::{build_query, PolicyRetriever, Ranker, TermOverlapRanker};
pub use types::{EmailLine, PolicyPassage, PromptVariant, Transaction};
pub use verdict::Verdict;

/// Retrieve, correlate and assemble evidence for one transaction.
///
/// Without a correlator the bundle carries no correspondence lines.
pub fn gather_evidence(
    retriever: &PolicyRetriever,
    correlator: Option<&EmailCorrelator>,
    transaction: &Transaction,
    top_k: usize,
) -> EvidenceBundle {
    let passages = retriever.retrieve_for(transaction, top_k);
    let matched_lines = correlator
        .map(|c| c.correlate_transaction(transaction))
        .unwrap_or_default();

    tracing::debug!(
        transaction = transaction.id().unwrap_or("-"),
        passages = passages.len(),
        matched_lines = matched_lines.len(),
        "Gathered evidence"
    );

    assemble(transaction, passages, matched_lines)
}
