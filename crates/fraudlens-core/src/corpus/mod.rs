//! Evidence sources: the policy corpus, the correspondence corpus and
//! transaction rows.
//!
//! Corpora are loaded once and then shared read-only (usually behind an
//! `Arc`) across every analysis. Nothing in this module mutates a corpus
//! after construction.

mod email;
mod policy;
mod source;

pub use email::EmailCorpus;
pub use policy::{PolicyCorpus, PolicySection};
pub use source::{load_transactions, parse_transactions, SourceError, SourceKind, TransactionFormat};
