//! Verdict normalization.
//!
//! The oracle answers with a parsed JSON object. Normalization turns any
//! such object into a [`Verdict`] without failing: missing or mistyped
//! fields fall back to safe defaults. Only output that could not be parsed
//! at all is an error, and that is raised before this module is reached.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::types::PromptVariant;

/// Key holding the explanation.
pub const REASON_KEY: &str = "reason";

/// Keys holding policy evidence, in lookup order.
pub const EVIDENCE_KEYS: [&str; 2] = ["policy_evidence", "evidence"];

/// Key holding correspondence evidence (contextual answers).
pub const CORRESPONDENCE_EVIDENCE_KEY: &str = "email_evidence";

/// Normalized oracle decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Violation (simple) or fraud suspicion (contextual)
    pub flag: bool,

    /// Oracle's explanation
    pub reason: String,

    /// Policy excerpts the oracle relied on
    pub evidence: Vec<String>,

    /// Correspondence excerpts the oracle relied on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correspondence_evidence: Vec<String>,
}

impl Verdict {
    /// Normalize an oracle response for the given variant.
    ///
    /// - flag: true only for a JSON `true` under the variant's key
    /// - reason: the string value, otherwise empty
    /// - evidence: string items of the first evidence list found
    /// - unknown keys are ignored
    pub fn from_response(response: &Map<String, JsonValue>, variant: PromptVariant) -> Self {
        let flag = matches!(response.get(variant.verdict_key()), Some(JsonValue::Bool(true)));

        let reason = response
            .get(REASON_KEY)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();

        let evidence = EVIDENCE_KEYS
            .iter()
            .find_map(|key| response.get(*key))
            .map(string_items)
            .unwrap_or_default();

        let correspondence_evidence = if variant.includes_correspondence() {
            response
                .get(CORRESPONDENCE_EVIDENCE_KEY)
                .map(string_items)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Self {
            flag,
            reason,
            evidence,
            correspondence_evidence,
        }
    }
}

/// String elements of a JSON array; anything else yields nothing.
fn string_items(value: &JsonValue) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
