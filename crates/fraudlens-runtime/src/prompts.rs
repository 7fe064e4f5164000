//! Oracle instructions and prompt rendering.
//!
//! Instructions are static per [`PromptVariant`]; the prompt is a pure
//! function of `(bundle, variant)`, so identical evidence always renders
//! byte-identical text (which also makes it a usable cache key).

use fraudlens_core::{EvidenceBundle, PromptVariant};
use std::fmt::Write;

/// Instructions for policy-only review.
pub const SIMPLE_SYSTEM_PROMPT: &str = r#"
You are a financial compliance auditor reviewing corporate transactions.

Your job is to decide whether ONE transaction violates the compliance
policy excerpts you are given.

## Review Constraints
1. Judge ONLY against the policy excerpts provided - do not invent rules
2. Use the transaction fields exactly as given
3. If the excerpts do not cover the transaction, it is not a violation
4. Quote the policy text you rely on

## Output Format (JSON only, no prose)
{
  "violation": true | false,
  "reason": "short explanation",
  "policy_evidence": ["exact policy excerpt", "..."]
}
"#;

/// Instructions for policy plus correspondence review.
pub const CONTEXTUAL_SYSTEM_PROMPT: &str = r#"
You are a fraud auditor reviewing corporate transactions.

Some transactions only look fraudulent in CONTEXT, especially when internal
correspondence shows people arranging or disguising them.

## Review Constraints
1. Consider the policy excerpts, the transaction fields and the related
   correspondence lines together
2. Flag the transaction when the correspondence suggests intent to conceal,
   collusion, diversion of funds, or misrepresentation of spend
3. Correspondence that merely mentions the transaction is not evidence of fraud
4. Quote the policy text and the correspondence lines you rely on

## Output Format (JSON only, no prose)
{
  "fraud_suspected": true | false,
  "reason": "short explanation",
  "policy_evidence": ["exact policy excerpt", "..."],
  "email_evidence": ["exact correspondence line", "..."]
}
"#;

const NO_PASSAGES: &str = "(no relevant policy excerpts retrieved)";
const NO_CORRESPONDENCE: &str = "(no related correspondence found)";

/// Instructions for a variant.
pub fn system_instructions(variant: PromptVariant) -> &'static str {
    match variant {
        PromptVariant::Simple => SIMPLE_SYSTEM_PROMPT,
        PromptVariant::Contextual => CONTEXTUAL_SYSTEM_PROMPT,
    }
}

/// Render the user prompt for a bundle.
///
/// Sections, in order: policy excerpts, transaction fields (key order),
/// and for CONTEXTUAL only the related correspondence.
pub fn render_prompt(bundle: &EvidenceBundle, variant: PromptVariant) -> String {
    let mut out = String::new();

    out.push_str("## Compliance Policy Excerpts\n");
    if bundle.has_passages() {
        out.push_str(&bundle.policy_context());
    } else {
        out.push_str(NO_PASSAGES);
    }
    out.push_str("\n\n## Transaction\n");
    for (key, value) in bundle.transaction.iter() {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "- {}: {}", key, value);
    }

    if variant.includes_correspondence() {
        out.push_str("\n## Related Internal Correspondence\n");
        if bundle.has_correspondence() {
            out.push_str(&bundle.correspondence_context());
        } else {
            out.push_str(NO_CORRESPONDENCE);
        }
        out.push('\n');
    }

    let _ = write!(
        out,
        "\nAnswer with the JSON object described in your instructions. \
         The \"{}\" field must be a boolean.",
        variant.verdict_key()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudlens_core::{assemble, EmailLine, PolicyPassage, Transaction};

    fn bundle(lines: Vec<EmailLine>) -> EvidenceBundle {
        let tx = Transaction::new()
            .with("employee_name", "Pam Beesly")
            .with("amount", "3500.00");
        let passages = vec![
            PolicyPassage {
                text: "Reembolso requer nota fiscal.".to_string(),
                source: "policy.md#1".to_string(),
                rank: 1,
                score: 2.0,
            },
            PolicyPassage {
                text: "Viagens exigem aprovacao.".to_string(),
                source: "policy.md#2".to_string(),
                rank: 2,
                score: 1.0,
            },
        ];
        assemble(&tx, passages, lines)
    }

    #[test]
    fn test_instructions_per_variant() {
        assert!(system_instructions(PromptVariant::Simple).contains("\"violation\""));
        assert!(system_instructions(PromptVariant::Contextual).contains("\"fraud_suspected\""));
        assert!(system_instructions(PromptVariant::Contextual).contains("conceal"));
    }

    #[test]
    fn test_simple_prompt_has_no_correspondence_block() {
        let rendered = render_prompt(
            &bundle(vec![EmailLine::new("segredo", 0)]),
            PromptVariant::Simple,
        );

        assert!(rendered.contains("Reembolso requer nota fiscal.\n\n---\n\nViagens exigem aprovacao."));
        assert!(rendered.contains("- amount: 3500.00\n- employee_name: Pam Beesly\n"));
        assert!(!rendered.contains("Correspondence"));
        assert!(!rendered.contains("segredo"));
    }

    #[test]
    fn test_contextual_prompt_sections_in_order() {
        let rendered = render_prompt(
            &bundle(vec![EmailLine::new("linha A", 3), EmailLine::new("linha B", 7)]),
            PromptVariant::Contextual,
        );

        let policy = rendered.find("## Compliance Policy Excerpts").unwrap();
        let transaction = rendered.find("## Transaction").unwrap();
        let correspondence = rendered.find("## Related Internal Correspondence").unwrap();
        assert!(policy < transaction && transaction < correspondence);
        assert!(rendered.contains("linha A\nlinha B"));
        assert!(rendered.contains("\"fraud_suspected\""));
    }

    #[test]
    fn test_empty_sections_render_placeholders() {
        let empty = assemble(&Transaction::new(), vec![], vec![]);
        let rendered = render_prompt(&empty, PromptVariant::Contextual);
        assert!(rendered.contains(NO_PASSAGES));
        assert!(rendered.contains(NO_CORRESPONDENCE));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let b = bundle(vec![EmailLine::new("x", 1)]);
        assert_eq!(
            render_prompt(&b, PromptVariant::Contextual),
            render_prompt(&b, PromptVariant::Contextual)
        );
    }
}
