//! Extracting a JSON object from raw model output.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::{JsonMap, OracleError};

lazy_static! {
    /// A fenced code block, optionally tagged `json`.
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap();
}

/// Parse model output into a JSON object.
///
/// Accepts a bare object, an object inside a fenced code block, or the
/// first complete object embedded in prose. Anything else is
/// `MalformedResponse`, including valid JSON that is not an object.
pub fn parse_response(raw: &str) -> Result<JsonMap, OracleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OracleError::MalformedResponse("empty response".to_string()));
    }

    let value = candidates(trimmed)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<JsonValue>(candidate).ok())
        .or_else(|| embedded_object(trimmed).map(JsonValue::Object))
        .ok_or_else(|| {
            OracleError::MalformedResponse(format!("no JSON object in: {}", preview(trimmed)))
        })?;

    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(OracleError::MalformedResponse(format!(
            "expected a JSON object, got: {}",
            preview(&other.to_string())
        ))),
    }
}

/// Whole-text candidates: the text itself, then a fenced block.
fn candidates(text: &str) -> Vec<&str> {
    let mut out = vec![text];

    if let Some(block) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        out.push(block.as_str().trim());
    }

    out
}

/// First `{` that starts a complete object. Whatever follows the object,
/// braces included, is ignored.
fn embedded_object(text: &str) -> Option<JsonMap> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<JsonValue>();
        match stream.next() {
            Some(Ok(JsonValue::Object(map))) => Some(map),
            _ => None,
        }
    })
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        let map = parse_response(r#"{"violation": false, "reason": "ok"}"#).unwrap();
        assert_eq!(map["reason"], "ok");
    }

    #[test]
    fn test_fenced_object() {
        let raw = "Here is my analysis:\n```json\n{\"fraud_suspected\": true}\n```\n";
        let map = parse_response(raw).unwrap();
        assert_eq!(map["fraud_suspected"], true);
    }

    #[test]
    fn test_object_in_prose() {
        let raw = "Verdict follows {\"violation\": true, \"reason\": \"x\"} end.";
        let map = parse_response(raw).unwrap();
        assert_eq!(map["violation"], true);
    }

    #[test]
    fn test_braces_in_trailing_prose() {
        let map = parse_response(r#"{"violation": true} see {policy}"#).unwrap();
        assert_eq!(map["violation"], true);
    }

    #[test]
    fn test_braces_in_leading_prose() {
        let raw = r#"Per section {4.2}: {"fraud_suspected": false, "reason": "ok"} {end}"#;
        let map = parse_response(raw).unwrap();
        assert_eq!(map["fraud_suspected"], false);
        assert_eq!(map["reason"], "ok");
    }

    #[test]
    fn test_unparsable_is_malformed() {
        for raw in ["", "   ", "I cannot decide.", "{not json}", "{\"a\": "] {
            assert!(
                matches!(parse_response(raw), Err(OracleError::MalformedResponse(_))),
                "expected malformed for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        assert!(matches!(
            parse_response("[true, \"reason\"]"),
            Err(OracleError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response("true"),
            Err(OracleError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "ç".repeat(300);
        let short = preview(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), 123);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prose_wrapped_object_survives(
                flag in any::<bool>(),
                reason in "[a-zA-Z0-9 {}:,.çã-]{0,40}",
                before in "[a-zA-Z .,:]{0,40}",
                after in "[a-zA-Z .,:]{0,40}",
            ) {
                let object = serde_json::json!({"violation": flag, "reason": reason});
                let raw = format!("{}{}{}", before, object, after);

                let map = parse_response(&raw).unwrap();
                prop_assert_eq!(&map["violation"], &serde_json::Value::Bool(flag));
                prop_assert_eq!(map["reason"].as_str(), Some(reason.as_str()));
            }
        }
    }
}
