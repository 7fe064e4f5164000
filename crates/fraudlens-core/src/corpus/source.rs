//! Reading evidence sources from disk.

use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{fields, Transaction};

/// Which source a load error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Transactions,
    Policies,
    Emails,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Transactions => write!(f, "transaction"),
            SourceKind::Policies => write!(f, "policy corpus"),
            SourceKind::Emails => write!(f, "email corpus"),
        }
    }
}

/// Errors that can occur when loading sources.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{kind} source not found: {}", path.display())]
    SourceNotFound { kind: SourceKind, path: PathBuf },

    #[error("Failed to read source: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Read a whole source file, mapping a missing file to `SourceNotFound`.
pub(crate) fn read_source(kind: SourceKind, path: &Path) -> Result<String, SourceError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::SourceNotFound {
            kind,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(SourceError::Io(e)),
    }
}

/// Serialization format of a transaction file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFormat {
    Json,
    Yaml,
}

impl TransactionFormat {
    /// Guess the format from a file extension. Anything that is not
    /// `.yaml`/`.yml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                TransactionFormat::Yaml
            }
            _ => TransactionFormat::Json,
        }
    }
}

/// Load transaction rows from a JSON or YAML file.
///
/// The file holds a sequence of string-keyed maps. Scalars are
/// stringified, except `amount`, which must be a quoted string so its
/// exact decimal text survives parsing.
pub fn load_transactions(path: impl AsRef<Path>) -> Result<Vec<Transaction>, SourceError> {
    let path = path.as_ref();
    let contents = read_source(SourceKind::Transactions, path)?;
    let transactions = parse_transactions(&contents, TransactionFormat::from_path(path))?;

    tracing::info!(
        path = %path.display(),
        count = transactions.len(),
        "Loaded transactions"
    );
    Ok(transactions)
}

/// Parse transaction rows from an in-memory document.
pub fn parse_transactions(
    contents: &str,
    format: TransactionFormat,
) -> Result<Vec<Transaction>, SourceError> {
    let document: JsonValue = match format {
        TransactionFormat::Json => serde_json::from_str(contents)?,
        TransactionFormat::Yaml => serde_yaml::from_str(contents)?,
    };

    let rows = match document {
        JsonValue::Array(rows) => rows,
        JsonValue::Null => Vec::new(),
        other => {
            return Err(SourceError::InvalidTransaction(format!(
                "expected a list of rows, found {}",
                json_type_name(&other)
            )))
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| row_to_transaction(index, row))
        .collect()
}

fn row_to_transaction(index: usize, row: JsonValue) -> Result<Transaction, SourceError> {
    let JsonValue::Object(map) = row else {
        return Err(SourceError::InvalidTransaction(format!(
            "row {} is {}, expected a map",
            index,
            json_type_name(&row)
        )));
    };

    let mut row_fields = Vec::with_capacity(map.len());
    for (key, value) in map {
        // Amounts are matched as literal text; a parsed number has lost it.
        if key == fields::AMOUNT && !matches!(value, JsonValue::String(_) | JsonValue::Null) {
            return Err(SourceError::InvalidTransaction(format!(
                "row {} field '{}' is {}, quote it to keep the exact amount text",
                index,
                key,
                json_type_name(&value)
            )));
        }

        let text = match value {
            JsonValue::String(s) => s,
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            JsonValue::Null => String::new(),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                return Err(SourceError::InvalidTransaction(format!(
                    "row {} field '{}' is not a scalar",
                    index, key
                )))
            }
        };
        row_fields.push((key, text));
    }

    Ok(Transaction::from_fields(row_fields))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_rows() {
        let json = r#"[
            {"id": "T1", "employee_name": "Pam Beesly", "amount": "3500.00"},
            {"id": 7, "employee_name": "Dwight Schrute", "amount": "12", "approved": false}
        ]"#;

        let rows = parse_transactions(json, TransactionFormat::Json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount(), "3500.00");
        assert_eq!(rows[1].id(), Some("7"));
        assert_eq!(rows[1].amount(), "12");
        assert_eq!(rows[1].get("approved"), Some("false"));
    }

    #[test]
    fn test_unquoted_json_amount_is_rejected() {
        let json = r#"[
            {"id": "T1", "amount": "10.00"},
            {"id": "T2", "amount": 1200.10}
        ]"#;

        match parse_transactions(json, TransactionFormat::Json) {
            Err(SourceError::InvalidTransaction(msg)) => {
                assert!(msg.contains("row 1"), "{}", msg);
                assert!(msg.contains("amount"), "{}", msg);
            }
            other => panic!("expected InvalidTransaction, got {:?}", other),
        }
    }

    #[test]
    fn test_unquoted_yaml_amount_is_rejected() {
        let yaml = "- id: T1\n  amount: 1200.10\n";
        let result = parse_transactions(yaml, TransactionFormat::Yaml);
        assert!(matches!(result, Err(SourceError::InvalidTransaction(msg)) if msg.contains("row 0")));
    }

    #[test]
    fn test_quoted_amount_keeps_trailing_zero() {
        let yaml = "- id: T1\n  amount: \"1200.10\"\n";
        let rows = parse_transactions(yaml, TransactionFormat::Yaml).unwrap();
        assert_eq!(rows[0].amount(), "1200.10");
    }

    #[test]
    fn test_parse_yaml_rows() {
        let yaml = r#"
- id: "T1"
  employee_name: "Michael Scott"
  amount: "120.50"
  description: "Jantar com cliente"
"#;
        let rows = parse_transactions(yaml, TransactionFormat::Yaml).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description(), "Jantar com cliente");
    }

    #[test]
    fn test_rejects_non_list_document() {
        let result = parse_transactions(r#"{"id": "T1"}"#, TransactionFormat::Json);
        assert!(matches!(result, Err(SourceError::InvalidTransaction(_))));
    }

    #[test]
    fn test_rejects_nested_field() {
        let result = parse_transactions(r#"[{"id": ["T1"]}]"#, TransactionFormat::Json);
        assert!(matches!(result, Err(SourceError::InvalidTransaction(_))));
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let result = load_transactions("/definitely/not/here/transactions.json");
        assert!(matches!(
            result,
            Err(SourceError::SourceNotFound {
                kind: SourceKind::Transactions,
                ..
            })
        ));
    }

    #[test]
    fn test_loads_sample_transactions() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/transactions.json");
        let rows = load_transactions(path).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].id(), Some("TX-001"));
        assert_eq!(rows[0].employee_name(), "Pam Beesly");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            TransactionFormat::from_path(Path::new("rows.YML")),
            TransactionFormat::Yaml
        );
        assert_eq!(
            TransactionFormat::from_path(Path::new("rows.json")),
            TransactionFormat::Json
        );
    }
}
