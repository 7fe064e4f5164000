//! The judgment oracle.
//!
//! An oracle turns `(system_instructions, prompt)` into a parsed JSON
//! object. What happens inside is opaque to the dispatcher: a hosted LLM
//! ([`LlmOracle`]), a rules engine, or a test stub all fit.
//!
//! Contract:
//! - Success is always a JSON object; fields may be missing or mistyped
//! - Output that cannot be parsed into an object is `MalformedResponse`
//! - No retries happen here

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::providers::ProviderError;

mod llm;
mod response;

pub use llm::LlmOracle;
pub use response::parse_response;

/// A parsed oracle answer.
pub type JsonMap = Map<String, JsonValue>;

/// Errors from an oracle call.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Token budget exceeded")]
    BudgetExceeded,
}

impl OracleError {
    /// Whether a later attempt could succeed unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Provider(e) => e.is_transient(),
            OracleError::MalformedResponse(_) | OracleError::BudgetExceeded => false,
        }
    }
}

/// External structured-reasoning capability.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Judge a rendered prompt under the given instructions.
    async fn judge(&self, system_instructions: &str, prompt: &str) -> Result<JsonMap, OracleError>;

    /// Oracle name for logs.
    fn name(&self) -> &str {
        "oracle"
    }
}
