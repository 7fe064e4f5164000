//! Oracle backed by a chat-completion provider.

use async_trait::async_trait;
use std::sync::Arc;

use super::{parse_response, JsonMap, Oracle, OracleError};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::usage::UsageTracker;

/// Sends the instructions as the system message and the prompt as the
/// user message, then parses the reply into a JSON object.
pub struct LlmOracle {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    usage: Arc<UsageTracker>,
}

impl LlmOracle {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            provider,
            config,
            usage: Arc::new(UsageTracker::unlimited()),
        }
    }

    /// Share a usage tracker (and its budget) with other components.
    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn judge(&self, system_instructions: &str, prompt: &str) -> Result<JsonMap, OracleError> {
        let estimated = u64::from(self.provider.estimate_tokens(system_instructions))
            + u64::from(self.provider.estimate_tokens(prompt))
            + u64::from(self.config.max_tokens);
        // Held across the await; an error or cancellation drops it and
        // returns the tokens.
        let Some(reservation) = self.usage.try_reserve(estimated) else {
            tracing::warn!(
                provider = self.provider.name(),
                estimated,
                "Token budget exhausted, refusing oracle call"
            );
            return Err(OracleError::BudgetExceeded);
        };

        let messages = vec![
            ChatMessage::system(system_instructions),
            ChatMessage::user(prompt),
        ];
        let response = self.provider.complete(messages, &self.config).await?;
        reservation.settle(&response.usage, &response.model);

        tracing::debug!(
            provider = self.provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            stop_reason = response.stop_reason.as_deref().unwrap_or("-"),
            "Oracle answered"
        );

        parse_response(&response.content)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}
