//! Per-transaction analysis and bounded-concurrency batches.
//!
//! # Flow
//! 1. Retrieve policy passages for the transaction
//! 2. Correlate correspondence (unless the mode is `simple`)
//! 3. Assemble the bundle and pick the prompt variant
//! 4. Dispatch, retrying transient failures when configured
//!
//! Corpora are shared read-only; rows share no mutable state besides the
//! optional verdict cache and usage tracker.

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use fraudlens_core::{
    gather_evidence, EmailCorrelator, EvidenceBundle, PolicyRetriever, PromptVariant, Transaction,
    Verdict,
};

use crate::cache::VerdictCache;
use crate::config::{AnalysisMode, ConfigError, RuntimeConfig};
use crate::dispatcher::{DispatchError, JudgmentDispatcher};
use crate::oracle::Oracle;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Analyzer not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub transaction: Transaction,

    /// Prompt variant the verdict was reached under
    pub variant: PromptVariant,

    #[serde(flatten)]
    pub verdict: Verdict,

    /// Evidence shown to the oracle, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<EvidenceBundle>,

    pub analyzed_at: DateTime<Utc>,
}

impl Analysis {
    pub fn flagged(&self) -> bool {
        self.verdict.flag
    }
}

/// One row of a batch. Rows fail independently.
#[derive(Debug)]
pub struct BatchItem {
    /// Position in the input
    pub index: usize,
    pub transaction_id: Option<String>,
    pub outcome: Result<Analysis, DispatchError>,
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub flagged: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        items.iter().fold(Self::default(), |mut summary, item| {
            summary.total += 1;
            match &item.outcome {
                Ok(analysis) if analysis.flagged() => summary.flagged += 1,
                Ok(_) => {}
                Err(_) => summary.failed += 1,
            }
            summary
        })
    }
}

pub struct FraudAnalyzer {
    retriever: PolicyRetriever,
    correlator: Option<EmailCorrelator>,
    dispatcher: JudgmentDispatcher,
    config: RuntimeConfig,
}

impl FraudAnalyzer {
    pub fn builder() -> FraudAnalyzerBuilder {
        FraudAnalyzerBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Gather evidence and choose the variant for a transaction.
    pub fn prepare(&self, transaction: &Transaction) -> (EvidenceBundle, PromptVariant) {
        let top_k = self.config.top_k;
        match self.config.mode {
            AnalysisMode::Simple => (
                gather_evidence(&self.retriever, None, transaction, top_k),
                PromptVariant::Simple,
            ),
            AnalysisMode::Contextual => (
                gather_evidence(&self.retriever, self.correlator.as_ref(), transaction, top_k),
                PromptVariant::Contextual,
            ),
            AnalysisMode::Auto => {
                let bundle =
                    gather_evidence(&self.retriever, self.correlator.as_ref(), transaction, top_k);
                let variant = if bundle.has_correspondence() {
                    PromptVariant::Contextual
                } else {
                    PromptVariant::Simple
                };
                (bundle, variant)
            }
        }
    }

    /// Analyze one transaction.
    pub async fn analyze(&self, transaction: &Transaction) -> Result<Analysis, DispatchError> {
        let (bundle, variant) = self.prepare(transaction);
        let verdict = self.dispatch_with_retry(&bundle, variant).await?;

        tracing::info!(
            transaction = transaction.id().unwrap_or("-"),
            %variant,
            flag = verdict.flag,
            "Transaction analyzed"
        );

        Ok(Analysis {
            transaction: transaction.clone(),
            variant,
            verdict,
            bundle: self.config.include_bundle.then_some(bundle),
            analyzed_at: Utc::now(),
        })
    }

    /// Analyze many transactions with at most `concurrency` in flight.
    ///
    /// Items come back in input order; a failed row never aborts the rest.
    pub async fn analyze_batch(&self, transactions: Vec<Transaction>) -> Vec<BatchItem> {
        let concurrency = self.config.concurrency.max(1);
        tracing::info!(rows = transactions.len(), concurrency, "Starting batch");

        let mut items: Vec<BatchItem> = stream::iter(transactions.into_iter().enumerate())
            .map(|(index, transaction)| async move {
                let outcome = self.analyze(&transaction).await;
                if let Err(e) = &outcome {
                    tracing::warn!(
                        index,
                        transaction = transaction.id().unwrap_or("-"),
                        error = %e,
                        "Transaction analysis failed"
                    );
                }
                BatchItem {
                    index,
                    transaction_id: transaction.id().map(str::to_string),
                    outcome,
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        items.sort_by_key(|item| item.index);
        items
    }

    async fn dispatch_with_retry(
        &self,
        bundle: &EvidenceBundle,
        variant: PromptVariant,
    ) -> Result<Verdict, DispatchError> {
        let retry = &self.config.retry;
        if retry.max_retries == 0 {
            return self.dispatcher.dispatch(bundle, variant).await;
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(retry.base_delay)
            .with_max_times(retry.max_retries);

        (|| self.dispatcher.dispatch(bundle, variant))
            .retry(backoff)
            .when(DispatchError::is_transient)
            .notify(|err: &DispatchError, delay| {
                tracing::warn!(error = %err, delay = ?delay, "Retrying oracle call");
            })
            .await
    }
}

impl std::fmt::Debug for FraudAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FraudAnalyzer")
            .field("retriever", &self.retriever)
            .field("correlator", &self.correlator.is_some())
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`FraudAnalyzer`].
pub struct FraudAnalyzerBuilder {
    retriever: Option<PolicyRetriever>,
    correlator: Option<EmailCorrelator>,
    oracle: Option<Arc<dyn Oracle>>,
    config: RuntimeConfig,
}

impl FraudAnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            retriever: None,
            correlator: None,
            oracle: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn retriever(mut self, retriever: PolicyRetriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Without a correlator every analysis uses the simple variant
    /// (or an empty correspondence block in `contextual` mode).
    pub fn correlator(mut self, correlator: EmailCorrelator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<FraudAnalyzer, AnalyzerError> {
        self.config.validate()?;

        let retriever = self
            .retriever
            .ok_or_else(|| AnalyzerError::NotConfigured("No policy retriever set".to_string()))?;
        let oracle = self
            .oracle
            .ok_or_else(|| AnalyzerError::NotConfigured("No oracle set".to_string()))?;

        let mut dispatcher = JudgmentDispatcher::new(oracle, self.config.oracle_timeout);
        if self.config.cache.enabled {
            dispatcher = dispatcher.with_cache(Arc::new(VerdictCache::new(
                self.config.cache.max_entries,
                self.config.cache.ttl,
            )));
        }

        Ok(FraudAnalyzer {
            retriever,
            correlator: self.correlator,
            dispatcher,
            config: self.config,
        })
    }
}

impl Default for FraudAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
