//! # fraudlens-runtime
//!
//! Oracle dispatch and batch analysis for fraudlens.
//!
//! `fraudlens-core` gathers evidence deterministically. This crate asks a
//! judgment oracle about it:
//!
//! - [`JudgmentDispatcher`] renders the prompt, calls the oracle under a
//!   timeout and normalizes the answer into a [`Verdict`]
//! - [`FraudAnalyzer`] picks the prompt variant per transaction and runs
//!   batches with bounded concurrency
//! - [`LlmOracle`] is the oracle backed by a hosted model
//!   (enable the `anthropic` feature for the Anthropic provider)
//!
//! ## Example
//!
//! ```rust,ignore
//! use fraudlens_runtime::{FraudAnalyzer, LlmOracle, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_yaml_file("fraudlens.yaml")?;
//! let oracle = LlmOracle::new(provider, config.completion_config());
//! let analyzer = FraudAnalyzer::builder()
//!     .retriever(retriever)
//!     .correlator(correlator)
//!     .oracle(Arc::new(oracle))
//!     .config(config)
//!     .build()?;
//!
//! for item in analyzer.analyze_batch(transactions).await {
//!     println!("{}: {:?}", item.index, item.outcome.map(|a| a.verdict.flag));
//! }
//! ```
//!
//! [`Verdict`]: fraudlens_core::Verdict

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod oracle;
pub mod prompts;
pub mod providers;
pub mod usage;

pub use analyzer::{Analysis, AnalyzerError, BatchItem, BatchSummary, FraudAnalyzer, FraudAnalyzerBuilder};
pub use cache::VerdictCache;
pub use config::{AnalysisMode, CacheConfig, ConfigError, RetryConfig, RuntimeConfig};
pub use dispatcher::{DispatchError, JudgmentDispatcher};
pub use oracle::{JsonMap, LlmOracle, Oracle, OracleError};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use usage::{LlmUsage, Reservation, UsageTracker};
