//! fraudlens command line.
//!
//! ```text
//! fraudlens analyze --transactions tx.json --policies policy.md --emails emails.txt
//! fraudlens explain --transactions tx.json --policies policy.md --emails emails.txt --id TX-7
//! ```
//!
//! Reports go to stdout; logs go to stderr (`RUST_LOG` controls the level).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fraudlens_core::{
    build_query, load_transactions, EmailCorpus, EmailCorrelator, LineMatch, PolicyCorpus,
    PolicyPassage, PolicyRetriever, Transaction,
};
use fraudlens_runtime::{
    AnalysisMode, BatchItem, BatchSummary, FraudAnalyzer, LlmOracle, LlmUsage, ProviderRegistry,
    RuntimeConfig, UsageTracker,
};

#[derive(Parser)]
#[command(name = "fraudlens", author, version, about = "Policy and correspondence aware transaction triage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge every transaction and print a report
    Analyze {
        #[command(flatten)]
        sources: Sources,

        /// YAML runtime config
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Policy passages per transaction
        #[arg(long)]
        top_k: Option<usize>,

        /// Transactions analyzed at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Oracle deadline, e.g. "30s"
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,

        /// Include the evidence shown to the oracle
        #[arg(long)]
        include_bundle: bool,

        /// LLM provider
        #[arg(long, default_value = "anthropic")]
        provider: String,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Show the evidence gathered for transactions, without an oracle
    Explain {
        #[command(flatten)]
        sources: Sources,

        /// Only this transaction id
        #[arg(long)]
        id: Option<String>,

        #[arg(long, default_value_t = 4)]
        top_k: usize,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Args)]
struct Sources {
    /// JSON or YAML list of transactions
    #[arg(long)]
    transactions: PathBuf,

    /// Policy document, passages separated by blank lines
    #[arg(long)]
    policies: PathBuf,

    /// Internal correspondence, one line per entry
    #[arg(long)]
    emails: Option<PathBuf>,
}

impl Sources {
    fn load(&self) -> Result<(Vec<Transaction>, PolicyRetriever, Option<EmailCorrelator>)> {
        let transactions = load_transactions(&self.transactions)?;
        let retriever = PolicyRetriever::new(Arc::new(PolicyCorpus::from_file(&self.policies)?));
        let correlator = match &self.emails {
            Some(path) => Some(EmailCorrelator::new(Arc::new(EmailCorpus::from_file(path)?))),
            None => None,
        };
        Ok((transactions, retriever, correlator))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Simple,
    Contextual,
    Auto,
}

impl From<ModeArg> for AnalysisMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Simple => AnalysisMode::Simple,
            ModeArg::Contextual => AnalysisMode::Contextual,
            ModeArg::Auto => AnalysisMode::Auto,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: BatchSummary,
    usage: LlmUsage,
    results: Vec<ReportEntry<'a>>,
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<&'a str>,
    #[serde(flatten)]
    outcome: EntryOutcome<'a>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum EntryOutcome<'a> {
    Ok { analysis: &'a fraudlens_runtime::Analysis },
    Error { error: String },
}

impl<'a> From<&'a BatchItem> for ReportEntry<'a> {
    fn from(item: &'a BatchItem) -> Self {
        let outcome = match &item.outcome {
            Ok(analysis) => EntryOutcome::Ok { analysis },
            Err(e) => EntryOutcome::Error {
                error: e.to_string(),
            },
        };
        Self {
            index: item.index,
            transaction_id: item.transaction_id.as_deref(),
            outcome,
        }
    }
}

#[derive(Serialize)]
struct Explanation {
    transaction: Transaction,
    query: String,
    passages: Vec<PolicyPassage>,
    matches: Vec<LineMatch>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            sources,
            config,
            mode,
            top_k,
            concurrency,
            timeout,
            include_bundle,
            provider,
            format,
        } => {
            let mut config = match config {
                Some(path) => RuntimeConfig::from_yaml_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            if let Some(mode) = mode {
                config.mode = mode.into();
            }
            if let Some(top_k) = top_k {
                config.top_k = top_k;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(timeout) = timeout {
                config.oracle_timeout = timeout;
            }
            config.include_bundle |= include_bundle;

            analyze(&sources, config, &provider, format).await
        }
        Commands::Explain {
            sources,
            id,
            top_k,
            format,
        } => explain(&sources, id.as_deref(), top_k, format),
    }
}

async fn analyze(
    sources: &Sources,
    config: RuntimeConfig,
    provider_type: &str,
    format: Format,
) -> Result<()> {
    let (transactions, retriever, correlator) = sources.load()?;

    let provider = ProviderRegistry::with_defaults()
        .create(provider_type, &serde_json::json!({}))
        .with_context(|| format!("creating provider '{}'", provider_type))?;
    let usage = Arc::new(UsageTracker::from_budget(config.token_budget));
    let oracle = LlmOracle::new(provider, config.completion_config()).with_usage(usage.clone());

    let mut builder = FraudAnalyzer::builder()
        .retriever(retriever)
        .oracle(Arc::new(oracle))
        .config(config);
    if let Some(correlator) = correlator {
        builder = builder.correlator(correlator);
    }
    let analyzer = builder.build()?;

    let items = analyzer.analyze_batch(transactions).await;
    let summary = BatchSummary::from_items(&items);
    tracing::info!(
        total = summary.total,
        flagged = summary.flagged,
        failed = summary.failed,
        "Batch finished"
    );

    let report = Report {
        summary,
        usage: usage.snapshot(),
        results: items.iter().map(ReportEntry::from).collect(),
    };
    emit(&report, format)
}

fn explain(sources: &Sources, id: Option<&str>, top_k: usize, format: Format) -> Result<()> {
    let (transactions, retriever, correlator) = sources.load()?;

    let selected: Vec<Transaction> = match id {
        Some(id) => {
            let found: Vec<Transaction> = transactions
                .into_iter()
                .filter(|tx| tx.id() == Some(id))
                .collect();
            if found.is_empty() {
                bail!("no transaction with id '{}'", id);
            }
            found
        }
        None => transactions,
    };

    let explanations: Vec<Explanation> = selected
        .into_iter()
        .map(|transaction| {
            let matches = correlator
                .as_ref()
                .map(|c| {
                    c.explain(
                        transaction.employee_name(),
                        transaction.amount(),
                        transaction.description(),
                    )
                })
                .unwrap_or_default();
            Explanation {
                query: build_query(&transaction),
                passages: retriever.retrieve_for(&transaction, top_k),
                matches,
                transaction,
            }
        })
        .collect();

    emit(&explanations, format)
}

fn emit<T: Serialize>(value: &T, format: Format) -> Result<()> {
    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(value)?,
        Format::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered);
    Ok(())
}
