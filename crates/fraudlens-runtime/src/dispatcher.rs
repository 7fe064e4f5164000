//! Judgment dispatch: render, ask the oracle, normalize.
//!
//! The dispatcher never retries. A timeout or oracle failure surfaces as a
//! [`DispatchError`] and the caller decides what to do with it.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use fraudlens_core::{EvidenceBundle, PromptVariant, Verdict};

use crate::cache::{CacheKey, VerdictCache};
use crate::oracle::{Oracle, OracleError};
use crate::prompts::{render_prompt, system_instructions};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Oracle did not answer within {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// Timeouts and transient provider failures may succeed on retry;
    /// malformed output never will.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Timeout(_) => true,
            DispatchError::Oracle(e) => e.is_transient(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DispatchError::Oracle(OracleError::MalformedResponse(_)))
    }
}

pub struct JudgmentDispatcher {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
    cache: Option<Arc<VerdictCache>>,
}

impl JudgmentDispatcher {
    pub fn new(oracle: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self {
            oracle,
            timeout,
            cache: None,
        }
    }

    /// Reuse verdicts for identical prompts.
    pub fn with_cache(mut self, cache: Arc<VerdictCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Judge one bundle under `variant`.
    ///
    /// Any parsed answer yields a verdict, however incomplete. Only
    /// unparsable output, provider failures and the deadline are errors.
    pub async fn dispatch(
        &self,
        bundle: &EvidenceBundle,
        variant: PromptVariant,
    ) -> Result<Verdict, DispatchError> {
        let instructions = system_instructions(variant);
        let prompt = render_prompt(bundle, variant);

        let key = CacheKey::new(variant, instructions, &prompt);
        if let Some(cache) = &self.cache {
            if let Some(verdict) = cache.get(&key).await {
                tracing::debug!(%variant, "Verdict served from cache");
                return Ok(verdict);
            }
        }

        let answer = match tokio::time::timeout(self.timeout, self.oracle.judge(instructions, &prompt))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    oracle = self.oracle.name(),
                    timeout = ?self.timeout,
                    "Oracle call timed out"
                );
                return Err(DispatchError::Timeout(self.timeout));
            }
        };

        let verdict = Verdict::from_response(&answer, variant);
        tracing::debug!(
            oracle = self.oracle.name(),
            %variant,
            flag = verdict.flag,
            evidence = verdict.evidence.len(),
            "Verdict normalized"
        );

        if let Some(cache) = &self.cache {
            cache.insert(key, verdict.clone()).await;
        }
        Ok(verdict)
    }
}

impl std::fmt::Debug for JudgmentDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgmentDispatcher")
            .field("oracle", &self.oracle.name())
            .field("timeout", &self.timeout)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::JsonMap;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use fraudlens_core::{
        assemble, gather_evidence, EmailCorpus, EmailCorrelator, PolicyCorpus, PolicyRetriever,
        Transaction,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed answer and remembers every prompt.
    struct StubOracle {
        answer: Result<JsonMap, fn() -> OracleError>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl StubOracle {
        fn answering(answer: serde_json::Value) -> Self {
            let map = match answer {
                serde_json::Value::Object(map) => map,
                _ => panic!("stub answers must be objects"),
            };
            Self {
                answer: Ok(map),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: fn() -> OracleError) -> Self {
            Self {
                answer: Err(error),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn judge(&self, system_instructions: &str, prompt: &str) -> Result<JsonMap, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .push((system_instructions.to_string(), prompt.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.answer {
                Ok(map) => Ok(map.clone()),
                Err(make) => Err(make()),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn bundle() -> EvidenceBundle {
        assemble(&Transaction::new().with("amount", "10"), vec![], vec![])
    }

    #[tokio::test]
    async fn test_simple_dispatch_normalizes() {
        let oracle = Arc::new(StubOracle::answering(json!({
            "violation": true,
            "reason": "acima do limite",
            "policy_evidence": ["limite de 500"],
            "confidence": 0.9
        })));
        let dispatcher = JudgmentDispatcher::new(oracle.clone(), Duration::from_secs(5));

        let verdict = dispatcher.dispatch(&bundle(), PromptVariant::Simple).await.unwrap();
        assert!(verdict.flag);
        assert_eq!(verdict.reason, "acima do limite");
        assert_eq!(verdict.evidence, vec!["limite de 500".to_string()]);

        let prompts = oracle.prompts.lock();
        assert_eq!(prompts[0].0, system_instructions(PromptVariant::Simple));
    }

    #[tokio::test]
    async fn test_incomplete_answer_is_not_an_error() {
        let oracle = Arc::new(StubOracle::answering(json!({"violation": "yes"})));
        let dispatcher = JudgmentDispatcher::new(oracle, Duration::from_secs(5));

        let verdict = dispatcher.dispatch(&bundle(), PromptVariant::Simple).await.unwrap();
        assert_eq!(verdict, Verdict::default());
    }

    #[tokio::test]
    async fn test_malformed_is_surfaced_without_retry() {
        let oracle = Arc::new(StubOracle::failing(|| {
            OracleError::MalformedResponse("garbage".to_string())
        }));
        let dispatcher = JudgmentDispatcher::new(oracle.clone(), Duration::from_secs(5));

        let err = dispatcher
            .dispatch(&bundle(), PromptVariant::Contextual)
            .await
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(!err.is_transient());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_transient() {
        let oracle = Arc::new(StubOracle::failing(|| {
            OracleError::Provider(ProviderError::RateLimited { retry_after: None })
        }));
        let dispatcher = JudgmentDispatcher::new(oracle.clone(), Duration::from_secs(5));

        let err = dispatcher.dispatch(&bundle(), PromptVariant::Simple).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_deterministically() {
        let oracle = Arc::new(
            StubOracle::answering(json!({"violation": true})).delayed(Duration::from_secs(60)),
        );
        let dispatcher = JudgmentDispatcher::new(oracle, Duration::from_secs(2));

        let err = dispatcher.dispatch(&bundle(), PromptVariant::Simple).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(d) if d == Duration::from_secs(2)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_cache_skips_second_call() {
        let oracle = Arc::new(StubOracle::answering(json!({"violation": false})));
        let dispatcher = JudgmentDispatcher::new(oracle.clone(), Duration::from_secs(5))
            .with_cache(Arc::new(VerdictCache::default()));

        let first = dispatcher.dispatch(&bundle(), PromptVariant::Simple).await.unwrap();
        let second = dispatcher.dispatch(&bundle(), PromptVariant::Simple).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);

        // A different variant is a different question.
        dispatcher
            .dispatch(&bundle(), PromptVariant::Contextual)
            .await
            .unwrap();
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pam_beesly_contextual_flow() {
        let policy = PolicyCorpus::from_text(
            "Reembolso requer nota fiscal.\n\nViagens exigem aprovacao previa do gerente.",
            "policy.md",
        );
        let emails = EmailCorpus::from_text(
            "De: Pam Beesly\n\
             Assunto: almoco\n\
             Vou lancar os 3500.00 como material de escritorio, ninguem confere.\n\
             Reuniao de vendas amanha.",
        );
        let retriever = PolicyRetriever::new(Arc::new(policy));
        let correlator = EmailCorrelator::new(Arc::new(emails));
        let tx = Transaction::new()
            .with("id", "TX-42")
            .with("employee_name", "Pam Beesly")
            .with("amount", "3500.00")
            .with("description", "Material de escritorio")
            .with("category", "Escritorio");

        let bundle = gather_evidence(&retriever, Some(&correlator), &tx, 4);
        assert_eq!(bundle.matched_lines.len(), 2);

        let oracle = Arc::new(StubOracle::answering(json!({
            "fraud_suspected": true,
            "reason": "sem nota fiscal",
            "policy_evidence": ["reembolso requer nota fiscal"],
            "email_evidence": ["ninguem confere"]
        })));
        let dispatcher = JudgmentDispatcher::new(oracle.clone(), Duration::from_secs(5));

        let verdict = dispatcher.dispatch(&bundle, PromptVariant::Contextual).await.unwrap();
        assert!(verdict.flag);
        assert_eq!(verdict.reason, "sem nota fiscal");
        assert_eq!(verdict.evidence, vec!["reembolso requer nota fiscal".to_string()]);
        assert_eq!(verdict.correspondence_evidence, vec!["ninguem confere".to_string()]);

        let prompts = oracle.prompts.lock();
        let (instructions, prompt) = &prompts[0];
        assert!(instructions.contains("fraud_suspected"));
        assert!(prompt.contains("- employee_name: Pam Beesly"));
        assert!(prompt.contains("De: Pam Beesly\nVou lancar os 3500.00"));
    }

    #[tokio::test]
    async fn test_unapproved_reimbursement_end_to_end() {
        let policy = PolicyCorpus::from_text(
            "Todo reembolso requer nota fiscal.\n\nViagens exigem aprovacao previa do gerente.",
            "policy.md",
        );
        let emails = EmailCorpus::from_text(
            "Bom dia a todos\n\
             Pam Beesly: reembolso de 3500.00 aprovado informalmente sem nota fiscal\n\
             Reuniao de vendas amanha",
        );
        let retriever = PolicyRetriever::new(Arc::new(policy));
        let correlator = EmailCorrelator::new(Arc::new(emails));
        let tx = Transaction::new()
            .with("employee_name", "Pam Beesly")
            .with("amount", "3500.00")
            .with("description", "Reembolso Viagem Cliente");

        let bundle = gather_evidence(&retriever, Some(&correlator), &tx, 4);
        let texts: Vec<&str> = bundle.matched_lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Pam Beesly: reembolso de 3500.00 aprovado informalmente sem nota fiscal"]
        );

        let oracle = Arc::new(StubOracle::answering(json!({
            "fraud_suspected": true,
            "reason": "sem nota fiscal",
            "policy_evidence": ["reembolso requer nota fiscal"]
        })));
        let dispatcher = JudgmentDispatcher::new(oracle.clone(), Duration::from_secs(5));

        let verdict = dispatcher.dispatch(&bundle, PromptVariant::Contextual).await.unwrap();
        assert!(verdict.flag);
        assert_eq!(verdict.reason, "sem nota fiscal");
        assert_eq!(verdict.evidence, vec!["reembolso requer nota fiscal".to_string()]);

        let prompts = oracle.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0]
            .1
            .contains("Pam Beesly: reembolso de 3500.00 aprovado informalmente sem nota fiscal"));
    }
}
