//! Token usage accounting and an optional global token budget.
//!
//! One tracker is shared by every oracle call of an analyzer, so a batch
//! can be capped in tokens regardless of how many workers run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::providers::TokenUsage;

/// A token ceiling.
#[derive(Debug)]
pub struct TokenBudget {
    max_tokens: u64,
    used: AtomicU64,
}

impl TokenBudget {
    pub fn new(max_tokens: u64) -> Self {
        Self {
            max_tokens,
            used: AtomicU64::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u64) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u64) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    /// Atomically claim `tokens`; fails without side effects if they do
    /// not fit in what is left.
    pub fn try_reserve(&self, tokens: u64) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(tokens).filter(|total| *total <= self.max_tokens)
            })
            .is_ok()
    }

    /// Replace a reservation with the tokens actually spent.
    pub fn settle(&self, reserved: u64, actual: u64) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_sub(reserved).saturating_add(actual))
            });
    }

    /// Give back an unused reservation.
    pub fn release(&self, reserved: u64) {
        self.settle(reserved, 0);
    }

    pub fn remaining(&self) -> u64 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Accumulated oracle usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LlmUsage {
    pub calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.calls += 1;
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total());
        self.estimated_cost += estimate_cost(usage, model);
    }
}

/// USD estimate from per-million-token list prices.
fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
    let (input_rate, output_rate) = match model {
        m if m.contains("opus") => (15.0, 75.0),
        m if m.contains("haiku") => (1.0, 5.0),
        _ => (3.0, 15.0),
    };

    (f64::from(usage.prompt_tokens) / 1_000_000.0) * input_rate
        + (f64::from(usage.completion_tokens) / 1_000_000.0) * output_rate
}

/// Shared usage tracker.
#[derive(Debug, Default)]
pub struct UsageTracker {
    budget: Option<TokenBudget>,
    usage: RwLock<LlmUsage>,
}

impl UsageTracker {
    /// Tracker without a ceiling.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Tracker that refuses calls once `max_tokens` would be exceeded.
    pub fn with_budget(max_tokens: u64) -> Self {
        Self {
            budget: Some(TokenBudget::new(max_tokens)),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn from_budget(max_tokens: Option<u64>) -> Self {
        match max_tokens {
            Some(max) => Self::with_budget(max),
            None => Self::unlimited(),
        }
    }

    pub fn can_afford(&self, estimated_tokens: u64) -> bool {
        self.budget
            .as_ref()
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true)
    }

    /// Claim `estimated_tokens` of the budget for one call.
    ///
    /// `None` when the budget cannot cover it. Dropping the reservation
    /// without settling returns the tokens.
    pub fn try_reserve(&self, estimated_tokens: u64) -> Option<Reservation<'_>> {
        if let Some(budget) = &self.budget {
            if !budget.try_reserve(estimated_tokens) {
                return None;
            }
        }
        Some(Reservation {
            tracker: self,
            tokens: estimated_tokens,
        })
    }

    pub fn record(&self, usage: &TokenUsage, model: &str) {
        if let Some(budget) = &self.budget {
            budget.record(u64::from(usage.total()));
        }
        self.usage.write().add(usage, model);
    }

    pub fn snapshot(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    /// Remaining budget, if one is set.
    pub fn remaining(&self) -> Option<u64> {
        self.budget.as_ref().map(TokenBudget::remaining)
    }
}

/// Budget held for one in-flight call.
#[derive(Debug)]
pub struct Reservation<'a> {
    tracker: &'a UsageTracker,
    tokens: u64,
}

impl Reservation<'_> {
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Charge what the call actually used in place of the estimate.
    pub fn settle(mut self, usage: &TokenUsage, model: &str) {
        let reserved = std::mem::take(&mut self.tokens);
        if let Some(budget) = &self.tracker.budget {
            budget.settle(reserved, u64::from(usage.total()));
        }
        self.tracker.usage.write().add(usage, model);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.tokens > 0 {
            if let Some(budget) = &self.tracker.budget {
                budget.release(self.tokens);
            }
        }
    }
}
