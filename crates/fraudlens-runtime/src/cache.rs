//! In-memory verdict cache.
//!
//! A rendered prompt fully determines what the oracle sees, so verdicts
//! are keyed by a hash of `(variant, instructions, prompt)`.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use fraudlens_core::{PromptVariant, Verdict};

/// Key for one oracle question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(variant: PromptVariant, system_instructions: &str, prompt: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        variant.hash(&mut hasher);
        system_instructions.hash(&mut hasher);
        prompt.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Verdict cache backed by moka.
pub struct VerdictCache {
    cache: Cache<CacheKey, Verdict>,
}

impl VerdictCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Verdict> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, verdict: Verdict) {
        self.cache.insert(key, verdict).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate; moka applies writes lazily.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}

impl std::fmt::Debug for VerdictCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdictCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_every_input() {
        let base = CacheKey::new(PromptVariant::Simple, "sys", "prompt");
        assert_eq!(base, CacheKey::new(PromptVariant::Simple, "sys", "prompt"));
        assert_ne!(base, CacheKey::new(PromptVariant::Contextual, "sys", "prompt"));
        assert_ne!(base, CacheKey::new(PromptVariant::Simple, "other", "prompt"));
        assert_ne!(base, CacheKey::new(PromptVariant::Simple, "sys", "prompt 2"));
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = VerdictCache::default();
        let key = CacheKey::new(PromptVariant::Simple, "sys", "prompt");
        let verdict = Verdict {
            flag: true,
            reason: "sem nota fiscal".to_string(),
            ..Default::default()
        };

        assert!(cache.get(&key).await.is_none());
        cache.insert(key, verdict.clone()).await;
        assert_eq!(cache.get(&key).await, Some(verdict));

        cache.invalidate_all();
        assert!(cache.get(&key).await.is_none());
    }
}
