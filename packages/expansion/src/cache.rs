//! LRU caching decorator for expansion backends
//!
//! Repeated searches tend to expand the same handful of terms, and remote
//! expansion services are slow. `CachedExpander` remembers successful
//! expansions keyed by lowercase term and strategy.
//!
//! - **Only successes are cached**: failures are retried on the next call
//! - **`custom` bypasses the cache**: its output depends on the hints
//! - **Bounded**: least recently used entries are evicted at capacity

use crate::backend::ExpansionBackend;
use crate::error::Result;
use crate::strategy::{ContextHints, ExpansionStrategy};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

type CacheKey = (String, ExpansionStrategy);

pub struct CachedExpander<B> {
    inner: B,
    cache: Mutex<LruCache<CacheKey, Vec<String>>>,
}

impl<B: ExpansionBackend> CachedExpander<B> {
    /// Wrap `inner` with a cache holding at most `capacity` expansions
    ///
    /// A zero capacity is treated as one.
    pub fn new(inner: B, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Number of cached expansions
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }
}

#[async_trait]
impl<B: ExpansionBackend> ExpansionBackend for CachedExpander<B> {
    async fn expand(
        &self,
        term: &str,
        strategy: ExpansionStrategy,
        hints: &ContextHints,
    ) -> Result<Vec<String>> {
        if strategy == ExpansionStrategy::Custom {
            return self.inner.expand(term, strategy, hints).await;
        }

        let key = (term.trim().to_lowercase(), strategy);
        if let Some(hit) = self.cache.lock().await.get(&key) {
            tracing::debug!("Expansion cache hit for '{}' ({})", term, strategy);
            return Ok(hit.clone());
        }

        let terms = self.inner.expand(term, strategy, hints).await?;
        self.cache.lock().await.put(key, terms.clone());
        Ok(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpansionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails for the term "broken"
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExpansionBackend for CountingBackend {
        async fn expand(
            &self,
            term: &str,
            _strategy: ExpansionStrategy,
            hints: &ContextHints,
        ) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if term == "broken" {
                return Err(ExpansionError::backend("service down"));
            }
            let mut terms = vec![format!("{}-variant", term)];
            terms.extend(hints.custom_terms.iter().cloned());
            Ok(terms)
        }
    }

    fn cached(capacity: usize) -> CachedExpander<CountingBackend> {
        CachedExpander::new(
            CountingBackend {
                calls: AtomicUsize::new(0),
            },
            capacity,
        )
    }

    #[test]
    fn test_repeated_expansion_hits_cache() {
        let expander = cached(4);
        let hints = ContextHints::default();

        tokio_test::block_on(async {
            let first = expander
                .expand("Alpha", ExpansionStrategy::Synonyms, &hints)
                .await
                .unwrap();
            let second = expander
                .expand("alpha ", ExpansionStrategy::Synonyms, &hints)
                .await
                .unwrap();
            assert_eq!(first, second);
            assert_eq!(expander.inner().calls.load(Ordering::SeqCst), 1);

            expander
                .expand("alpha", ExpansionStrategy::Fuzzy, &hints)
                .await
                .unwrap();
            assert_eq!(expander.inner().calls.load(Ordering::SeqCst), 2);
            assert_eq!(expander.len().await, 2);
        });
    }

    #[test]
    fn test_failures_are_not_cached() {
        let expander = cached(4);
        let hints = ContextHints::default();

        tokio_test::block_on(async {
            assert!(expander
                .expand("broken", ExpansionStrategy::Fuzzy, &hints)
                .await
                .is_err());
            assert!(expander
                .expand("broken", ExpansionStrategy::Fuzzy, &hints)
                .await
                .is_err());
            assert_eq!(expander.inner().calls.load(Ordering::SeqCst), 2);
            assert!(expander.is_empty().await);
        });
    }

    #[test]
    fn test_custom_strategy_bypasses_cache() {
        let expander = cached(4);

        tokio_test::block_on(async {
            let a = expander
                .expand(
                    "term",
                    ExpansionStrategy::Custom,
                    &ContextHints::with_custom_terms(["one"]),
                )
                .await
                .unwrap();
            let b = expander
                .expand(
                    "term",
                    ExpansionStrategy::Custom,
                    &ContextHints::with_custom_terms(["two"]),
                )
                .await
                .unwrap();
            assert_ne!(a, b);
            assert!(expander.is_empty().await);
        });
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let expander = cached(1);
        let hints = ContextHints::default();

        tokio_test::block_on(async {
            expander
                .expand("a1", ExpansionStrategy::Fuzzy, &hints)
                .await
                .unwrap();
            expander
                .expand("b1", ExpansionStrategy::Fuzzy, &hints)
                .await
                .unwrap();
            expander
                .expand("a1", ExpansionStrategy::Fuzzy, &hints)
                .await
                .unwrap();
            assert_eq!(expander.inner().calls.load(Ordering::SeqCst), 3);
            assert_eq!(expander.len().await, 1);
        });
    }
}
