//! ExpansionBackend Trait - Term Expansion Seam
//!
//! Search code depends on this trait only. An LLM-backed service, the bundled
//! [`LexicalExpander`](crate::LexicalExpander), or a test double can sit
//! behind it.

use crate::error::Result;
use crate::strategy::{ContextHints, ExpansionStrategy};
use async_trait::async_trait;
use std::sync::Arc;

/// Turns one term into an ordered list of alternative terms
///
/// # Contract
///
/// - The returned list is ordered by relevance and bounded in length.
/// - `ExpansionStrategy::All` runs fuzzy, synonyms, related concepts and
///   broader terms in that order.
/// - Failures are reported through `Err`; callers treat them as non-fatal.
#[async_trait]
pub trait ExpansionBackend: Send + Sync {
    async fn expand(
        &self,
        term: &str,
        strategy: ExpansionStrategy,
        hints: &ContextHints,
    ) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: ExpansionBackend + ?Sized> ExpansionBackend for Arc<T> {
    async fn expand(
        &self,
        term: &str,
        strategy: ExpansionStrategy,
        hints: &ContextHints,
    ) -> Result<Vec<String>> {
        (**self).expand(term, strategy, hints).await
    }
}
