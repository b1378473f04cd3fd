/// Outline Query Expansion - Term Widening for Structural Search
///
/// This crate defines the contract the search core uses to widen a search
/// term (`term + strategy -> ordered term list`) and ships an offline
/// implementation of it.
///
/// # Features
///
/// - **Pluggable backends**: anything implementing [`ExpansionBackend`]
/// - **Strategy chaining**: `all` runs fuzzy, synonyms, related concepts and broader terms
/// - **Offline expander**: inflection rules plus configurable thesaurus tables
/// - **LRU caching**: [`CachedExpander`] decorates any backend
///
/// # Example
///
/// ```ignore
/// use outline_query_expansion::{
///     CachedExpander, ContextHints, ExpansionBackend, ExpansionConfig, ExpansionStrategy,
///     LexicalExpander,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ExpansionConfig::default();
///     let capacity = config.cache_capacity;
///     let expander = CachedExpander::new(LexicalExpander::new(config)?, capacity);
///
///     let terms = expander
///         .expand("meeting", ExpansionStrategy::Fuzzy, &ContextHints::default())
///         .await?;
///     println!("{:?}", terms); // ["meetings", "meet", "meeted"]
///
///     Ok(())
/// }
/// ```
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod lexical;
pub mod strategy;

// Re-export main types
pub use backend::ExpansionBackend;
pub use cache::CachedExpander;
pub use config::{ExpansionConfig, Thesaurus};
pub use error::{ExpansionError, Result};
pub use lexical::{fuzzy_variants, LexicalExpander};
pub use strategy::{ContextHints, ExpansionStrategy};
