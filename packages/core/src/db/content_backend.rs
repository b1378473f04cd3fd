//! ContentBackend Trait - Query Execution Seam
//!
//! The search core never touches storage directly. It compiles conditions
//! into Datalog query text (see [`crate::query`]) and hands that text to a
//! `ContentBackend`, which returns one tuple per distinct `:find` binding.
//!
//! # Design Decisions
//!
//! 1. **Async-first**: every call is a suspension point, so remote graph
//!    databases and the in-memory store share one interface
//! 2. **Text in, tuples out**: tuples are `serde_json::Value` rows in
//!    `:find` order
//! 3. **Read-only**: no method mutates the store
//!
//! # Examples
//!
//! ```rust,no_run
//! use outline_query_core::db::{ContentBackend, MemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = MemoryStore::new();
//! store.add_page("p1", "Project Alpha")?;
//! store.add_node("b1", "p1", None, "status: done")?;
//!
//! let rows = store
//!     .execute(r#"[:find ?uid :where [?b :block/string "status: done"] [?b :block/uid ?uid]]"#)
//!     .await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::db::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One result row, values in `:find` order
pub type Tuple = Vec<Value>;

/// Executes Datalog query text against a content store
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; independent sub-searches are
/// issued concurrently against the same backend.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Run `query` and return its distinct result tuples
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be parsed or evaluated. Errors are
    /// surfaced to the caller unchanged; the search core does not retry.
    async fn execute(&self, query: &str) -> Result<Vec<Tuple>, BackendError>;
}

#[async_trait]
impl<T: ContentBackend + ?Sized> ContentBackend for Arc<T> {
    async fn execute(&self, query: &str) -> Result<Vec<Tuple>, BackendError> {
        (**self).execute(query).await
    }
}
