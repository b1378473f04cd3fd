//! Outline Query Core - Hierarchical Relationship Search
//!
//! Finds nodes in page/node outlines by what they contain and by how they
//! sit relative to each other in the tree.
//!
//! # Architecture
//!
//! - **Single normalization boundary**: structured input and the legacy
//!   expression language both become one canonical condition tree
//! - **Datalog queries**: condition trees compile to Datascript-style
//!   `[:find .. :where ..]` text run by any [`db::ContentBackend`]
//! - **Request-scoped context**: match counts, query counts and recovered
//!   warnings travel in a [`services::SearchContext`], never in globals
//! - **Non-fatal expansion**: semantic term expansion falls back to the
//!   literal term when the expansion backend fails
//!
//! # Modules
//!
//! - [`models`] - Nodes, pages, conditions, result sets and scopes
//! - [`conditions`] - Input normalization and the expression parser
//! - [`query`] - Condition compiler and query assembly
//! - [`db`] - Content backend seam and the in-memory reference store
//! - [`services`] - Search, hierarchy search, expansion, combinator, result store
//! - [`config`] - Search configuration
//! - [`logging`] - Tracing subscriber setup

pub mod conditions;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod query;
pub mod services;

// Re-export commonly used types
pub use config::SearchConfig;
pub use models::*;
pub use services::*;
