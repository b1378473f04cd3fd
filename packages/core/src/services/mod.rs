//! Search Services
//!
//! - `SearchService` - plain condition search and the shared query plumbing
//! - `HierarchySearchService` - the ten structural relationship operators
//! - `ConditionExpander` - semantic term expansion of condition trees
//! - `combine` - set algebra over stored result sets
//! - `ResultStore` - lookup of previously produced results
//! - `SearchContext` - request-scoped counters and warnings
//!
//! Services receive their backend and configuration at construction and keep
//! no process-wide state.

pub mod combinator;
pub mod context;
pub mod error;
pub mod expansion;
pub mod hierarchy_service;
pub mod result_store;
pub mod search_service;

pub use combinator::{
    combine, CombineOptions, CombineOutput, CombineStats, ResultOrdering, SetOperation,
};
pub use context::{SearchContext, SearchStats, SearchWarning};
pub use error::{Result, SearchError};
pub use expansion::{clean_term, ConditionExpander};
pub use hierarchy_service::{
    normalize_hierarchy, HierarchyMatch, HierarchyRequest, HierarchyResponse,
    HierarchySearchService, MatchTier,
};
pub use result_store::{
    resolve_result_reference, suggest_reference, InMemoryResultStore, ResultRecord, ResultStore,
};
pub use search_service::{PageSummary, SearchService};
