//! Data Models
//!
//! - `Node`, `Page` - read-side views of the content store
//! - `SearchCondition`, `Condition`, `HierarchyCondition` - what to match
//! - `ResultSet` - named identifier sets for the combinator
//! - `SearchScope` - page/node restrictions applied to a search

pub mod condition;
mod node;
mod result_set;
mod scope;

pub use condition::{
    CombineMode, CompoundCondition, Condition, ConditionGroup, ConditionKind, HierarchyCondition,
    HierarchyOperator, MatchMode, SearchCondition,
};
pub use node::{Node, Page};
pub use result_set::{EntityKind, ResultSet};
pub use scope::SearchScope;
