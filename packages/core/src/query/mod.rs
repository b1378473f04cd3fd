//! Query compilation
//!
//! Condition trees compile into Datalog clause lists (`compiler`), which the
//! `builder` assembles into complete query strings around node and page
//! projections. All interpolated text passes through `literal`.

pub mod builder;
pub mod compiler;
pub mod literal;

pub use builder::{anchor_clause, children_query, nodes_by_id_query, NodeProjection, QueryBuilder};
pub use compiler::{CompileOptions, CompiledClauses, QueryCompiler};
