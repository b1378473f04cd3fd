//! Condition input handling
//!
//! - [`normalize`] - structured caller input to canonical condition trees
//! - [`parser`] - the legacy string expression language

pub mod normalize;
pub mod parser;

pub use normalize::{canonicalize, normalize, ConditionInput};
pub use parser::{parse_expression, parse_hierarchy_expression, ParsedExpression};
