//! Assembly of complete `[:find ... :where ...]` query strings

use crate::models::Node;
use crate::query::compiler::CompiledClauses;
use crate::query::literal::string_literal;
use crate::services::error::{Result, SearchError};

/// Find variables and clauses that project a node binding into a `Node` row
///
/// Column order matches `Node::from_row`: uid, text, page uid, page title,
/// created, modified.
#[derive(Debug, Clone)]
pub struct NodeProjection {
    var: String,
}

impl NodeProjection {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    pub fn find_vars(&self) -> Vec<String> {
        let v = &self.var;
        let vars = vec![
            format!("{}-uid", v),
            format!("{}-str", v),
            format!("{}-pg-uid", v),
            format!("{}-pg-title", v),
            format!("{}-ct", v),
            format!("{}-et", v),
        ];
        debug_assert_eq!(vars.len(), Node::ROW_WIDTH);
        vars
    }

    pub fn clauses(&self) -> Vec<String> {
        let v = &self.var;
        vec![
            format!("[{v} :block/uid {v}-uid]", v = v),
            format!("[{v} :block/string {v}-str]", v = v),
            format!("[{v} :block/page {v}-pg]", v = v),
            format!("[{v}-pg :block/uid {v}-pg-uid]", v = v),
            format!("[{v}-pg :node/title {v}-pg-title]", v = v),
            format!("[{v} :create/time {v}-ct]", v = v),
            format!("[{v} :edit/time {v}-et]", v = v),
        ]
    }
}

/// Incremental query text builder
///
/// ```rust
/// use outline_query_core::query::{NodeProjection, QueryBuilder};
///
/// let projection = NodeProjection::new("?b");
/// let query = QueryBuilder::new()
///     .find_all(projection.find_vars())
///     .clauses(projection.clauses())
///     .build()
///     .unwrap();
/// assert!(query.starts_with("[:find ?b-uid"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    find: Vec<String>,
    clauses: Vec<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(mut self, var: impl Into<String>) -> Self {
        self.find.push(var.into());
        self
    }

    pub fn find_all<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.find.extend(vars);
        self
    }

    pub fn clause(mut self, clause: impl Into<String>) -> Self {
        self.clauses.push(clause.into());
        self
    }

    pub fn clauses<I>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.clauses.extend(clauses);
        self
    }

    /// Append compiled conditions for `var`, binding `var` to a node first
    /// when the fragments cannot
    pub fn conditions(mut self, var: &str, compiled: &CompiledClauses) -> Self {
        self.clauses.extend(compiled.definitions.iter().cloned());
        if compiled.needs_anchor() {
            self.clauses.push(anchor_clause(var));
        }
        self.clauses.extend(compiled.matches.iter().cloned());
        self
    }

    /// Append compiled conditions for a variable already bound earlier
    pub fn bound_conditions(mut self, compiled: &CompiledClauses) -> Self {
        self.clauses.extend(compiled.definitions.iter().cloned());
        self.clauses.extend(compiled.matches.iter().cloned());
        self
    }

    pub fn build(self) -> Result<String> {
        if self.find.is_empty() {
            return Err(SearchError::query_compilation("query has no find variables"));
        }
        if self.clauses.is_empty() {
            return Err(SearchError::query_compilation("query has no where clauses"));
        }
        Ok(format!(
            "[:find {} :where {}]",
            self.find.join(" "),
            self.clauses.join(" ")
        ))
    }
}

/// Binds `var` to every node (pages carry no `:block/page`)
pub fn anchor_clause(var: &str) -> String {
    format!("[{} :block/page {}-anchor]", var, var)
}

/// Direct children of the given parent uids as `[parent-uid child-uid]` rows
pub fn children_query(parent_ids: &[String]) -> Result<String> {
    if parent_ids.is_empty() {
        return Err(SearchError::query_compilation(
            "children query needs at least one parent id",
        ));
    }
    QueryBuilder::new()
        .find("?p-uid")
        .find("?c-uid")
        .clause(id_set(parent_ids, "?frontier"))
        .clause("[?p :block/uid ?p-uid]")
        .clause("[(contains? ?frontier ?p-uid)]")
        .clause("[?p :block/children ?c]")
        .clause("[?c :block/uid ?c-uid]")
        .build()
}

/// Full node rows for the given uids
pub fn nodes_by_id_query(ids: &[String]) -> Result<String> {
    if ids.is_empty() {
        return Err(SearchError::query_compilation(
            "node lookup needs at least one id",
        ));
    }
    let projection = NodeProjection::new("?b");
    QueryBuilder::new()
        .find_all(projection.find_vars())
        .clause(id_set(ids, "?wanted"))
        .clause("[?b :block/uid ?b-uid]")
        .clause("[(contains? ?wanted ?b-uid)]")
        .clauses(projection.clauses())
        .build()
}

fn id_set(ids: &[String], var: &str) -> String {
    let literals: Vec<String> = ids.iter().map(|id| string_literal(id)).collect();
    format!("[(hash-set {}) {}]", literals.join(" "), var)
}
