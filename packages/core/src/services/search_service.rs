//! Search Service - Condition Search over a Content Backend
//!
//! Runs plain (non-hierarchical) condition searches and owns the plumbing
//! every other search shares: executing query text, attaching the query to
//! backend failures, projecting rows into [`Node`]s, and recording per-request
//! counters in the [`SearchContext`].
//!
//! # Pipeline
//!
//! `ConditionInput` -> normalize -> expand -> compile -> execute -> project
//!
//! # Examples
//!
//! ```rust,no_run
//! use outline_query_core::conditions::ConditionInput;
//! use outline_query_core::db::MemoryStore;
//! use outline_query_core::models::{SearchCondition, SearchScope};
//! use outline_query_core::services::{SearchContext, SearchService};
//! use outline_query_core::SearchConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = MemoryStore::new();
//! store.add_page("p1", "Project Alpha")?;
//! store.add_node("b1", "p1", None, "status: done")?;
//!
//! let service = SearchService::new(Arc::new(store), SearchConfig::default())?;
//! let mut ctx = SearchContext::new();
//! let nodes = service
//!     .find_nodes(
//!         &ConditionInput::single(SearchCondition::text("done")),
//!         &SearchScope::default(),
//!         &mut ctx,
//!     )
//!     .await?;
//! assert_eq!(nodes.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::conditions::{normalize, ConditionInput};
use crate::config::SearchConfig;
use crate::db::{ContentBackend, Tuple};
use crate::models::{Condition, Node, SearchScope};
use crate::query::{nodes_by_id_query, NodeProjection, QueryBuilder, QueryCompiler};
use crate::services::context::SearchContext;
use crate::services::error::{Result, SearchError};
use crate::services::expansion::ConditionExpander;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A page with the nodes on it that matched a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    pub matched_node_ids: Vec<String>,
}

/// Condition search over a [`ContentBackend`]
pub struct SearchService {
    backend: Arc<dyn ContentBackend>,
    expander: ConditionExpander,
    compiler: QueryCompiler,
    config: SearchConfig,
}

impl SearchService {
    /// Create a service with expansion disabled
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is invalid.
    pub fn new(backend: Arc<dyn ContentBackend>, config: SearchConfig) -> Result<Self> {
        config.validate().map_err(SearchError::validation)?;
        Ok(Self {
            backend,
            expander: ConditionExpander::disabled(),
            compiler: QueryCompiler::new(config.compile_options()),
            config,
        })
    }

    pub fn with_expander(mut self, expander: ConditionExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    pub fn expander(&self) -> &ConditionExpander {
        &self.expander
    }

    /// Nodes matching `input`, deduplicated, in backend order
    pub async fn find_nodes(
        &self,
        input: &ConditionInput,
        scope: &SearchScope,
        ctx: &mut SearchContext,
    ) -> Result<Vec<Node>> {
        let condition = self.prepare(input, ctx).await?;
        let mut nodes = self.find_matching(&condition, scope, ctx).await?;
        self.apply_limit(&mut nodes);
        tracing::info!(
            "Condition search '{}' matched {} nodes",
            condition.display_text(),
            nodes.len()
        );
        Ok(nodes)
    }

    /// Distinct pages owning nodes that match `input`
    pub async fn find_pages(
        &self,
        input: &ConditionInput,
        scope: &SearchScope,
        ctx: &mut SearchContext,
    ) -> Result<Vec<PageSummary>> {
        let condition = self.prepare(input, ctx).await?;
        let nodes = self.find_matching(&condition, scope, ctx).await?;

        let mut pages: Vec<PageSummary> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for node in nodes {
            match positions.get(&node.page_id) {
                Some(&index) => pages[index].matched_node_ids.push(node.id),
                None => {
                    positions.insert(node.page_id.clone(), pages.len());
                    pages.push(PageSummary {
                        id: node.page_id,
                        title: node.page_title,
                        matched_node_ids: vec![node.id],
                    });
                }
            }
        }
        self.apply_limit(&mut pages);
        Ok(pages)
    }

    /// Normalize and expand caller input into the tree that gets compiled
    pub async fn prepare(
        &self,
        input: &ConditionInput,
        ctx: &mut SearchContext,
    ) -> Result<Condition> {
        let condition = normalize(input)?;
        self.expander.expand(&condition, ctx).await
    }

    /// Nodes matching an already-canonical condition, without the result limit
    pub async fn find_matching(
        &self,
        condition: &Condition,
        scope: &SearchScope,
        ctx: &mut SearchContext,
    ) -> Result<Vec<Node>> {
        let var = self.config.node_var.as_str();
        let compiled = self.compiler.compile(condition, var)?;
        let scoped = self.compiler.compile_scope(scope, var)?;
        let projection = NodeProjection::new(var);

        let query = QueryBuilder::new()
            .find_all(projection.find_vars())
            .conditions(var, &compiled)
            .bound_conditions(&scoped)
            .clauses(projection.clauses())
            .build()?;

        let rows = self.execute(&query, ctx).await?;
        let nodes = rows_to_nodes(&rows, &query)?;
        ctx.record_matches(condition.display_text(), nodes.len());
        Ok(nodes)
    }

    /// Full nodes for `ids`, in the order given; unknown ids are skipped
    pub async fn fetch_nodes(&self, ids: &[String], ctx: &mut SearchContext) -> Result<Vec<Node>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = nodes_by_id_query(ids)?;
        let rows = self.execute(&query, ctx).await?;
        let mut by_id: HashMap<String, Node> = rows_to_nodes(&rows, &query)?
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Run query text, counting it and attaching it to any failure
    pub async fn execute(&self, query: &str, ctx: &mut SearchContext) -> Result<Vec<Tuple>> {
        ctx.record_query();
        tracing::debug!("Executing query: {}", query);
        self.backend.execute(query).await.map_err(|e| {
            tracing::warn!("Backend rejected query: {}", e);
            SearchError::backend_execution(e.to_string(), query)
        })
    }

    pub(crate) fn apply_limit<T>(&self, items: &mut Vec<T>) {
        if let Some(limit) = self.config.result_limit {
            items.truncate(limit);
        }
    }
}

/// Project node rows, keeping the first row per node id
pub(crate) fn rows_to_nodes(rows: &[Tuple], query: &str) -> Result<Vec<Node>> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(rows.len());
    for row in rows {
        let node = Node::from_row(row).map_err(|e| SearchError::backend_execution(e, query))?;
        if seen.insert(node.id.clone()) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}
