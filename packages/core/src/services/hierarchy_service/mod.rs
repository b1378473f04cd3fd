//! Hierarchy Search Service - Structural Relationship Queries
//!
//! Finds nodes related to each other through the page/node tree: direct
//! parent/child, ancestor/descendant within a depth limit, and the flexible
//! and bidirectional variants that also accept a single node matching both
//! sides.
//!
//! # Architecture
//!
//! - **Single normalization boundary**: expression and structured requests
//!   both become a [`HierarchyCondition`] in [`normalize_hierarchy`]
//! - **Links**: every operator reduces to ancestor/descendant pairs between
//!   an upper and a lower condition (see `traversal`)
//!   - depth 1 runs one join query over `:block/children`
//!   - deeper relations search both sides concurrently, then walk the
//!     children of the upper matches one level per backend round trip
//! - **Tiers**: flexible and bidirectional operators merge same-node hits,
//!   forward links and reverse links (see `tiers`)
//!
//! | operator | reported node | tiers |
//! |---|---|---|
//! | `>` / `>>` | left (parent/ancestor) | forward |
//! | `<` / `<<` | left (child/descendant) | forward |
//! | `=>` / `=>>` | left | same node, forward |
//! | `<=` / `<<=` | left (child/descendant) | same node, reverse |
//! | `<=>` / `<<=>>` | structurally highest of each pair | same node, forward, reverse |
//!
//! # Examples
//!
//! ```rust,no_run
//! use outline_query_core::db::MemoryStore;
//! use outline_query_core::services::{HierarchyRequest, HierarchySearchService};
//! use outline_query_core::SearchConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = MemoryStore::new();
//! store.add_page("p", "Projects")?;
//! store.add_node("x", "p", None, "Project Alpha")?;
//! store.add_node("y", "p", Some("x"), "status: done")?;
//!
//! let service = HierarchySearchService::new(Arc::new(store), SearchConfig::default())?;
//! let response = service
//!     .search(&HierarchyRequest::expression("Alpha > done"))
//!     .await?;
//! assert_eq!(response.matches[0].child_id.as_deref(), Some("y"));
//! # Ok(())
//! # }
//! ```

mod tiers;
mod traversal;

use crate::conditions::{canonicalize, normalize, parse_hierarchy_expression, ConditionInput};
use crate::config::SearchConfig;
use crate::db::ContentBackend;
use crate::models::{Condition, HierarchyCondition, HierarchyOperator, Node, SearchScope};
use crate::services::context::{SearchContext, SearchStats};
use crate::services::error::{Result, SearchError};
use crate::services::expansion::ConditionExpander;
use crate::services::search_service::SearchService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tiers::{merge_bidirectional, merge_flexible, report_lower, report_upper, same_node_matches};
use traversal::{Links, Reach};

/// Hierarchy search input
///
/// Either a legacy expression such as `"Alpha >> -done"` or a structured
/// operator with two condition inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HierarchyRequest {
    #[serde(rename_all = "camelCase")]
    Expression {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
        #[serde(default)]
        scope: SearchScope,
    },
    #[serde(rename_all = "camelCase")]
    Structured {
        operator: HierarchyOperator,
        left: ConditionInput,
        right: ConditionInput,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
        #[serde(default)]
        scope: SearchScope,
    },
}

impl HierarchyRequest {
    pub fn expression(expression: impl Into<String>) -> Self {
        HierarchyRequest::Expression {
            expression: expression.into(),
            max_depth: None,
            scope: SearchScope::default(),
        }
    }

    pub fn structured(
        operator: HierarchyOperator,
        left: impl Into<ConditionInput>,
        right: impl Into<ConditionInput>,
    ) -> Self {
        HierarchyRequest::Structured {
            operator,
            left: left.into(),
            right: right.into(),
            max_depth: None,
            scope: SearchScope::default(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        match &mut self {
            HierarchyRequest::Expression { max_depth, .. }
            | HierarchyRequest::Structured { max_depth, .. } => *max_depth = Some(depth),
        }
        self
    }

    pub fn with_scope(mut self, new_scope: SearchScope) -> Self {
        match &mut self {
            HierarchyRequest::Expression { scope, .. }
            | HierarchyRequest::Structured { scope, .. } => *scope = new_scope,
        }
        self
    }

    pub fn scope(&self) -> &SearchScope {
        match self {
            HierarchyRequest::Expression { scope, .. }
            | HierarchyRequest::Structured { scope, .. } => scope,
        }
    }
}

/// Turn either request shape into a canonical [`HierarchyCondition`]
///
/// # Errors
///
/// Returns `Validation` for unparseable expressions, expressions without an
/// operator, invalid condition input, or `max_depth == 0`.
pub fn normalize_hierarchy(request: &HierarchyRequest) -> Result<HierarchyCondition> {
    let condition = match request {
        HierarchyRequest::Expression {
            expression,
            max_depth,
            ..
        } => parse_hierarchy_expression(expression, *max_depth)?,
        HierarchyRequest::Structured {
            operator,
            left,
            right,
            max_depth,
            ..
        } => HierarchyCondition {
            operator: *operator,
            left: normalize(left)?,
            right: normalize(right)?,
            max_depth: *max_depth,
        },
    };

    if condition.max_depth == Some(0) {
        return Err(SearchError::validation("maxDepth must be at least 1"));
    }
    Ok(condition)
}

/// How a hierarchy match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// The node matches both sides itself
    SameNode,
    /// Left condition above right condition
    Forward,
    /// Right condition above left condition
    Reverse,
}

/// A reported node and the nodes that put it in the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyMatch {
    pub node: Node,
    pub tier: MatchTier,
    /// First related node below the reported node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_id: Option<String>,
    /// First related node above the reported node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Every related node, in discovery order
    #[serde(default)]
    pub related_ids: Vec<String>,
    /// Levels between the reported node and its nearest related node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyResponse {
    pub operator: HierarchyOperator,
    pub matches: Vec<HierarchyMatch>,
    pub total: usize,
    pub stats: SearchStats,
}

/// Relationship search over a [`ContentBackend`]
pub struct HierarchySearchService {
    search: SearchService,
}

impl HierarchySearchService {
    /// # Errors
    ///
    /// Returns a validation error if `config` is invalid.
    pub fn new(backend: Arc<dyn ContentBackend>, config: SearchConfig) -> Result<Self> {
        Ok(Self {
            search: SearchService::new(backend, config)?,
        })
    }

    pub fn from_search_service(search: SearchService) -> Self {
        Self { search }
    }

    pub fn with_expander(self, expander: ConditionExpander) -> Self {
        Self {
            search: self.search.with_expander(expander),
        }
    }

    pub fn search_service(&self) -> &SearchService {
        &self.search
    }

    /// Normalize, expand and run a hierarchy request
    pub async fn search(&self, request: &HierarchyRequest) -> Result<HierarchyResponse> {
        let mut ctx = SearchContext::new();
        let condition = normalize_hierarchy(request)?;

        let expander = self.search.expander();
        let condition = HierarchyCondition {
            left: expander.expand(&condition.left, &mut ctx).await?,
            right: expander.expand(&condition.right, &mut ctx).await?,
            ..condition
        };

        let matches = self.execute(&condition, request.scope(), &mut ctx).await?;
        tracing::info!(
            "Hierarchy search '{} {} {}' returned {} matches",
            condition.left.display_text(),
            condition.operator,
            condition.right.display_text(),
            matches.len()
        );

        Ok(HierarchyResponse {
            operator: condition.operator,
            total: matches.len(),
            matches,
            stats: ctx.finish(),
        })
    }

    /// Run an already-normalized hierarchy condition
    ///
    /// `scope` is applied to the reported nodes; the result limit applies last.
    pub async fn execute(
        &self,
        condition: &HierarchyCondition,
        scope: &SearchScope,
        ctx: &mut SearchContext,
    ) -> Result<Vec<HierarchyMatch>> {
        let left = &condition.left;
        let right = &condition.right;
        let reach = if condition.operator.is_deep() {
            Reach::Depth(self.search.config().effective_depth(condition.max_depth))
        } else {
            Reach::Direct
        };
        tracing::debug!("Dispatching {} with {:?}", condition.operator, reach);

        let mut matches = match condition.operator {
            HierarchyOperator::ParentOf | HierarchyOperator::AncestorOf => {
                let links = self.links(left, right, reach, ctx).await?;
                report_upper(&links, MatchTier::Forward)
            }
            HierarchyOperator::ChildOf | HierarchyOperator::DescendantOf => {
                let links = self.links(right, left, reach, ctx).await?;
                report_lower(&links, MatchTier::Forward)
            }
            HierarchyOperator::FlexibleParentOf | HierarchyOperator::FlexibleAncestorOf => {
                let links = (left, right, MatchTier::Forward);
                self.flexible(links, reach, report_upper, ctx).await?
            }
            HierarchyOperator::FlexibleChildOf | HierarchyOperator::FlexibleDescendantOf => {
                let links = (right, left, MatchTier::Reverse);
                self.flexible(links, reach, report_lower, ctx).await?
            }
            HierarchyOperator::Bidirectional | HierarchyOperator::DeepBidirectional => {
                self.bidirectional(left, right, reach, ctx).await?
            }
        };

        ctx.record_matches(
            format!(
                "{} {} {}",
                left.display_text(),
                condition.operator,
                right.display_text()
            ),
            matches.len(),
        );

        if !scope.is_empty() {
            matches.retain(|m| scope.admits(&m.node));
        }
        self.search.apply_limit(&mut matches);
        Ok(matches)
    }

    /// Same-node hits, then the side picked by `report` of each `upper` above
    /// `lower` link, for nodes not already hit
    async fn flexible(
        &self,
        (upper, lower, tier): (&Condition, &Condition, MatchTier),
        reach: Reach,
        report: fn(&Links, MatchTier) -> Vec<HierarchyMatch>,
        ctx: &mut SearchContext,
    ) -> Result<Vec<HierarchyMatch>> {
        let mut same_ctx = ctx.child();
        let mut link_ctx = ctx.child();
        let (same, links) = tokio::join!(
            self.same_node(upper, lower, &mut same_ctx),
            self.links(upper, lower, reach, &mut link_ctx)
        );
        ctx.merge(same_ctx);
        ctx.merge(link_ctx);

        let same = same?;
        let related = report(&links?, tier);
        tracing::debug!(
            "Flexible tiers: {} same-node, {} related",
            same.len(),
            related.len()
        );
        Ok(merge_flexible(same, related))
    }

    async fn bidirectional(
        &self,
        left: &Condition,
        right: &Condition,
        reach: Reach,
        ctx: &mut SearchContext,
    ) -> Result<Vec<HierarchyMatch>> {
        let mut same_ctx = ctx.child();
        let mut forward_ctx = ctx.child();
        let mut reverse_ctx = ctx.child();
        let (same, forward, reverse) = tokio::join!(
            self.same_node(left, right, &mut same_ctx),
            self.links(left, right, reach, &mut forward_ctx),
            self.links(right, left, reach, &mut reverse_ctx)
        );
        ctx.merge(same_ctx);
        ctx.merge(forward_ctx);
        ctx.merge(reverse_ctx);

        let same = same?;
        let forward = report_upper(&forward?, MatchTier::Forward);
        let reverse = report_upper(&reverse?, MatchTier::Reverse);
        tracing::debug!(
            "Bidirectional tiers: {} same-node, {} forward, {} reverse",
            same.len(),
            forward.len(),
            reverse.len()
        );
        Ok(merge_bidirectional(same, forward, reverse))
    }

    /// Nodes matching both conditions at once
    async fn same_node(
        &self,
        a: &Condition,
        b: &Condition,
        ctx: &mut SearchContext,
    ) -> Result<Vec<HierarchyMatch>> {
        let both = canonicalize(&Condition::and(vec![a.clone(), b.clone()]))?;
        let nodes = self
            .search
            .find_matching(&both, &SearchScope::default(), ctx)
            .await?;
        Ok(same_node_matches(nodes))
    }
}
