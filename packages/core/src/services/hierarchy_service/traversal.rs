//! Ancestor/descendant link discovery
//!
//! Every operator is answered from links between an upper condition (parent
//! or ancestor side) and a lower condition (child or descendant side).

use super::HierarchySearchService;
use crate::models::{Condition, Node, SearchScope};
use crate::query::{children_query, NodeProjection, QueryBuilder};
use crate::services::context::SearchContext;
use crate::services::error::{Result, SearchError};
use std::collections::{HashMap, HashSet};

const PARENT_VAR: &str = "?parent";
const CHILD_VAR: &str = "?child";

/// How far below the upper node a lower node may sit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Reach {
    /// Direct children only, answered by one join query
    Direct,
    /// Up to this many levels, walked level by level
    Depth(usize),
}

/// An upper node with a matching node `depth` levels below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Link {
    pub upper: String,
    pub lower: String,
    pub depth: usize,
}

/// Discovered links plus every node they mention
#[derive(Debug, Default)]
pub(super) struct Links {
    nodes: HashMap<String, Node>,
    pairs: Vec<Link>,
    seen: HashSet<(String, String)>,
}

impl Links {
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    /// Record a link once per pair, keeping the first depth seen
    pub fn link(&mut self, upper: &str, lower: &str, depth: usize) {
        if self.seen.insert((upper.to_string(), lower.to_string())) {
            self.pairs.push(Link {
                upper: upper.to_string(),
                lower: lower.to_string(),
                depth,
            });
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn pairs(&self) -> &[Link] {
        &self.pairs
    }
}

impl HierarchySearchService {
    /// Links from nodes matching `upper` down to nodes matching `lower`
    pub(super) async fn links(
        &self,
        upper: &Condition,
        lower: &Condition,
        reach: Reach,
        ctx: &mut SearchContext,
    ) -> Result<Links> {
        match reach {
            Reach::Direct => self.direct_links(upper, lower, ctx).await,
            Reach::Depth(depth) => self.deep_links(upper, lower, depth, ctx).await,
        }
    }

    /// One join query: parent matches `upper`, one of its children matches `lower`
    async fn direct_links(
        &self,
        upper: &Condition,
        lower: &Condition,
        ctx: &mut SearchContext,
    ) -> Result<Links> {
        let compiler = self.search.compiler();
        let upper_clauses = compiler.compile(upper, PARENT_VAR)?;
        let lower_clauses = compiler.compile(lower, CHILD_VAR)?;
        let parent = NodeProjection::new(PARENT_VAR);
        let child = NodeProjection::new(CHILD_VAR);

        let query = QueryBuilder::new()
            .find_all(parent.find_vars())
            .find_all(child.find_vars())
            .clause(format!("[{} :block/children {}]", PARENT_VAR, CHILD_VAR))
            .bound_conditions(&upper_clauses)
            .bound_conditions(&lower_clauses)
            .clauses(parent.clauses())
            .clauses(child.clauses())
            .build()?;

        let rows = self.search.execute(&query, ctx).await?;
        let mut links = Links::default();
        for row in &rows {
            let (upper_row, lower_row) = row.split_at(Node::ROW_WIDTH.min(row.len()));
            let upper_node =
                Node::from_row(upper_row).map_err(|e| SearchError::backend_execution(e, &query))?;
            let lower_node =
                Node::from_row(lower_row).map_err(|e| SearchError::backend_execution(e, &query))?;
            links.link(&upper_node.id, &lower_node.id, 1);
            links.insert_node(upper_node);
            links.insert_node(lower_node);
        }
        tracing::debug!("Direct join produced {} links", links.pairs().len());
        Ok(links)
    }

    /// Search both sides concurrently, then walk down from the upper matches
    /// one level per query until `depth` or the frontier runs dry
    async fn deep_links(
        &self,
        upper: &Condition,
        lower: &Condition,
        depth: usize,
        ctx: &mut SearchContext,
    ) -> Result<Links> {
        let unscoped = SearchScope::default();
        let mut upper_ctx = ctx.child();
        let mut lower_ctx = ctx.child();
        let (uppers, lowers) = tokio::join!(
            self.search.find_matching(upper, &unscoped, &mut upper_ctx),
            self.search.find_matching(lower, &unscoped, &mut lower_ctx)
        );
        ctx.merge(upper_ctx);
        ctx.merge(lower_ctx);
        let (uppers, lowers) = (uppers?, lowers?);

        let mut links = Links::default();
        if uppers.is_empty() || lowers.is_empty() {
            return Ok(links);
        }

        let lower_ids: HashSet<String> = lowers.iter().map(|n| n.id.clone()).collect();
        for node in lowers {
            links.insert_node(node);
        }

        // Node id -> upper matches above it at the current level
        let mut order: Vec<String> = uppers.iter().map(|n| n.id.clone()).collect();
        let mut origins: HashMap<String, Vec<String>> = uppers
            .iter()
            .map(|n| (n.id.clone(), vec![n.id.clone()]))
            .collect();
        for node in uppers {
            links.insert_node(node);
        }

        for level in 1..=depth {
            if order.is_empty() {
                break;
            }
            let query = children_query(&order)?;
            let rows = self.search.execute(&query, ctx).await?;

            let mut next_order = Vec::new();
            let mut next_origins: HashMap<String, Vec<String>> = HashMap::new();
            for row in &rows {
                let (Some(parent), Some(child)) = (
                    row.first().and_then(|v| v.as_str()),
                    row.get(1).and_then(|v| v.as_str()),
                ) else {
                    return Err(SearchError::backend_execution(
                        "children row is not a [parent child] uid pair",
                        &query,
                    ));
                };
                let Some(above) = origins.get(parent) else {
                    continue;
                };

                if lower_ids.contains(child) {
                    for ancestor in above {
                        links.link(ancestor, child, level);
                    }
                }

                let entry = next_origins.entry(child.to_string()).or_insert_with(|| {
                    next_order.push(child.to_string());
                    Vec::new()
                });
                for ancestor in above {
                    if !entry.contains(ancestor) {
                        entry.push(ancestor.clone());
                    }
                }
            }

            tracing::debug!(
                "Traversal level {}: {} frontier nodes, {} links so far",
                level,
                next_order.len(),
                links.pairs().len()
            );
            order = next_order;
            origins = next_origins;
        }

        Ok(links)
    }
}
