use serde::{Deserialize, Serialize};

use super::node::Node;
use super::result_set::{EntityKind, ResultSet};

/// Optional restriction of a search to known pages and/or nodes
///
/// Empty lists impose no restriction. When both lists are set a node must
/// satisfy both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchScope {
    #[serde(default)]
    pub page_ids: Vec<String>,
    #[serde(default)]
    pub node_ids: Vec<String>,
}

impl SearchScope {
    pub fn pages<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            page_ids: ids.into_iter().map(Into::into).collect(),
            node_ids: Vec::new(),
        }
    }

    pub fn nodes<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            page_ids: Vec::new(),
            node_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.page_ids.is_empty() && self.node_ids.is_empty()
    }

    /// Whether `node` passes both restrictions
    pub fn admits(&self, node: &Node) -> bool {
        (self.node_ids.is_empty() || self.node_ids.contains(&node.id))
            && (self.page_ids.is_empty() || self.page_ids.contains(&node.page_id))
    }

    /// Build a scope from stored result sets, routing ids by entity kind
    pub fn from_result_sets<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a ResultSet>,
    {
        let mut scope = SearchScope::default();
        for set in sets {
            let target = match set.entity_kind {
                EntityKind::Page => &mut scope.page_ids,
                EntityKind::Node => &mut scope.node_ids,
            };
            for id in set.ids() {
                if !target.contains(id) {
                    target.push(id.clone());
                }
            }
        }
        scope
    }
}
