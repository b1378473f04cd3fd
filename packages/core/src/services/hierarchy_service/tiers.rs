//! Turning links into reported matches, and merging tiers
//!
//! Tier 1 (same node) entries are never evicted. For bidirectional search
//! each relationship is reported once, at its structurally highest node.

use super::traversal::{Link, Links};
use super::{HierarchyMatch, MatchTier};
use crate::models::Node;
use std::collections::{HashMap, HashSet};

/// Report the upper side of each link, grouped by upper node
pub(super) fn report_upper(links: &Links, tier: MatchTier) -> Vec<HierarchyMatch> {
    grouped(links, |link| (&link.upper, &link.lower))
        .into_iter()
        .filter_map(|(id, related, depth)| {
            Some(HierarchyMatch {
                node: links.node(id)?.clone(),
                tier,
                child_id: related.first().cloned(),
                parent_id: None,
                related_ids: related,
                depth: Some(depth),
            })
        })
        .collect()
}

/// Report the lower side of each link, grouped by lower node
pub(super) fn report_lower(links: &Links, tier: MatchTier) -> Vec<HierarchyMatch> {
    grouped(links, |link| (&link.lower, &link.upper))
        .into_iter()
        .filter_map(|(id, related, depth)| {
            Some(HierarchyMatch {
                node: links.node(id)?.clone(),
                tier,
                child_id: None,
                parent_id: related.first().cloned(),
                related_ids: related,
                depth: Some(depth),
            })
        })
        .collect()
}

/// `(reported id, related ids, nearest depth)` in first-seen order
fn grouped<'a, F>(links: &'a Links, key: F) -> Vec<(&'a str, Vec<String>, usize)>
where
    F: Fn(&'a Link) -> (&'a String, &'a String),
{
    let mut groups: Vec<(&str, Vec<String>, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for link in links.pairs() {
        let (reported, related) = key(link);
        match index.get(reported.as_str()) {
            Some(&i) => {
                let group = &mut groups[i];
                if !group.1.contains(related) {
                    group.1.push(related.clone());
                }
                group.2 = group.2.min(link.depth);
            }
            None => {
                index.insert(reported.as_str(), groups.len());
                groups.push((reported.as_str(), vec![related.clone()], link.depth));
            }
        }
    }
    groups
}

pub(super) fn same_node_matches(nodes: Vec<Node>) -> Vec<HierarchyMatch> {
    nodes
        .into_iter()
        .map(|node| HierarchyMatch {
            node,
            tier: MatchTier::SameNode,
            child_id: None,
            parent_id: None,
            related_ids: Vec::new(),
            depth: Some(0),
        })
        .collect()
}

/// Same-node hits, then related hits for nodes not already reported
pub(super) fn merge_flexible(
    same: Vec<HierarchyMatch>,
    related: Vec<HierarchyMatch>,
) -> Vec<HierarchyMatch> {
    let mut reported: HashSet<String> = same.iter().map(|m| m.node.id.clone()).collect();
    let mut merged = same;
    for hit in related {
        if reported.insert(hit.node.id.clone()) {
            merged.push(hit);
        }
    }
    merged
}

/// Three-tier merge with parent priority
///
/// A reverse hit is dropped when a forward hit already covers it as a related
/// node. Otherwise it replaces every forward entry it sits above (keeping the
/// first entry's position), or is appended.
pub(super) fn merge_bidirectional(
    same: Vec<HierarchyMatch>,
    forward: Vec<HierarchyMatch>,
    reverse: Vec<HierarchyMatch>,
) -> Vec<HierarchyMatch> {
    let covered: HashSet<String> = forward
        .iter()
        .flat_map(|hit| hit.related_ids.iter().cloned())
        .collect();

    let mut merged = merge_flexible(same, forward);
    let mut reported: HashSet<String> = merged.iter().map(|m| m.node.id.clone()).collect();

    for hit in reverse {
        if reported.contains(&hit.node.id) || covered.contains(&hit.node.id) {
            continue;
        }

        let below: Vec<usize> = merged
            .iter()
            .enumerate()
            .filter(|(_, m)| m.tier == MatchTier::Forward && hit.related_ids.contains(&m.node.id))
            .map(|(i, _)| i)
            .collect();

        reported.insert(hit.node.id.clone());
        match below.split_first() {
            Some((&first, rest)) => {
                tracing::debug!(
                    "Reverse hit {} replaces forward hit {}",
                    hit.node.id,
                    merged[first].node.id
                );
                for &i in rest.iter().rev() {
                    reported.remove(&merged[i].node.id);
                    merged.remove(i);
                }
                reported.remove(&merged[first].node.id);
                merged[first] = hit;
            }
            None => merged.push(hit),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn node(id: &str) -> Node {
        let now = Utc::now();
        Node {
            id: id.to_string(),
            text: format!("text of {}", id),
            page_id: "p".to_string(),
            page_title: "Page".to_string(),
            created_at: now,
            modified_at: now,
        }
    }

    fn links(pairs: &[(&str, &str, usize)]) -> Links {
        let mut links = Links::default();
        for (upper, lower, depth) in pairs {
            links.insert_node(node(upper));
            links.insert_node(node(lower));
            links.link(upper, lower, *depth);
        }
        links
    }

    fn ids(matches: &[HierarchyMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.node.id.as_str()).collect()
    }

    #[test]
    fn test_report_upper_groups_related_nodes() {
        let links = links(&[("a", "c1", 2), ("b", "c3", 1), ("a", "c2", 1)]);
        let matches = report_upper(&links, MatchTier::Forward);

        assert_eq!(ids(&matches), vec!["a", "b"]);
        assert_eq!(matches[0].child_id.as_deref(), Some("c1"));
        assert_eq!(matches[0].related_ids, vec!["c1", "c2"]);
        assert_eq!(matches[0].depth, Some(1));
        assert!(matches[0].parent_id.is_none());
    }

    #[test]
    fn test_report_lower_sets_parent() {
        let links = links(&[("root", "leaf", 3), ("mid", "leaf", 1)]);
        let matches = report_lower(&links, MatchTier::Forward);

        assert_eq!(ids(&matches), vec!["leaf"]);
        assert_eq!(matches[0].parent_id.as_deref(), Some("root"));
        assert_eq!(matches[0].related_ids, vec!["root", "mid"]);
        assert_eq!(matches[0].depth, Some(1));
    }

    #[test]
    fn test_flexible_never_duplicates_same_node_hits() {
        let same = same_node_matches(vec![node("s")]);
        let related = report_upper(&links(&[("s", "x", 1), ("t", "y", 1)]), MatchTier::Forward);
        let merged = merge_flexible(same, related);

        assert_eq!(ids(&merged), vec!["s", "t"]);
        assert_eq!(merged[0].tier, MatchTier::SameNode);
    }

    #[test]
    fn test_reverse_hit_above_forward_hit_replaces_it() {
        // y (right) > x (left) > c1 (right)
        let forward = report_upper(&links(&[("x", "c1", 1)]), MatchTier::Forward);
        let reverse = report_upper(&links(&[("y", "x", 1)]), MatchTier::Reverse);
        let merged = merge_bidirectional(Vec::new(), forward, reverse);

        assert_eq!(ids(&merged), vec!["y"]);
        assert_eq!(merged[0].tier, MatchTier::Reverse);
        assert_eq!(merged[0].child_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_reverse_hit_covered_by_forward_is_dropped() {
        // x (left) > c1 (right, also above a left match)
        let forward = report_upper(&links(&[("x", "c1", 1)]), MatchTier::Forward);
        let reverse = report_upper(&links(&[("c1", "z", 1)]), MatchTier::Reverse);
        let merged = merge_bidirectional(Vec::new(), forward, reverse);

        assert_eq!(ids(&merged), vec!["x"]);
    }

    #[test]
    fn test_same_node_hits_survive_replacement() {
        let same = same_node_matches(vec![node("s")]);
        let forward = report_upper(&links(&[("s", "c", 1), ("x", "c2", 1)]), MatchTier::Forward);
        let reverse = report_upper(&links(&[("y", "s", 1), ("w", "v", 1)]), MatchTier::Reverse);
        let merged = merge_bidirectional(same, forward, reverse);

        assert_eq!(ids(&merged), vec!["s", "x", "y", "w"]);
        assert_eq!(merged[0].tier, MatchTier::SameNode);
    }

    #[test]
    fn test_reverse_hit_replaces_several_forward_hits_once() {
        let forward = report_upper(&links(&[("x1", "c1", 1), ("x2", "c2", 1)]), MatchTier::Forward);
        let reverse = report_upper(&links(&[("y", "x1", 1), ("y", "x2", 2)]), MatchTier::Reverse);
        let merged = merge_bidirectional(Vec::new(), forward, reverse);

        assert_eq!(ids(&merged), vec!["y"]);
        assert_eq!(merged[0].related_ids, vec!["x1", "x2"]);
    }
}
