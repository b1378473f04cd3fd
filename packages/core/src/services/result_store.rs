//! Lookup of previously produced results
//!
//! Earlier searches are stored by the caller under ids such as
//! `search_nodes_3`. A later request may reference one of them to scope a new
//! search. A missing id is reported with every available id and a best guess.

use crate::models::{EntityKind, ResultSet, SearchScope};
use crate::services::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

/// One entry of a stored result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ResultRecord {
    pub fn node(id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_page_id: Some(page_id.into()),
            title: None,
        }
    }

    pub fn page(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_page_id: None,
            title: Some(title.into()),
        }
    }

    pub fn is_page(&self) -> bool {
        self.title.is_some() && self.parent_page_id.is_none()
    }
}

pub trait ResultStore: Send + Sync {
    fn lookup(&self, id: &str) -> Option<Vec<ResultRecord>>;

    /// Stored ids, oldest first
    fn available_ids(&self) -> Vec<String>;
}

/// Insertion-ordered in-memory result store
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultStore {
    entries: Vec<(String, Vec<ResultRecord>)>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `records` under `id`, replacing and moving to newest any
    /// existing entry with that id
    pub fn insert(&mut self, id: impl Into<String>, records: Vec<ResultRecord>) {
        let id = id.into();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.push((id, records));
    }

    /// Store a result set, recording pages and nodes by its entity kind
    pub fn insert_result_set(&mut self, set: &ResultSet) {
        let records = set
            .ids()
            .iter()
            .map(|id| ResultRecord {
                id: id.clone(),
                parent_page_id: None,
                title: match set.entity_kind {
                    EntityKind::Page => Some(id.clone()),
                    EntityKind::Node => None,
                },
            })
            .collect();
        self.insert(set.name.clone(), records);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultStore for InMemoryResultStore {
    fn lookup(&self, id: &str) -> Option<Vec<ResultRecord>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, records)| records.clone())
    }

    fn available_ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Resolve `id` or explain why it cannot be resolved
pub fn resolve_result_reference(store: &dyn ResultStore, id: &str) -> Result<Vec<ResultRecord>> {
    if let Some(records) = store.lookup(id) {
        return Ok(records);
    }
    let available = store.available_ids();
    let suggestion = suggest_reference(id, &available);
    tracing::debug!(
        "Result reference '{}' not found ({} stored, suggestion: {:?})",
        id,
        available.len(),
        suggestion
    );
    Err(SearchError::result_reference_not_found(id, available, suggestion))
}

/// Most recent id sharing the requested stem, else the most recent id with
/// the longest common prefix of at least three characters
pub fn suggest_reference(requested: &str, available: &[String]) -> Option<String> {
    let stem = strip_counter(requested);
    if let Some(hit) = available.iter().rev().find(|id| strip_counter(id) == stem) {
        return Some(hit.clone());
    }

    let mut best: Option<(usize, &String)> = None;
    for id in available.iter().rev() {
        let shared = common_prefix_len(requested, id);
        if shared >= 3 && best.map_or(true, |(len, _)| shared > len) {
            best = Some((shared, id));
        }
    }
    best.map(|(_, id)| id.clone())
}

/// `name_12` -> `name`
fn strip_counter(id: &str) -> &str {
    match id.rsplit_once('_') {
        Some((stem, digits))
            if !stem.is_empty() && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) =>
        {
            stem
        }
        _ => id,
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

impl SearchScope {
    /// Scope from result-store records: titled records without a page are
    /// pages, everything else is a node
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let mut scope = SearchScope::default();
        for record in records {
            let target = if record.is_page() {
                &mut scope.page_ids
            } else {
                &mut scope.node_ids
            };
            if !target.contains(&record.id) {
                target.push(record.id.clone());
            }
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryResultStore {
        let mut store = InMemoryResultStore::new();
        store.insert("search_nodes_1", vec![ResultRecord::node("b1", "p1")]);
        store.insert("page_search_1", vec![ResultRecord::page("p1", "Home")]);
        store.insert("search_nodes_2", vec![ResultRecord::node("b2", "p1")]);
        store
    }

    #[test]
    fn test_resolves_existing_reference() {
        let store = store();
        let records = resolve_result_reference(&store, "search_nodes_1").unwrap();
        assert_eq!(records, vec![ResultRecord::node("b1", "p1")]);
    }

    #[test]
    fn test_missing_reference_suggests_latest_with_same_stem() {
        let store = store();
        let err = resolve_result_reference(&store, "search_nodes_7").unwrap_err();
        match &err {
            SearchError::ResultReferenceNotFound {
                requested,
                available,
                suggestion,
            } => {
                assert_eq!(requested, "search_nodes_7");
                assert_eq!(available.len(), 3);
                assert_eq!(suggestion.as_deref(), Some("search_nodes_2"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("search_nodes_1, page_search_1, search_nodes_2"));
        assert!(message.contains("Did you mean 'search_nodes_2'?"));
    }

    #[test]
    fn test_prefix_fallback_and_no_suggestion() {
        let available = vec!["page_search_1".to_string(), "search_nodes_2".to_string()];
        assert_eq!(
            suggest_reference("page_lookup", &available).as_deref(),
            Some("page_search_1")
        );
        assert_eq!(suggest_reference("xy", &available), None);
        assert_eq!(suggest_reference("anything", &[]), None);
    }

    #[test]
    fn test_empty_store_message() {
        let err = resolve_result_reference(&InMemoryResultStore::new(), "r_1").unwrap_err();
        assert!(err.to_string().contains("No results are stored yet"));
    }

    #[test]
    fn test_scope_from_records() {
        let records = vec![
            ResultRecord::page("p1", "Home"),
            ResultRecord::node("b1", "p1"),
            ResultRecord::node("b1", "p1"),
        ];
        let scope = SearchScope::from_records(&records);
        assert_eq!(scope.page_ids, vec!["p1"]);
        assert_eq!(scope.node_ids, vec!["b1"]);
    }

    #[test]
    fn test_reinsert_moves_to_newest() {
        let mut store = store();
        store.insert("search_nodes_1", vec![]);
        assert_eq!(store.available_ids().last().map(String::as_str), Some("search_nodes_1"));
        assert_eq!(store.len(), 3);
    }
}
