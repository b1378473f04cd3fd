//! MemoryStore - In-Process Content Backend
//!
//! An outline graph held in memory and queried through the same Datalog text
//! a remote graph database would receive. Used by the test suites, the
//! benchmarks and embedders without a graph database.
//!
//! # Data Model
//!
//! Every page and node is an entity carrying `:block/uid`, `:create/time` and
//! `:edit/time` (epoch milliseconds). Pages add `:node/title`. Nodes add
//! `:block/string`, `:block/page`, `:block/order`, `:block/parents` (page and
//! every ancestor node) and `:block/refs`. Parents (page or node) carry
//! `:block/children`.
//!
//! References are extracted from node text when the node is added:
//! - `[[Title]]`, `#[[Title]]`, `#Tag` and a leading `Attr::` reference pages
//! - `((uid))` references another node or page
//!
//! A reference to a page or node that does not exist yet is attached once it
//! is added.

use crate::db::datalog::{Datum, EntityId, FactIndex, Query};
use crate::db::{BackendError, ContentBackend, Tuple};
use crate::models::Page;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

static PAGE_REF_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE_REGEX: OnceLock<Regex> = OnceLock::new();
static BLOCK_REF_REGEX: OnceLock<Regex> = OnceLock::new();

/// Page titles and node uids referenced by a piece of node text
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractedRefs {
    pub page_titles: Vec<String>,
    pub block_uids: Vec<String>,
}

/// Extract page and block references from node text
pub fn extract_refs(text: &str) -> ExtractedRefs {
    let page_ref =
        PAGE_REF_REGEX.get_or_init(|| Regex::new(r"\[\[([^\[\]]+)\]\]").unwrap());
    let tag = TAG_REGEX.get_or_init(|| Regex::new(r"(?:^|[^\w\[#])#([\w/-]+)").unwrap());
    let attribute = ATTRIBUTE_REGEX.get_or_init(|| Regex::new(r"^([^:\n\[\]]+?)::").unwrap());
    let block_ref = BLOCK_REF_REGEX.get_or_init(|| Regex::new(r"\(\(([\w-]+)\)\)").unwrap());

    let mut refs = ExtractedRefs::default();
    let mut push_title = |title: &str| {
        let title = title.trim();
        if !title.is_empty() && !refs.page_titles.iter().any(|t| t == title) {
            refs.page_titles.push(title.to_string());
        }
    };

    if let Some(captures) = attribute.captures(text) {
        push_title(&captures[1]);
    }
    for captures in page_ref.captures_iter(text) {
        push_title(&captures[1]);
    }
    for captures in tag.captures_iter(text) {
        push_title(&captures[1]);
    }
    for captures in block_ref.captures_iter(text) {
        let uid = captures[1].to_string();
        if !refs.block_uids.contains(&uid) {
            refs.block_uids.push(uid);
        }
    }
    refs
}

/// Serializable outline used to load a store in one call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlinePage {
    pub uid: String,
    pub title: String,
    #[serde(default)]
    pub children: Vec<OutlineNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineNode {
    pub uid: String,
    #[serde(alias = "string")]
    pub text: String,
    #[serde(default)]
    pub children: Vec<OutlineNode>,
}

/// In-memory outline graph implementing [`ContentBackend`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: FactIndex,
    next_entity: EntityId,
    uids: HashMap<String, EntityId>,
    titles: HashMap<String, EntityId>,
    pages: HashSet<EntityId>,
    /// node -> owning page
    page_of: HashMap<EntityId, EntityId>,
    /// node -> page or node it hangs under
    parent_of: HashMap<EntityId, EntityId>,
    child_count: HashMap<EntityId, i64>,
    pending_pages: HashMap<String, Vec<EntityId>>,
    pending_blocks: HashMap<String, Vec<EntityId>>,
    last_stamp: i64,
    executed: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from serialized outline pages
    pub fn from_outline(pages: &[OutlinePage]) -> Result<Self, BackendError> {
        let mut store = Self::new();
        for page in pages {
            store.add_page(&page.uid, &page.title)?;
        }
        for page in pages {
            for node in &page.children {
                store.add_tree(&page.uid, None, node)?;
            }
        }
        Ok(store)
    }

    /// Build a store from a JSON array of outline pages
    pub fn from_json(json: &str) -> Result<Self, BackendError> {
        let pages: Vec<OutlinePage> = serde_json::from_str(json)
            .map_err(|e| BackendError::invalid_data(format!("invalid outline JSON: {}", e)))?;
        Self::from_outline(&pages)
    }

    fn add_tree(
        &mut self,
        page_uid: &str,
        parent_uid: Option<&str>,
        node: &OutlineNode,
    ) -> Result<(), BackendError> {
        self.add_node(&node.uid, page_uid, parent_uid, &node.text)?;
        for child in &node.children {
            self.add_tree(page_uid, Some(&node.uid), child)?;
        }
        Ok(())
    }

    pub fn add_page(&mut self, uid: &str, title: &str) -> Result<(), BackendError> {
        self.check_new_uid(uid)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(BackendError::invalid_data(format!(
                "page '{}' has an empty title",
                uid
            )));
        }
        if self.titles.contains_key(title) {
            return Err(BackendError::invalid_data(format!(
                "page title '{}' already exists",
                title
            )));
        }

        let entity = self.allocate(uid);
        self.pages.insert(entity);
        self.titles.insert(title.to_string(), entity);
        self.index.insert(entity, "node/title", Datum::Str(title.to_string()));
        self.stamp(entity);

        if let Some(waiting) = self.pending_pages.remove(title) {
            for node in waiting {
                self.index.insert(node, "block/refs", Datum::Entity(entity));
            }
        }
        self.attach_pending_block(uid, entity);
        tracing::debug!("Added page {} ({})", uid, title);
        Ok(())
    }

    /// Add a node under `parent_uid`, or at the top of the page when `None`
    pub fn add_node(
        &mut self,
        uid: &str,
        page_uid: &str,
        parent_uid: Option<&str>,
        text: &str,
    ) -> Result<(), BackendError> {
        self.check_new_uid(uid)?;
        let page = self
            .uids
            .get(page_uid)
            .copied()
            .filter(|e| self.pages.contains(e))
            .ok_or_else(|| {
                BackendError::invalid_data(format!("page '{}' does not exist", page_uid))
            })?;

        let parent = match parent_uid {
            None => page,
            Some(parent_uid) => {
                let parent = self
                    .uids
                    .get(parent_uid)
                    .copied()
                    .filter(|e| !self.pages.contains(e))
                    .ok_or_else(|| {
                        BackendError::invalid_data(format!(
                            "parent node '{}' does not exist",
                            parent_uid
                        ))
                    })?;
                if self.page_of.get(&parent) != Some(&page) {
                    return Err(BackendError::invalid_data(format!(
                        "parent node '{}' is not on page '{}'",
                        parent_uid, page_uid
                    )));
                }
                parent
            }
        };

        let entity = self.allocate(uid);
        self.page_of.insert(entity, page);
        self.parent_of.insert(entity, parent);

        let order = self.child_count.entry(parent).or_insert(0);
        let position = *order;
        *order += 1;

        self.index.insert(entity, "block/string", Datum::Str(text.to_string()));
        self.index.insert(entity, "block/page", Datum::Entity(page));
        self.index.insert(entity, "block/order", Datum::Int(position));
        self.index.insert(parent, "block/children", Datum::Entity(entity));
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            self.index.insert(entity, "block/parents", Datum::Entity(current));
            ancestor = self.parent_of.get(&current).copied();
        }
        self.stamp(entity);

        let refs = extract_refs(text);
        for title in refs.page_titles {
            match self.titles.get(&title) {
                Some(target) => self.index.insert(entity, "block/refs", Datum::Entity(*target)),
                None => self.pending_pages.entry(title).or_default().push(entity),
            }
        }
        for target_uid in refs.block_uids {
            match self.uids.get(&target_uid) {
                Some(target) => self.index.insert(entity, "block/refs", Datum::Entity(*target)),
                None => self.pending_blocks.entry(target_uid).or_default().push(entity),
            }
        }
        self.attach_pending_block(uid, entity);
        Ok(())
    }

    /// Override creation and modification times of a page or node
    pub fn set_times(
        &mut self,
        uid: &str,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let entity = *self
            .uids
            .get(uid)
            .ok_or_else(|| BackendError::invalid_data(format!("'{}' does not exist", uid)))?;
        self.index
            .replace(entity, "create/time", Datum::Int(created_at.timestamp_millis()));
        self.index
            .replace(entity, "edit/time", Datum::Int(modified_at.timestamp_millis()));
        Ok(())
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.uids.contains_key(uid)
    }

    /// Look up a page by uid
    pub fn page(&self, uid: &str) -> Option<Page> {
        let entity = self.uids.get(uid).copied().filter(|e| self.pages.contains(e))?;
        let title = match self.index.values(entity, "node/title").first() {
            Some(Datum::Str(title)) => title.clone(),
            _ => return None,
        };
        let time = |attribute: &str| match self.index.values(entity, attribute).first() {
            Some(Datum::Int(ms)) => DateTime::<Utc>::from_timestamp_millis(*ms),
            _ => None,
        };
        Some(Page {
            id: uid.to_string(),
            title,
            created_at: time("create/time")?,
            modified_at: time("edit/time")?,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn node_count(&self) -> usize {
        self.uids.len() - self.pages.len()
    }

    /// Number of queries executed so far
    pub fn executed_queries(&self) -> usize {
        self.executed.load(Ordering::Relaxed)
    }

    fn check_new_uid(&self, uid: &str) -> Result<(), BackendError> {
        if uid.trim().is_empty() {
            return Err(BackendError::invalid_data("uid must not be empty"));
        }
        if self.uids.contains_key(uid) {
            return Err(BackendError::invalid_data(format!(
                "uid '{}' already exists",
                uid
            )));
        }
        Ok(())
    }

    fn allocate(&mut self, uid: &str) -> EntityId {
        self.next_entity += 1;
        let entity = self.next_entity;
        self.uids.insert(uid.to_string(), entity);
        self.index.insert(entity, "block/uid", Datum::Str(uid.to_string()));
        entity
    }

    /// Creation stamps strictly increase in insertion order
    fn stamp(&mut self, entity: EntityId) {
        let now = Utc::now().timestamp_millis().max(self.last_stamp + 1);
        self.last_stamp = now;
        self.index.insert(entity, "create/time", Datum::Int(now));
        self.index.insert(entity, "edit/time", Datum::Int(now));
    }

    fn attach_pending_block(&mut self, uid: &str, entity: EntityId) {
        if let Some(waiting) = self.pending_blocks.remove(uid) {
            for node in waiting {
                self.index.insert(node, "block/refs", Datum::Entity(entity));
            }
        }
    }
}

#[async_trait]
impl ContentBackend for MemoryStore {
    async fn execute(&self, query: &str) -> Result<Vec<Tuple>, BackendError> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        let parsed = Query::parse(query).map_err(|e| {
            tracing::warn!("Rejected query: {}", e);
            e
        })?;
        let rows = parsed.evaluate(&self.index)?;
        tracing::debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_page("p1", "Project Alpha").unwrap();
        store.add_node("x", "p1", None, "Project Alpha kickoff").unwrap();
        store.add_node("y", "p1", Some("x"), "status: done [[Later]]").unwrap();
        store.add_page("p2", "Later").unwrap();
        store
    }

    #[test]
    fn test_extract_refs() {
        let refs = extract_refs("Status:: see [[Project Alpha]] and #urgent #[[Two Words]] ((abc-1))");
        assert_eq!(
            refs.page_titles,
            vec!["Status", "Project Alpha", "Two Words", "urgent"]
        );
        assert_eq!(refs.block_uids, vec!["abc-1"]);

        let none = extract_refs("email me at a#b, cost: 5");
        assert!(none.page_titles.is_empty());
    }

    #[test]
    fn test_forest_validation() {
        let mut store = store();
        assert!(store.add_page("p1", "Other").is_err());
        assert!(store.add_page("p3", "Later").is_err());
        assert!(store.add_node("z", "missing", None, "t").is_err());
        assert!(store.add_node("z", "p1", Some("nope"), "t").is_err());
        assert!(store.add_node("z", "p2", Some("x"), "t").is_err());
        assert!(store.add_node("", "p1", None, "t").is_err());
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.page_count(), 2);
    }

    #[tokio::test]
    async fn test_pending_page_reference_is_attached() {
        let store = store();
        let rows = store
            .execute(r#"[:find ?uid :where [?b :block/refs ?r] [?r :node/title "Later"] [?b :block/uid ?uid]]"#)
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("y")]]);
    }

    #[tokio::test]
    async fn test_parents_include_page_and_ancestors() {
        let store = store();
        let rows = store
            .execute(r#"[:find ?pu :where [?b :block/uid "y"] [?b :block/parents ?p] [?p :block/uid ?pu]]"#)
            .await
            .unwrap();
        let mut uids: Vec<String> = rows
            .into_iter()
            .map(|row| row[0].as_str().unwrap().to_string())
            .collect();
        uids.sort();
        assert_eq!(uids, vec!["p1", "x"]);
        assert_eq!(store.executed_queries(), 1);
    }

    #[tokio::test]
    async fn test_set_times() {
        let mut store = store();
        let created = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store.set_times("x", created, created).unwrap();
        store.set_times("p1", created, created).unwrap();
        let page = store.page("p1").unwrap();
        assert_eq!(page.title, "Project Alpha");
        assert_eq!(page.created_at, created);
        assert!(store.page("x").is_none());
        let rows = store
            .execute(r#"[:find ?t :where [?b :block/uid "x"] [?b :create/time ?t]]"#)
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from(created.timestamp_millis())]]);
    }

    #[test]
    fn test_from_json() {
        let store = MemoryStore::from_json(
            r#"[{"uid": "p1", "title": "Home", "children": [
                  {"uid": "a", "string": "top", "children": [{"uid": "b", "text": "nested"}]}
               ]}]"#,
        )
        .unwrap();
        assert!(store.contains("b"));
        assert_eq!(store.node_count(), 2);
        assert!(MemoryStore::from_json("{").is_err());

        let rows = tokio_test::block_on(store.execute(
            r#"[:find ?cu :where [?a :block/uid "a"] [?a :block/children ?c] [?c :block/uid ?cu]]"#,
        ))
        .unwrap();
        assert_eq!(rows, vec![vec![Value::from("b")]]);
    }
}
