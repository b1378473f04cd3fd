//! Named identifier sets fed to the result-set combinator

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the identifiers in a result set refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Page,
}

/// A named, duplicate-free, insertion-ordered set of identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawResultSet")]
pub struct ResultSet {
    pub name: String,
    ids: Vec<String>,
    pub entity_kind: EntityKind,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResultSet {
    name: String,
    ids: Vec<String>,
    entity_kind: EntityKind,
}

impl From<RawResultSet> for ResultSet {
    fn from(raw: RawResultSet) -> Self {
        ResultSet::new(raw.name, raw.ids, raw.entity_kind)
    }
}

impl ResultSet {
    /// Build a set, keeping only the first occurrence of each id
    pub fn new<I, S>(name: impl Into<String>, ids: I, entity_kind: EntityKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self {
            name: name.into(),
            ids,
            entity_kind,
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }
}
