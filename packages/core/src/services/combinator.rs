//! Result Set Combinator
//!
//! Set algebra over named identifier sets produced by earlier searches.
//!
//! # Pipeline
//!
//! 1. Validate: at least one input, one entity kind, `min <= max`
//! 2. Scan inputs in order, recording first appearance and frequency
//! 3. Apply the set operation
//! 4. Apply `min_appearances` / `max_appearances` on raw frequency
//! 5. Order, then truncate to `limit`
//!
//! Frequency is the number of input sets containing an id; inputs are
//! duplicate-free by construction so this equals the raw occurrence count.

use crate::models::{EntityKind, ResultSet};
use crate::services::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperation {
    /// Ids present in any input
    Union,
    /// Ids present in every input
    Intersection,
    /// Ids of the first input absent from all others
    Difference,
    /// Ids present in exactly one input
    SymmetricDifference,
}

impl SetOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            SetOperation::Union => "union",
            SetOperation::Intersection => "intersection",
            SetOperation::Difference => "difference",
            SetOperation::SymmetricDifference => "symmetric_difference",
        }
    }
}

impl fmt::Display for SetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrdering {
    #[default]
    FirstAppearance,
    Alphabetical,
    /// Most frequent first, ties by first appearance
    Frequency,
    /// Least frequent first, ties by first appearance
    ReverseFrequency,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CombineOptions {
    pub min_appearances: Option<usize>,
    pub max_appearances: Option<usize>,
    pub ordering: ResultOrdering,
    pub include_provenance: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombineStats {
    pub total_input: usize,
    pub unique_input: usize,
    pub duplicates_removed: usize,
    pub per_input: Vec<(String, usize)>,
    pub output_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombineOutput {
    pub ids: Vec<String>,
    pub entity_kind: EntityKind,
    pub operation: SetOperation,
    pub stats: CombineStats,
    /// Input set names containing each surviving id, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<BTreeMap<String, Vec<String>>>,
}

impl CombineOutput {
    /// The output as a new named result set
    pub fn into_result_set(self, name: impl Into<String>) -> ResultSet {
        ResultSet::new(name, self.ids, self.entity_kind)
    }
}

/// Combine `sets` with `operation`
pub fn combine(
    sets: &[ResultSet],
    operation: SetOperation,
    options: &CombineOptions,
) -> Result<CombineOutput> {
    let entity_kind = validate(sets, options)?;

    // id -> indices of the input sets containing it
    let mut members: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for (index, set) in sets.iter().enumerate() {
        for id in set.ids() {
            let entry = members.entry(id.as_str()).or_insert_with(|| {
                first_seen.push(id.as_str());
                Vec::new()
            });
            entry.push(index);
        }
    }

    let frequency = |id: &str| members.get(id).map_or(0, Vec::len);

    let mut ids: Vec<&str> = first_seen
        .iter()
        .copied()
        .filter(|id| {
            let sets_containing = &members[*id];
            match operation {
                SetOperation::Union => true,
                SetOperation::Intersection => sets_containing.len() == sets.len(),
                SetOperation::Difference => *sets_containing == [0],
                SetOperation::SymmetricDifference => sets_containing.len() == 1,
            }
        })
        .filter(|id| options.min_appearances.map_or(true, |min| frequency(*id) >= min))
        .filter(|id| options.max_appearances.map_or(true, |max| frequency(*id) <= max))
        .collect();

    match options.ordering {
        ResultOrdering::FirstAppearance => {}
        ResultOrdering::Alphabetical => ids.sort_unstable(),
        ResultOrdering::Frequency => ids.sort_by(|a, b| frequency(*b).cmp(&frequency(*a))),
        ResultOrdering::ReverseFrequency => ids.sort_by_key(|id| frequency(*id)),
    }

    if let Some(limit) = options.limit {
        ids.truncate(limit);
    }

    let provenance = options.include_provenance.then(|| {
        ids.iter()
            .map(|id| {
                let names = members[*id].iter().map(|&i| sets[i].name.clone()).collect();
                (id.to_string(), names)
            })
            .collect()
    });

    let total_input: usize = sets.iter().map(ResultSet::len).sum();
    let stats = CombineStats {
        total_input,
        unique_input: first_seen.len(),
        duplicates_removed: total_input - first_seen.len(),
        per_input: sets.iter().map(|s| (s.name.clone(), s.len())).collect(),
        output_count: ids.len(),
    };

    tracing::debug!(
        "Combined {} sets with {}: {} of {} unique ids kept",
        sets.len(),
        operation,
        stats.output_count,
        stats.unique_input
    );

    Ok(CombineOutput {
        ids: ids.into_iter().map(str::to_string).collect(),
        entity_kind,
        operation,
        stats,
        provenance,
    })
}

fn validate(sets: &[ResultSet], options: &CombineOptions) -> Result<EntityKind> {
    let first = sets
        .first()
        .ok_or_else(|| SearchError::validation("combine needs at least one result set"))?;

    if let Some(other) = sets.iter().find(|s| s.entity_kind != first.entity_kind) {
        return Err(SearchError::validation(format!(
            "cannot combine {:?} set '{}' with {:?} set '{}'",
            first.entity_kind, first.name, other.entity_kind, other.name
        )));
    }

    if let (Some(min), Some(max)) = (options.min_appearances, options.max_appearances) {
        if min > max {
            return Err(SearchError::validation(format!(
                "min_appearances ({}) exceeds max_appearances ({})",
                min, max
            )));
        }
    }

    Ok(first.entity_kind)
}
