//! Search Condition Model
//!
//! Tagged-variant representation of what a search should match.
//!
//! - [`SearchCondition`] - one leaf test against a node (text, reference, regex)
//! - [`CompoundCondition`] - AND/OR over ordered operands
//! - [`ConditionGroup`] - a flat group of leaves used by grouped caller input
//! - [`HierarchyCondition`] - two condition trees joined by a structural operator
//!
//! All types are plain values: they are built per request, never mutated
//! once handed to the compiler, and discarded with the response.

use crate::services::error::{Result, SearchError};
use outline_query_expansion::ExpansionStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_weight() -> f64 {
    1.0
}

/// What a leaf condition tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Node text
    Text,
    /// Node references a page by title
    PageRef,
    /// Node references another node by uid
    BlockRef,
    /// Node text against a raw regular expression
    Regex,
    /// Node references any of several pages (`|`-separated titles)
    PageRefOr,
}

/// How a leaf's pattern is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Exact,
    #[default]
    Contains,
    Regex,
}

/// AND / OR combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombineMode {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::And => f.write_str("AND"),
            CombineMode::Or => f.write_str("OR"),
        }
    }
}

/// A single match condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCondition {
    #[serde(rename = "type", alias = "kind")]
    pub kind: ConditionKind,

    /// Text, title, uid or regex depending on `kind`
    #[serde(alias = "text")]
    pub pattern: String,

    #[serde(default)]
    pub match_mode: MatchMode,

    /// Relative importance; informational, never used for filtering
    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub negate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_strategy: Option<ExpansionStrategy>,
}

impl SearchCondition {
    pub fn new(kind: ConditionKind, pattern: impl Into<String>) -> Self {
        let match_mode = match kind {
            ConditionKind::Regex => MatchMode::Regex,
            ConditionKind::BlockRef => MatchMode::Exact,
            _ => MatchMode::Contains,
        };
        Self {
            kind,
            pattern: pattern.into(),
            match_mode,
            weight: default_weight(),
            negate: false,
            expansion_strategy: None,
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Self::new(ConditionKind::Text, pattern)
    }

    /// Page reference matched by exact title
    pub fn page_ref(title: impl Into<String>) -> Self {
        Self::new(ConditionKind::PageRef, title).with_match_mode(MatchMode::Exact)
    }

    pub fn block_ref(uid: impl Into<String>) -> Self {
        Self::new(ConditionKind::BlockRef, uid)
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(ConditionKind::Regex, pattern)
    }

    pub fn page_ref_or<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = titles
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("|");
        Self::new(ConditionKind::PageRefOr, joined).with_match_mode(MatchMode::Exact)
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    pub fn exact(self) -> Self {
        self.with_match_mode(MatchMode::Exact)
    }

    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_expansion(mut self, strategy: ExpansionStrategy) -> Self {
        self.expansion_strategy = Some(strategy);
        self
    }

    /// Titles of a `page_ref_or` condition
    pub fn titles(&self) -> Vec<&str> {
        self.pattern
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Plain text matched as a case-folded substring
    pub fn is_contains_text(&self) -> bool {
        self.kind == ConditionKind::Text && self.match_mode == MatchMode::Contains
    }

    /// Pattern is a caller-supplied regex rather than literal text
    pub fn is_raw_regex(&self) -> bool {
        self.kind == ConditionKind::Regex || self.match_mode == MatchMode::Regex
    }

    /// Human-readable label used for per-condition match counts
    pub fn display_text(&self) -> String {
        let body = match self.kind {
            ConditionKind::Text => self.pattern.clone(),
            ConditionKind::PageRef => format!("[[{}]]", self.pattern),
            ConditionKind::BlockRef => format!("(({}))", self.pattern),
            ConditionKind::Regex => format!("/{}/", self.pattern),
            ConditionKind::PageRefOr => format!("[[{}]]", self.titles().join("]] | [[")),
        };
        if self.negate {
            format!("NOT {}", body)
        } else {
            body
        }
    }

    /// Reject leaves that cannot be compiled
    pub fn validate(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            return Err(SearchError::validation(format!(
                "{:?} condition has an empty pattern",
                self.kind
            )));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(SearchError::validation(format!(
                "condition weight must be a finite number >= 0, got {}",
                self.weight
            )));
        }
        if self.kind == ConditionKind::PageRefOr && self.titles().is_empty() {
            return Err(SearchError::validation(
                "page_ref_or condition lists no page titles",
            ));
        }
        if self.kind == ConditionKind::Regex || self.match_mode == MatchMode::Regex {
            regex::Regex::new(&self.pattern).map_err(|e| {
                SearchError::validation(format!("invalid regex '{}': {}", self.pattern, e))
            })?;
        }
        Ok(())
    }
}

/// AND/OR combination over ordered operands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundCondition {
    pub operator: CombineMode,
    pub operands: Vec<Condition>,
}

/// A condition tree: a leaf or a compound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Condition {
    Leaf(SearchCondition),
    Compound(CompoundCondition),
}

impl Condition {
    pub fn and(operands: Vec<Condition>) -> Self {
        Condition::Compound(CompoundCondition {
            operator: CombineMode::And,
            operands,
        })
    }

    pub fn or(operands: Vec<Condition>) -> Self {
        Condition::Compound(CompoundCondition {
            operator: CombineMode::Or,
            operands,
        })
    }

    pub fn combine(operator: CombineMode, operands: Vec<Condition>) -> Self {
        Condition::Compound(CompoundCondition { operator, operands })
    }

    /// All leaves in depth-first order
    pub fn leaves(&self) -> Vec<&SearchCondition> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a SearchCondition>) {
        match self {
            Condition::Leaf(leaf) => out.push(leaf),
            Condition::Compound(compound) => {
                for operand in &compound.operands {
                    operand.collect_leaves(out);
                }
            }
        }
    }

    /// Human-readable rendering, e.g. `(Alpha OR Beta) AND NOT done`
    pub fn display_text(&self) -> String {
        match self {
            Condition::Leaf(leaf) => leaf.display_text(),
            Condition::Compound(compound) => {
                let parts: Vec<String> = compound
                    .operands
                    .iter()
                    .map(|operand| match operand {
                        Condition::Compound(_) => format!("({})", operand.display_text()),
                        Condition::Leaf(_) => operand.display_text(),
                    })
                    .collect();
                parts.join(&format!(" {} ", compound.operator))
            }
        }
    }
}

impl From<SearchCondition> for Condition {
    fn from(leaf: SearchCondition) -> Self {
        Condition::Leaf(leaf)
    }
}

/// A flat list of leaves combined one way, used for `((A|B) AND NOT C)` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    pub conditions: Vec<SearchCondition>,
    #[serde(default)]
    pub combination: CombineMode,
}

impl ConditionGroup {
    pub fn new(conditions: Vec<SearchCondition>, combination: CombineMode) -> Self {
        Self {
            conditions,
            combination,
        }
    }
}

/// One of the ten structural relationship operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HierarchyOperator {
    /// `>` left is the direct parent of right
    #[serde(rename = ">")]
    ParentOf,
    /// `<` left is a direct child of right
    #[serde(rename = "<")]
    ChildOf,
    /// `>>` left is an ancestor of right
    #[serde(rename = ">>")]
    AncestorOf,
    /// `<<` left is a descendant of right
    #[serde(rename = "<<")]
    DescendantOf,
    /// `=>` same node, or left is the direct parent of right
    #[serde(rename = "=>")]
    FlexibleParentOf,
    /// `<=` same node, or right is the direct parent of left
    #[serde(rename = "<=")]
    FlexibleChildOf,
    /// `=>>` same node, or left is an ancestor of right
    #[serde(rename = "=>>")]
    FlexibleAncestorOf,
    /// `<<=` same node, or right is an ancestor of left
    #[serde(rename = "<<=")]
    FlexibleDescendantOf,
    /// `<=>` same node, or either side is the direct parent of the other
    #[serde(rename = "<=>")]
    Bidirectional,
    /// `<<=>>` same node, or either side is an ancestor of the other
    #[serde(rename = "<<=>>")]
    DeepBidirectional,
}

impl HierarchyOperator {
    /// Operators ordered longest symbol first, the order the expression
    /// parser must test them in
    pub const BY_SYMBOL_LENGTH: [HierarchyOperator; 10] = [
        HierarchyOperator::DeepBidirectional,
        HierarchyOperator::Bidirectional,
        HierarchyOperator::FlexibleDescendantOf,
        HierarchyOperator::FlexibleAncestorOf,
        HierarchyOperator::AncestorOf,
        HierarchyOperator::DescendantOf,
        HierarchyOperator::FlexibleParentOf,
        HierarchyOperator::FlexibleChildOf,
        HierarchyOperator::ParentOf,
        HierarchyOperator::ChildOf,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            HierarchyOperator::ParentOf => ">",
            HierarchyOperator::ChildOf => "<",
            HierarchyOperator::AncestorOf => ">>",
            HierarchyOperator::DescendantOf => "<<",
            HierarchyOperator::FlexibleParentOf => "=>",
            HierarchyOperator::FlexibleChildOf => "<=",
            HierarchyOperator::FlexibleAncestorOf => "=>>",
            HierarchyOperator::FlexibleDescendantOf => "<<=",
            HierarchyOperator::Bidirectional => "<=>",
            HierarchyOperator::DeepBidirectional => "<<=>>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Result<Self> {
        Self::BY_SYMBOL_LENGTH
            .into_iter()
            .find(|op| op.symbol() == symbol.trim())
            .ok_or_else(|| {
                SearchError::validation(format!(
                    "unsupported hierarchy operator '{}'; expected one of: {}",
                    symbol,
                    Self::BY_SYMBOL_LENGTH.map(|op| op.symbol()).join(" ")
                ))
            })
    }

    /// Whether the operator walks more than one level
    pub fn is_deep(self) -> bool {
        matches!(
            self,
            HierarchyOperator::AncestorOf
                | HierarchyOperator::DescendantOf
                | HierarchyOperator::FlexibleAncestorOf
                | HierarchyOperator::FlexibleDescendantOf
                | HierarchyOperator::DeepBidirectional
        )
    }
}

impl fmt::Display for HierarchyOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Two condition trees related by a structural operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyCondition {
    pub operator: HierarchyOperator,
    pub left: Condition,
    pub right: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in HierarchyOperator::BY_SYMBOL_LENGTH {
            assert_eq!(HierarchyOperator::from_symbol(op.symbol()).unwrap(), op);
        }
        assert!(HierarchyOperator::from_symbol("<>").unwrap_err().is_validation());
    }

    #[test]
    fn test_operators_sorted_longest_first() {
        let lengths: Vec<usize> = HierarchyOperator::BY_SYMBOL_LENGTH
            .iter()
            .map(|op| op.symbol().len())
            .collect();
        let mut sorted = lengths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(lengths, sorted);
    }

    #[test]
    fn test_condition_deserializes_from_caller_json() {
        let condition: SearchCondition = serde_json::from_value(json!({
            "type": "page_ref",
            "text": "Project Alpha",
            "matchMode": "exact",
            "negate": true,
            "expansionStrategy": "synonyms"
        }))
        .unwrap();

        assert_eq!(condition.kind, ConditionKind::PageRef);
        assert_eq!(condition.pattern, "Project Alpha");
        assert_eq!(condition.match_mode, MatchMode::Exact);
        assert!(condition.negate);
        assert_eq!(condition.weight, 1.0);
        assert_eq!(
            condition.expansion_strategy,
            Some(ExpansionStrategy::Synonyms)
        );
    }

    #[test]
    fn test_combine_mode_accepts_lowercase() {
        let mode: CombineMode = serde_json::from_value(json!("or")).unwrap();
        assert_eq!(mode, CombineMode::Or);
        assert_eq!(serde_json::to_value(CombineMode::And).unwrap(), json!("AND"));
    }

    #[test]
    fn test_validate_rejects_bad_leaves() {
        assert!(SearchCondition::text("  ").validate().is_err());
        assert!(SearchCondition::text("x").with_weight(-1.0).validate().is_err());
        assert!(SearchCondition::regex("(unclosed").validate().is_err());
        assert!(SearchCondition::page_ref_or(["", " "]).validate().is_err());
        assert!(SearchCondition::text("fine").validate().is_ok());
    }

    #[test]
    fn test_display_text() {
        let condition = Condition::and(vec![
            Condition::or(vec![
                SearchCondition::text("Alpha").into(),
                SearchCondition::page_ref("Beta").into(),
            ]),
            SearchCondition::text("done").negated().into(),
        ]);
        assert_eq!(condition.display_text(), "(Alpha OR [[Beta]]) AND NOT done");
        assert_eq!(condition.leaves().len(), 3);
    }

    #[test]
    fn test_page_ref_or_titles() {
        let condition = SearchCondition::page_ref_or(["A", "B C"]);
        assert_eq!(condition.pattern, "A|B C");
        assert_eq!(condition.titles(), vec!["A", "B C"]);
    }
}
