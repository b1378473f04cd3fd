//! Condition Normalization
//!
//! The single boundary where caller input becomes a canonical [`Condition`].
//! Everything downstream (expansion, compilation, execution) matches on the
//! canonical tree and never inspects input shapes again.
//!
//! Canonical form:
//! - leaves are validated
//! - a compound never has exactly one operand (it is replaced by the operand)
//! - a compound never directly contains a compound with the same operator
//!   (the inner operands are spliced in place)
//!
//! Normalization changes shape only, never meaning, and is idempotent.

use crate::models::{CombineMode, Condition, ConditionGroup, SearchCondition};
use crate::services::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

/// Caller-facing condition input
///
/// Exactly one of `conditions` or `condition_groups` must be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionInput {
    /// Simple conditions combined with `combine`
    #[serde(default)]
    pub conditions: Vec<SearchCondition>,

    #[serde(default)]
    pub combine: CombineMode,

    /// Grouped conditions combined with `group_combine`
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroup>,

    #[serde(default)]
    pub group_combine: CombineMode,
}

impl ConditionInput {
    pub fn single(condition: SearchCondition) -> Self {
        Self {
            conditions: vec![condition],
            ..Default::default()
        }
    }

    pub fn list(conditions: Vec<SearchCondition>, combine: CombineMode) -> Self {
        Self {
            conditions,
            combine,
            ..Default::default()
        }
    }

    pub fn groups(condition_groups: Vec<ConditionGroup>, group_combine: CombineMode) -> Self {
        Self {
            condition_groups,
            group_combine,
            ..Default::default()
        }
    }
}

impl From<SearchCondition> for ConditionInput {
    fn from(condition: SearchCondition) -> Self {
        Self::single(condition)
    }
}

/// Turn caller input into a canonical condition tree
///
/// # Errors
///
/// Returns `Validation` if both or neither of simple conditions and groups are
/// supplied, if any group is empty, or if any leaf is invalid.
pub fn normalize(input: &ConditionInput) -> Result<Condition> {
    let has_simple = !input.conditions.is_empty();
    let has_groups = !input.condition_groups.is_empty();

    let tree = match (has_simple, has_groups) {
        (true, true) => {
            return Err(SearchError::validation(
                "provide either conditions or conditionGroups, not both",
            ))
        }
        (false, false) => return Err(SearchError::validation("condition list is empty")),
        (true, false) => Condition::combine(
            input.combine,
            input.conditions.iter().cloned().map(Condition::Leaf).collect(),
        ),
        (false, true) => {
            let groups = input
                .condition_groups
                .iter()
                .enumerate()
                .map(|(index, group)| group_to_condition(index, group))
                .collect::<Result<Vec<_>>>()?;
            Condition::combine(input.group_combine, groups)
        }
    };

    canonicalize(&tree)
}

fn group_to_condition(index: usize, group: &ConditionGroup) -> Result<Condition> {
    if group.conditions.is_empty() {
        return Err(SearchError::validation(format!(
            "condition group {} is empty",
            index
        )));
    }
    Ok(Condition::combine(
        group.combination,
        group.conditions.iter().cloned().map(Condition::Leaf).collect(),
    ))
}

/// Canonicalize an existing condition tree (clone-and-normalize)
pub fn canonicalize(condition: &Condition) -> Result<Condition> {
    match condition {
        Condition::Leaf(leaf) => {
            leaf.validate()?;
            Ok(Condition::Leaf(leaf.clone()))
        }
        Condition::Compound(compound) => {
            if compound.operands.is_empty() {
                return Err(SearchError::validation(format!(
                    "{} condition has no operands",
                    compound.operator
                )));
            }

            let mut operands = Vec::with_capacity(compound.operands.len());
            for operand in &compound.operands {
                match canonicalize(operand)? {
                    Condition::Compound(inner) if inner.operator == compound.operator => {
                        operands.extend(inner.operands)
                    }
                    other => operands.push(other),
                }
            }

            if operands.len() == 1 {
                Ok(operands.remove(0))
            } else {
                Ok(Condition::combine(compound.operator, operands))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConditionKind;
    use serde_json::json;

    fn text(p: &str) -> SearchCondition {
        SearchCondition::text(p)
    }

    #[test]
    fn test_single_condition_becomes_leaf() {
        let condition = normalize(&ConditionInput::single(text("Alpha"))).unwrap();
        assert_eq!(condition, Condition::Leaf(text("Alpha")));
    }

    #[test]
    fn test_list_becomes_compound() {
        let input = ConditionInput::list(vec![text("a"), text("b")], CombineMode::Or);
        let condition = normalize(&input).unwrap();
        assert_eq!(
            condition,
            Condition::or(vec![text("a").into(), text("b").into()])
        );
    }

    #[test]
    fn test_groups_flatten_under_group_combine() {
        // ((A | B) AND NOT C)
        let input = ConditionInput::groups(
            vec![
                ConditionGroup::new(vec![text("A"), text("B")], CombineMode::Or),
                ConditionGroup::new(vec![text("C").negated()], CombineMode::And),
            ],
            CombineMode::And,
        );
        let condition = normalize(&input).unwrap();
        assert_eq!(
            condition,
            Condition::and(vec![
                Condition::or(vec![text("A").into(), text("B").into()]),
                text("C").negated().into(),
            ])
        );
    }

    #[test]
    fn test_same_operator_groups_are_spliced() {
        let input = ConditionInput::groups(
            vec![
                ConditionGroup::new(vec![text("A"), text("B")], CombineMode::And),
                ConditionGroup::new(vec![text("C")], CombineMode::Or),
            ],
            CombineMode::And,
        );
        let condition = normalize(&input).unwrap();
        assert_eq!(
            condition,
            Condition::and(vec![text("A").into(), text("B").into(), text("C").into()])
        );
    }

    #[test]
    fn test_both_inputs_rejected() {
        let input = ConditionInput {
            conditions: vec![text("a")],
            condition_groups: vec![ConditionGroup::new(vec![text("b")], CombineMode::And)],
            ..Default::default()
        };
        assert!(normalize(&input).unwrap_err().is_validation());
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(normalize(&ConditionInput::default())
            .unwrap_err()
            .is_validation());

        let input = ConditionInput::groups(
            vec![ConditionGroup::new(vec![], CombineMode::And)],
            CombineMode::Or,
        );
        assert!(normalize(&input).unwrap_err().is_validation());
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let nested = Condition::and(vec![
            Condition::and(vec![
                text("a").into(),
                Condition::or(vec![text("b").into()]),
            ]),
            Condition::or(vec![text("c").into(), text("d").into()]),
        ]);
        let once = canonicalize(&nested).unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            once,
            Condition::and(vec![
                text("a").into(),
                text("b").into(),
                Condition::or(vec![text("c").into(), text("d").into()]),
            ])
        );
    }

    #[test]
    fn test_normalize_does_not_mutate_input() {
        let input = ConditionInput::list(vec![text("a"), text("b")], CombineMode::And);
        let before = input.clone();
        normalize(&input).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn test_input_deserializes_from_json() {
        let input: ConditionInput = serde_json::from_value(json!({
            "conditions": [
                {"type": "text", "text": "Alpha"},
                {"type": "page_ref", "text": "Beta", "matchMode": "exact"}
            ],
            "combine": "OR"
        }))
        .unwrap();
        let condition = normalize(&input).unwrap();
        let leaves = condition.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[1].kind, ConditionKind::PageRef);
    }
}
