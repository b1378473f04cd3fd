//! Condition expansion
//!
//! Leaves carrying an `expansion_strategy` are widened through an
//! [`ExpansionBackend`] before compilation:
//! - positive leaf `t` becomes `OR(t, v1, v2, ...)`
//! - negated leaf `-t` becomes `AND(-t, -v1, -v2, ...)`
//!
//! Backend trouble never fails a request. When the backend errors or returns
//! no variants, the leaf is kept with its term cleaned (trimmed, quotes
//! stripped) and a warning is recorded in the [`SearchContext`]. A term that
//! cleans down to nothing is a validation error.

use crate::conditions::canonicalize;
use crate::models::{Condition, ConditionKind, SearchCondition};
use crate::services::context::SearchContext;
use crate::services::error::{Result, SearchError};
use outline_query_expansion::{ContextHints, ExpansionBackend, ExpansionError};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct ConditionExpander {
    backend: Option<Arc<dyn ExpansionBackend>>,
    hints: ContextHints,
    max_terms: usize,
}

impl std::fmt::Debug for ConditionExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionExpander")
            .field("enabled", &self.backend.is_some())
            .field("max_terms", &self.max_terms)
            .finish()
    }
}

impl ConditionExpander {
    pub fn new(backend: Arc<dyn ExpansionBackend>, max_terms: usize) -> Self {
        Self {
            backend: Some(backend),
            hints: ContextHints::default(),
            max_terms,
        }
    }

    /// An expander with no backend; every expansion request falls back
    pub fn disabled() -> Self {
        Self {
            backend: None,
            hints: ContextHints::default(),
            max_terms: 0,
        }
    }

    pub fn with_hints(mut self, hints: ContextHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Expand every eligible leaf of `condition`
    pub async fn expand(&self, condition: &Condition, ctx: &mut SearchContext) -> Result<Condition> {
        let leaves = condition.leaves();
        if leaves.iter().all(|leaf| leaf.expansion_strategy.is_none()) {
            return Ok(condition.clone());
        }

        let mut replacements = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            replacements.push(self.expand_leaf(leaf, ctx).await?);
        }

        let mut replacements = replacements.into_iter();
        canonicalize(&rebuild(condition, &mut replacements))
    }

    async fn expand_leaf(
        &self,
        leaf: &SearchCondition,
        ctx: &mut SearchContext,
    ) -> Result<Condition> {
        let Some(strategy) = leaf.expansion_strategy else {
            return Ok(Condition::Leaf(leaf.clone()));
        };

        let mut base = leaf.clone();
        base.expansion_strategy = None;
        base.pattern = clean_term(&leaf.pattern);
        if base.pattern.is_empty() {
            return Err(SearchError::validation(format!(
                "term '{}' is empty once quotes are stripped",
                leaf.pattern
            )));
        }

        if !matches!(leaf.kind, ConditionKind::Text | ConditionKind::PageRef) {
            tracing::debug!(
                "Skipping {} expansion for {:?} condition",
                strategy,
                leaf.kind
            );
            return Ok(Condition::Leaf(base));
        }

        let Some(backend) = &self.backend else {
            let error = ExpansionError::Unavailable("no expansion backend configured".to_string());
            return Ok(self.fall_back(base, error, ctx));
        };

        let variants = match backend.expand(&base.pattern, strategy, &self.hints).await {
            Ok(variants) => variants,
            Err(e) => return Ok(self.fall_back(base, e, ctx)),
        };

        let variants = self.select_variants(&base.pattern, variants);
        if variants.is_empty() {
            let error = ExpansionError::no_results(base.pattern.clone());
            return Ok(self.fall_back(base, error, ctx));
        }

        tracing::debug!(
            "Expanded '{}' ({}) into {} variants",
            base.pattern,
            strategy,
            variants.len()
        );
        ctx.record_expansion(base.pattern.clone(), variants.clone());

        let mut operands = vec![Condition::Leaf(base.clone())];
        operands.extend(variants.into_iter().map(|variant| {
            let mut alternative = base.clone();
            alternative.pattern = variant;
            Condition::Leaf(alternative)
        }));

        Ok(if base.negate {
            Condition::and(operands)
        } else {
            Condition::or(operands)
        })
    }

    /// Distinct, non-empty variants other than the term itself, capped
    fn select_variants(&self, term: &str, variants: Vec<String>) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(term.to_lowercase());
        variants
            .into_iter()
            .map(|variant| clean_term(&variant))
            .filter(|variant| !variant.is_empty())
            .filter(|variant| seen.insert(variant.to_lowercase()))
            .take(self.max_terms)
            .collect()
    }

    fn fall_back(
        &self,
        base: SearchCondition,
        error: ExpansionError,
        ctx: &mut SearchContext,
    ) -> Condition {
        let error = SearchError::expansion(base.pattern.clone(), error.to_string());
        tracing::warn!("{}; searching the literal term", error);
        ctx.warn(Some(&base.pattern), error.to_string());
        Condition::Leaf(base)
    }
}

/// Trim whitespace and strip matching surrounding quotes until none remain
pub fn clean_term(term: &str) -> String {
    let mut current = term.trim();
    loop {
        let stripped = ['"', '\'']
            .iter()
            .find_map(|q| current.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)));
        match stripped {
            Some(inner) if current.len() >= 2 => current = inner.trim(),
            _ => return current.to_string(),
        }
    }
}

fn rebuild<I>(condition: &Condition, replacements: &mut I) -> Condition
where
    I: Iterator<Item = Condition>,
{
    match condition {
        Condition::Leaf(leaf) => replacements
            .next()
            .unwrap_or_else(|| Condition::Leaf(leaf.clone())),
        Condition::Compound(compound) => Condition::combine(
            compound.operator,
            compound
                .operands
                .iter()
                .map(|operand| rebuild(operand, replacements))
                .collect(),
        ),
    }
}
