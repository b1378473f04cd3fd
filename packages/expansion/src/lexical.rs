//! Deterministic, offline term expansion
//!
//! `LexicalExpander` covers every [`ExpansionStrategy`] without a model:
//! fuzzy variants come from simple English inflection rules, the
//! thesaurus-backed strategies read the configured word tables, and
//! `custom` echoes the caller's hint terms.

use crate::backend::ExpansionBackend;
use crate::config::ExpansionConfig;
use crate::error::{ExpansionError, Result};
use crate::strategy::{ContextHints, ExpansionStrategy};
use async_trait::async_trait;
use std::collections::HashSet;

pub struct LexicalExpander {
    config: ExpansionConfig,
}

impl LexicalExpander {
    pub fn new(config: ExpansionConfig) -> Result<Self> {
        config.validate().map_err(ExpansionError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Run one (non-`All`) strategy for `term`
    fn run_step(&self, term: &str, step: ExpansionStrategy, hints: &ContextHints) -> Vec<String> {
        let thesaurus = &self.config.thesaurus;
        match step {
            ExpansionStrategy::Fuzzy => fuzzy_variants(term, self.config.min_term_length),
            ExpansionStrategy::Synonyms => thesaurus.synonyms_of(term).to_vec(),
            ExpansionStrategy::RelatedConcepts => thesaurus.related_to(term).to_vec(),
            ExpansionStrategy::BroaderTerms => thesaurus.broader_than(term).to_vec(),
            ExpansionStrategy::Custom => hints.custom_terms.clone(),
            ExpansionStrategy::All => Vec::new(),
        }
    }
}

#[async_trait]
impl ExpansionBackend for LexicalExpander {
    async fn expand(
        &self,
        term: &str,
        strategy: ExpansionStrategy,
        hints: &ContextHints,
    ) -> Result<Vec<String>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ExpansionError::EmptyTerm);
        }

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(term.to_lowercase());

        let mut terms = Vec::new();
        for step in strategy.steps() {
            for candidate in self.run_step(term, step, hints) {
                let candidate = candidate.trim().to_string();
                if candidate.is_empty() || !seen.insert(candidate.to_lowercase()) {
                    continue;
                }
                terms.push(candidate);
            }
        }
        terms.truncate(self.config.max_terms);

        tracing::debug!(
            "Expanded '{}' with {} into {} term(s)",
            term,
            strategy,
            terms.len()
        );
        Ok(terms)
    }
}

/// Spelling variants of `term`: number inflection, verb stems, separators
pub fn fuzzy_variants(term: &str, min_term_length: usize) -> Vec<String> {
    let lower = term.trim().to_lowercase();
    if lower.chars().count() < min_term_length {
        return Vec::new();
    }

    let mut variants = Vec::new();

    if let Some(stem) = lower.strip_suffix("ies") {
        variants.push(format!("{}y", stem));
    } else if lower.ends_with("ss") {
        variants.push(format!("{}es", lower));
    } else if let Some(stem) = lower.strip_suffix('s') {
        variants.push(stem.to_string());
    } else if let Some(stem) = lower.strip_suffix('y').filter(|s| !ends_with_vowel(s)) {
        variants.push(format!("{}ies", stem));
    } else if ["x", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        variants.push(format!("{}es", lower));
    } else {
        variants.push(format!("{}s", lower));
    }

    if let Some(stem) = lower.strip_suffix("ing").filter(|s| s.chars().count() >= 2) {
        variants.push(stem.to_string());
        variants.push(format!("{}ed", stem));
    } else if let Some(stem) = lower.strip_suffix("ed").filter(|s| s.chars().count() >= 2) {
        variants.push(stem.to_string());
        variants.push(format!("{}ing", stem));
    }

    if lower.contains('-') {
        variants.push(lower.replace('-', " "));
        variants.push(lower.replace('-', ""));
    } else if lower.contains(' ') {
        variants.push(lower.replace(' ', "-"));
    }

    variants.retain(|v| !v.is_empty() && *v != lower);
    variants
}

fn ends_with_vowel(s: &str) -> bool {
    matches!(s.chars().last(), Some('a' | 'e' | 'i' | 'o' | 'u'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thesaurus;

    fn expander_with_thesaurus() -> LexicalExpander {
        let mut thesaurus = Thesaurus::default();
        thesaurus.synonyms.insert(
            "task".to_string(),
            vec!["todo".to_string(), "chore".to_string()],
        );
        thesaurus
            .related
            .insert("task".to_string(), vec!["project".to_string()]);
        thesaurus
            .broader
            .insert("task".to_string(), vec!["work".to_string()]);

        LexicalExpander::new(ExpansionConfig {
            thesaurus,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_fuzzy_plural_and_singular() {
        assert_eq!(fuzzy_variants("task", 2), vec!["tasks"]);
        assert_eq!(fuzzy_variants("tasks", 2), vec!["task"]);
        assert_eq!(fuzzy_variants("category", 2), vec!["categories"]);
        assert_eq!(fuzzy_variants("categories", 2), vec!["category"]);
        assert_eq!(fuzzy_variants("box", 2), vec!["boxes"]);
        assert_eq!(fuzzy_variants("class", 2), vec!["classes"]);
    }

    #[test]
    fn test_fuzzy_verb_stems_and_separators() {
        let variants = fuzzy_variants("planning", 2);
        assert!(variants.contains(&"plann".to_string()));
        assert!(variants.contains(&"planned".to_string()));

        let variants = fuzzy_variants("to-do", 2);
        assert!(variants.contains(&"to do".to_string()));
        assert!(variants.contains(&"todo".to_string()));
    }

    #[test]
    fn test_fuzzy_skips_short_terms() {
        assert!(fuzzy_variants("a", 2).is_empty());
    }

    #[test]
    fn test_all_chains_strategies_in_order() {
        let expander = expander_with_thesaurus();
        let terms = tokio_test::block_on(expander.expand(
            "task",
            ExpansionStrategy::All,
            &ContextHints::default(),
        ))
        .unwrap();

        assert_eq!(terms, vec!["tasks", "todo", "chore", "project", "work"]);
    }

    #[test]
    fn test_results_are_capped_and_deduplicated() {
        let mut expander = expander_with_thesaurus();
        expander.config.max_terms = 2;
        let terms = tokio_test::block_on(expander.expand(
            "Task",
            ExpansionStrategy::All,
            &ContextHints::default(),
        ))
        .unwrap();
        assert_eq!(terms.len(), 2);

        let hints = ContextHints::with_custom_terms(["task", "TASK", "job"]);
        let terms = tokio_test::block_on(expander.expand(
            "task",
            ExpansionStrategy::Custom,
            &hints,
        ))
        .unwrap();
        assert_eq!(terms, vec!["job"]);
    }

    #[test]
    fn test_empty_term_is_an_error() {
        let expander = expander_with_thesaurus();
        let result = tokio_test::block_on(expander.expand(
            "   ",
            ExpansionStrategy::Fuzzy,
            &ContextHints::default(),
        ));
        assert_eq!(result, Err(ExpansionError::EmptyTerm));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExpansionConfig {
            max_terms: 0,
            ..Default::default()
        };
        assert!(matches!(
            LexicalExpander::new(config),
            Err(ExpansionError::Config(_))
        ));
    }
}
