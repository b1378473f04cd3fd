//! Request-scoped search bookkeeping
//!
//! One `SearchContext` is created per request and threaded through the
//! services by `&mut`. Concurrent sub-searches each fill a child context and
//! hand it back; the caller merges children once every branch has resolved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// A recovered, non-fatal problem encountered while serving a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    pub message: String,
}

/// Informational counters reported alongside results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub queries_executed: usize,
    /// Matches per condition, keyed by display text
    pub match_counts: BTreeMap<String, usize>,
    /// Expansion variants actually used, keyed by original term
    pub expansions: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<SearchWarning>,
    pub elapsed_ms: u64,
}

#[derive(Debug)]
pub struct SearchContext {
    stats: SearchStats,
    started: Instant,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchContext {
    pub fn new() -> Self {
        Self {
            stats: SearchStats::default(),
            started: Instant::now(),
        }
    }

    /// Fresh context for an independent sub-search
    pub fn child(&self) -> Self {
        Self::new()
    }

    pub fn record_query(&mut self) {
        self.stats.queries_executed += 1;
    }

    /// Add `count` matches for the condition labelled `label`
    pub fn record_matches(&mut self, label: impl Into<String>, count: usize) {
        *self.stats.match_counts.entry(label.into()).or_insert(0) += count;
    }

    pub fn record_expansion(&mut self, term: impl Into<String>, variants: Vec<String>) {
        self.stats.expansions.insert(term.into(), variants);
    }

    pub fn warn(&mut self, term: Option<&str>, message: impl Into<String>) {
        self.stats.warnings.push(SearchWarning {
            term: term.map(str::to_string),
            message: message.into(),
        });
    }

    /// Fold a finished child context into this one
    pub fn merge(&mut self, child: SearchContext) {
        let child = child.stats;
        self.stats.queries_executed += child.queries_executed;
        for (label, count) in child.match_counts {
            *self.stats.match_counts.entry(label).or_insert(0) += count;
        }
        self.stats.expansions.extend(child.expansions);
        self.stats.warnings.extend(child.warnings);
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn match_count(&self, label: &str) -> usize {
        self.stats.match_counts.get(label).copied().unwrap_or(0)
    }

    pub fn warnings(&self) -> &[SearchWarning] {
        &self.stats.warnings
    }

    /// Final stats with elapsed time filled in
    pub fn finish(mut self) -> SearchStats {
        self.stats.elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_counts_and_keeps_warnings() {
        let mut root = SearchContext::new();
        root.record_query();
        root.record_matches("Alpha", 2);

        let mut left = root.child();
        left.record_query();
        left.record_matches("Alpha", 1);
        left.warn(Some("Beta"), "expansion unavailable");

        let mut right = root.child();
        right.record_query();
        right.record_matches("done", 4);

        root.merge(left);
        root.merge(right);

        assert_eq!(root.stats().queries_executed, 3);
        assert_eq!(root.match_count("Alpha"), 3);
        assert_eq!(root.match_count("done"), 4);
        assert_eq!(root.match_count("missing"), 0);
        assert_eq!(root.warnings().len(), 1);

        let stats = root.finish();
        assert_eq!(stats.warnings[0].term.as_deref(), Some("Beta"));
    }

    #[test]
    fn test_independent_contexts_do_not_share_counts() {
        let mut a = SearchContext::new();
        let b = SearchContext::new();
        a.record_matches("x", 5);
        assert_eq!(b.match_count("x"), 0);
    }
}
