/// Configuration for the search services
use crate::query::CompileOptions;
use serde::{Deserialize, Serialize};

/// Hard ceiling for `max_traversal_depth`
/// Each level of a deep traversal costs one backend round trip
const MAX_SUPPORTED_TRAVERSAL_DEPTH: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Prefix contains-style patterns with `(?i)`
    pub case_insensitive: bool,

    /// Depth used by deep operators when a request gives none (None = unbounded)
    pub default_max_depth: Option<usize>,

    /// Safety cap on levels walked by deep traversal, applied after `max_depth`
    pub max_traversal_depth: usize,

    /// Maximum expansion variants kept per term
    pub max_expansion_terms: usize,

    /// Truncate result lists to this many entries
    pub result_limit: Option<usize>,

    /// Binding variable for the filtered node in compiled queries
    pub node_var: String,

    /// Read positive operands of a mixed-polarity AND list as alternatives;
    /// `false` keeps every operand a separate conjunct
    pub collapse_alternatives: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            default_max_depth: None,
            max_traversal_depth: 32,
            max_expansion_terms: 8,
            result_limit: None,
            node_var: "?b".to_string(),
            collapse_alternatives: true,
        }
    }
}

impl SearchConfig {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            case_insensitive: self.case_insensitive,
            collapse_alternatives: self.collapse_alternatives,
        }
    }

    /// Depth limit for a deep traversal: request value, then default, capped
    pub fn effective_depth(&self, requested: Option<usize>) -> usize {
        requested
            .or(self.default_max_depth)
            .unwrap_or(self.max_traversal_depth)
            .min(self.max_traversal_depth)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_traversal_depth == 0 {
            return Err("max_traversal_depth must be greater than 0".to_string());
        }

        if self.max_traversal_depth > MAX_SUPPORTED_TRAVERSAL_DEPTH {
            return Err(format!(
                "max_traversal_depth cannot exceed {}",
                MAX_SUPPORTED_TRAVERSAL_DEPTH
            ));
        }

        if self.default_max_depth == Some(0) {
            return Err("default_max_depth must be greater than 0 when set".to_string());
        }

        if self.result_limit == Some(0) {
            return Err("result_limit must be greater than 0 when set".to_string());
        }

        let var = self.node_var.as_str();
        if var.len() < 2
            || !var.starts_with('?')
            || !var[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!("node_var '{}' is not a valid query variable", var));
        }

        Ok(())
    }
}
