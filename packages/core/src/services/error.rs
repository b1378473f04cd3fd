//! Service Layer Error Types
//!
//! Every public search operation returns [`SearchError`]. Input problems are
//! rejected as `Validation` before any backend call; backend failures carry
//! the query text that produced them.

use thiserror::Error;

/// Search operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Malformed or conflicting caller input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Internal invariant violated while emitting query text
    #[error("Query compilation failed: {0}")]
    QueryCompilation(String),

    /// The content backend rejected or failed to run a query
    #[error("Backend execution failed: {message} (query: {query})")]
    BackendExecution { message: String, query: String },

    /// Term expansion failed; recovered by searching the literal term
    #[error("Expansion of '{term}' failed: {message}")]
    Expansion { term: String, message: String },

    /// A previous result id could not be resolved
    #[error("{}", describe_missing_reference(.requested, .available, .suggestion.as_deref()))]
    ResultReferenceNotFound {
        requested: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },
}

fn describe_missing_reference(
    requested: &str,
    available: &[String],
    suggestion: Option<&str>,
) -> String {
    let mut message = format!("Result '{}' not found.", requested);
    if available.is_empty() {
        message.push_str(" No results are stored yet.");
    } else {
        message.push_str(&format!(" Available results: {}.", available.join(", ")));
    }
    if let Some(suggestion) = suggestion {
        message.push_str(&format!(" Did you mean '{}'?", suggestion));
    }
    message
}

impl SearchError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a query compilation error
    pub fn query_compilation(msg: impl Into<String>) -> Self {
        Self::QueryCompilation(msg.into())
    }

    /// Create a backend execution error carrying the offending query
    pub fn backend_execution(message: impl Into<String>, query: impl Into<String>) -> Self {
        Self::BackendExecution {
            message: message.into(),
            query: query.into(),
        }
    }

    /// Create an expansion error
    pub fn expansion(term: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expansion {
            term: term.into(),
            message: message.into(),
        }
    }

    /// Create a missing result reference error
    pub fn result_reference_not_found(
        requested: impl Into<String>,
        available: Vec<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self::ResultReferenceNotFound {
            requested: requested.into(),
            available,
            suggestion,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_includes_query() {
        let err = SearchError::backend_execution("unknown attribute", "[:find ?b :where]");
        let text = err.to_string();
        assert!(text.contains("unknown attribute"));
        assert!(text.contains("[:find ?b :where]"));
    }

    #[test]
    fn test_missing_reference_message_lists_ids_and_suggestion() {
        let err = SearchError::result_reference_not_found(
            "find_blocks_9",
            vec!["find_blocks_1".to_string(), "find_pages_1".to_string()],
            Some("find_blocks_1".to_string()),
        );
        let text = err.to_string();
        assert!(text.contains("'find_blocks_9' not found"));
        assert!(text.contains("find_blocks_1, find_pages_1"));
        assert!(text.contains("Did you mean 'find_blocks_1'?"));
    }

    #[test]
    fn test_missing_reference_message_without_results() {
        let err = SearchError::result_reference_not_found("x", vec![], None);
        assert!(err.to_string().contains("No results are stored yet"));
    }
}
