//! Content Backend Error Types
//!
//! Errors raised while parsing or evaluating a query inside a content
//! backend. The service layer wraps them into
//! [`SearchError::BackendExecution`](crate::services::SearchError) together
//! with the query text.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Query text is not well-formed
    #[error("Failed to parse query at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// Query is well-formed but uses an unsupported clause shape
    #[error("Invalid clause: {0}")]
    InvalidClause(String),

    /// Function call to something the backend does not provide
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A predicate or function argument was never bound
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    /// Store contents would violate the page/node forest invariants
    #[error("Invalid store data: {0}")]
    InvalidData(String),

    /// Anything else that went wrong while running the query
    #[error("Query execution failed: {0}")]
    Execution(String),
}

impl BackendError {
    /// Create a parse error at a byte offset
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an invalid clause error
    pub fn invalid_clause(msg: impl Into<String>) -> Self {
        Self::InvalidClause(msg.into())
    }

    /// Create an invalid data error
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}
