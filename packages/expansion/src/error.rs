/// Error types for the term expansion engine
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpansionError {
    #[error("Expansion backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cannot expand an empty term")]
    EmptyTerm,

    #[error("No expansions found for term '{term}'")]
    NoResults { term: String },

    #[error("Expansion backend failed: {0}")]
    Backend(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ExpansionError {
    pub fn no_results(term: impl Into<String>) -> Self {
        Self::NoResults { term: term.into() }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ExpansionError>;
