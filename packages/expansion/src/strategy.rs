//! Expansion strategies and caller-supplied context hints

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a term should be widened before searching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    /// Spelling and inflection variants (plurals, stems, separators)
    Fuzzy,
    /// Words with the same meaning
    Synonyms,
    /// Associated but distinct concepts
    RelatedConcepts,
    /// More general terms
    BroaderTerms,
    /// Terms supplied by the caller through [`ContextHints::custom_terms`]
    Custom,
    /// Fuzzy, then synonyms, then related concepts, then broader terms
    All,
}

impl ExpansionStrategy {
    /// Order in which `All` runs the individual strategies
    pub const CHAIN: [ExpansionStrategy; 4] = [
        ExpansionStrategy::Fuzzy,
        ExpansionStrategy::Synonyms,
        ExpansionStrategy::RelatedConcepts,
        ExpansionStrategy::BroaderTerms,
    ];

    /// Strategies to run, in order, for this strategy
    pub fn steps(self) -> Vec<ExpansionStrategy> {
        match self {
            ExpansionStrategy::All => Self::CHAIN.to_vec(),
            other => vec![other],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpansionStrategy::Fuzzy => "fuzzy",
            ExpansionStrategy::Synonyms => "synonyms",
            ExpansionStrategy::RelatedConcepts => "related_concepts",
            ExpansionStrategy::BroaderTerms => "broader_terms",
            ExpansionStrategy::Custom => "custom",
            ExpansionStrategy::All => "all",
        }
    }
}

impl fmt::Display for ExpansionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra context forwarded to the expansion backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHints {
    /// Terms to use verbatim for the `custom` strategy
    #[serde(default)]
    pub custom_terms: Vec<String>,

    /// Page titles the search is scoped to, if any
    #[serde(default)]
    pub page_titles: Vec<String>,

    /// Free-form description of what the caller is looking for
    #[serde(default)]
    pub intent: Option<String>,
}

impl ContextHints {
    pub fn with_custom_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            custom_terms: terms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}
