/// Configuration for the lexical expander and its cache
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound on terms a single expansion may return
const MAX_SUPPORTED_TERMS: usize = 64;

/// Word tables consulted by the thesaurus-backed strategies
///
/// Keys are matched case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thesaurus {
    #[serde(default)]
    pub synonyms: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub related: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub broader: HashMap<String, Vec<String>>,
}

impl Thesaurus {
    fn lookup<'a>(table: &'a HashMap<String, Vec<String>>, term: &str) -> &'a [String] {
        let needle = term.to_lowercase();
        table
            .iter()
            .find(|(key, _)| key.to_lowercase() == needle)
            .map(|(_, terms)| terms.as_slice())
            .unwrap_or(&[])
    }

    pub fn synonyms_of(&self, term: &str) -> &[String] {
        Self::lookup(&self.synonyms, term)
    }

    pub fn related_to(&self, term: &str) -> &[String] {
        Self::lookup(&self.related, term)
    }

    pub fn broader_than(&self, term: &str) -> &[String] {
        Self::lookup(&self.broader, term)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionConfig {
    /// Maximum number of terms returned per expansion
    pub max_terms: usize,

    /// Maximum number of cached expansions
    pub cache_capacity: usize,

    /// Terms shorter than this are not fuzzed
    pub min_term_length: usize,

    #[serde(default)]
    pub thesaurus: Thesaurus,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_terms: 8,
            cache_capacity: 256,
            min_term_length: 2,
            thesaurus: Thesaurus::default(),
        }
    }
}

impl ExpansionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_terms == 0 {
            return Err("max_terms must be greater than 0".to_string());
        }

        if self.max_terms > MAX_SUPPORTED_TERMS {
            return Err(format!(
                "max_terms cannot exceed {}",
                MAX_SUPPORTED_TERMS
            ));
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExpansionConfig::default();
        assert_eq!(config.max_terms, 8);
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.min_term_length, 2);
        assert!(config.thesaurus.synonyms.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ExpansionConfig::default();
        assert!(config.validate().is_ok());

        config.max_terms = 0;
        assert!(config.validate().is_err());

        config.max_terms = 100;
        assert!(config.validate().is_err());

        config.max_terms = 8;
        config.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thesaurus_lookup_ignores_case() {
        let mut thesaurus = Thesaurus::default();
        thesaurus
            .synonyms
            .insert("Car".to_string(), vec!["automobile".to_string()]);

        assert_eq!(thesaurus.synonyms_of("car"), ["automobile".to_string()]);
        assert_eq!(thesaurus.synonyms_of("CAR"), ["automobile".to_string()]);
        assert!(thesaurus.related_to("car").is_empty());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ExpansionConfig = serde_json::from_str(
            r#"{"maxTerms": 4, "cacheCapacity": 10, "minTermLength": 3}"#,
        )
        .unwrap();
        assert_eq!(config.max_terms, 4);
        assert!(config.thesaurus.broader.is_empty());
    }
}
