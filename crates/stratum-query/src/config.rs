//! Query engine configuration

use serde::{Deserialize, Serialize};

/// Query engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Minimum share of content terms a record must match to be cited (0.0 - 1.0)
    pub relevance_threshold: f64,

    /// Maximum citations per answer or keyword query
    pub max_citations: usize,

    /// Search superseded versions as well as active ones
    pub include_superseded: bool,

    /// Return discarded versions from id and family lookups
    pub include_discarded: bool,

    /// Refuse questions about natural-language meaning
    pub semantic_guard: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.5,
            max_citations: 5,
            include_superseded: false,
            include_discarded: false,
            semantic_guard: true,
        }
    }
}

impl QueryConfig {
    /// Create a strict configuration (every term must match)
    pub fn strict() -> Self {
        Self {
            relevance_threshold: 1.0,
            max_citations: 3,
            ..Self::default()
        }
    }

    /// Create a permissive configuration (any term match, full history)
    pub fn permissive() -> Self {
        Self {
            relevance_threshold: 0.1,
            max_citations: 10,
            include_superseded: true,
            include_discarded: false,
            semantic_guard: true,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.relevance_threshold) || self.relevance_threshold == 0.0 {
            return Err(format!(
                "relevance_threshold must be in (0.0, 1.0], got {}",
                self.relevance_threshold
            ));
        }
        if self.max_citations == 0 {
            return Err("max_citations must be at least 1".to_string());
        }
        Ok(())
    }
}
