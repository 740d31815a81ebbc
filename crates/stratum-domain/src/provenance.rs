//! Provenance tracking - where a constraint was authored

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the source location was recorded in the constraint table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Individual record (`-> document`)
    #[default]
    Record,

    /// Grouped batch reference (`in: phase`)
    Batch,
}

/// Origin of a constraint: the phase or document that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Phase or document name (e.g., "phases/AZC_AXIS.md", "PHASE_77")
    pub source: String,

    /// Location notation used by the source table
    #[serde(default)]
    pub kind: LocationKind,
}

impl Provenance {
    /// Provenance pointing at an individual document
    pub fn record(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: LocationKind::Record,
        }
    }

    /// Provenance pointing at a grouped batch
    pub fn batch(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: LocationKind::Batch,
        }
    }

    /// Parse a LOCATION column value (`-> doc` or `in: phase`)
    ///
    /// Bare text is treated as an individual record.
    pub fn parse_location(location: &str) -> Self {
        let location = location.trim();
        if let Some(rest) = location.strip_prefix("->") {
            Self::record(rest.trim())
        } else if let Some(rest) = location.strip_prefix("in:") {
            Self::batch(rest.trim())
        } else {
            Self::record(location)
        }
    }

    /// Whether any source was recorded
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            return Ok(());
        }
        match self.kind {
            LocationKind::Record => write!(f, "-> {}", self.source),
            LocationKind::Batch => write!(f, "in: {}", self.source),
        }
    }
}
