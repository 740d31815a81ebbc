//! Phase batches - the unit of atomic ingestion

use crate::constraint::Candidate;
use crate::fit::FitSubmission;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a phase import based on UUIDv7
///
/// UUIDv7 keeps phase ids chronologically sortable, which is the order the
/// commit log is replayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhaseId(u128);

impl PhaseId {
    /// Generate a new UUIDv7-based PhaseId
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_domain::PhaseId;
    ///
    /// let id = PhaseId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a PhaseId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a PhaseId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid UUIDv7 string: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Timestamp component of the UUIDv7 (milliseconds since Unix epoch)
    pub fn timestamp(&self) -> u64 {
        (self.0 >> 80) as u64
    }
}

impl Default for PhaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl TryFrom<String> for PhaseId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(&value)
    }
}

impl From<PhaseId> for String {
    fn from(id: PhaseId) -> Self {
        id.to_string()
    }
}

/// A research phase: N candidate constraints plus M fits, applied atomically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseBatch {
    /// Batch identifier
    #[serde(default)]
    pub id: PhaseId,

    /// Phase name (e.g., "PHASE_77_LINK_DENSITY")
    pub phase: String,

    /// Candidate constraints, applied in order
    #[serde(default)]
    pub constraints: Vec<Candidate>,

    /// Fits registered after the constraints
    #[serde(default)]
    pub fits: Vec<FitSubmission>,
}

impl PhaseBatch {
    /// Create an empty batch for a phase
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            id: PhaseId::new(),
            phase: phase.into(),
            constraints: Vec::new(),
            fits: Vec::new(),
        }
    }

    /// Add a candidate constraint
    pub fn with_constraint(mut self, candidate: Candidate) -> Self {
        self.constraints.push(candidate);
        self
    }

    /// Add a fit
    pub fn with_fit(mut self, fit: FitSubmission) -> Self {
        self.fits.push(fit);
        self
    }

    /// Whether the batch carries nothing
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.fits.is_empty()
    }

    /// Families touched by the batch's candidates, sorted and deduplicated
    ///
    /// A candidate declaring `supersedes` touches the predecessor's family as
    /// well as its own.
    pub fn families(&self) -> Vec<crate::FamilyId> {
        let mut families: Vec<crate::FamilyId> = self
            .constraints
            .iter()
            .flat_map(|c| {
                std::iter::once(c.id.family()).chain(c.supersedes.iter().map(|p| p.family()))
            })
            .collect();
        families.sort();
        families.dedup();
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConstraintId, Scope, Tier};

    #[test]
    fn test_phase_id_display_and_parse() {
        let id = PhaseId::new();
        let parsed = PhaseId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(PhaseId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn test_phase_ids_ordered() {
        let first = PhaseId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = PhaseId::new();
        assert!(first < second);
    }

    #[test]
    fn test_batch_families() {
        let id = |s: &str| ConstraintId::parse(s).unwrap();
        let batch = PhaseBatch::new("P1")
            .with_constraint(Candidate::new(id("C2.a"), "x", Tier::Established, Scope::A))
            .with_constraint(Candidate::new(id("C1"), "y", Tier::Established, Scope::A))
            .with_constraint(Candidate::new(id("C2.b"), "z", Tier::Established, Scope::A));

        let families: Vec<String> = batch.families().iter().map(|f| f.to_string()).collect();
        assert_eq!(families, vec!["C1", "C2"]);
    }

    #[test]
    fn test_manifest_json() {
        let json = r#"{
            "phase": "PHASE_12",
            "constraints": [
                {"id": "C130", "statement": "X is absent", "tier": 1, "scope": "B",
                 "claim_key": "x-present"}
            ],
            "fits": []
        }"#;
        let batch: PhaseBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.phase, "PHASE_12");
        assert_eq!(batch.constraints[0].tier, Tier::Falsified);
        assert!(batch.constraints[0].supersedes.is_none());
    }
}
