//! Constraint module - the fundamental unit of the Stratum ledger

use crate::provenance::Provenance;
use crate::scope::Scope;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors produced when parsing constraint identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Identifier was empty
    Empty,

    /// Base part contains characters outside `[A-Za-z0-9_-]`
    InvalidBase(String),

    /// Revision suffix is not lowercase ASCII letters
    InvalidSuffix(String),
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdError::Empty => write!(f, "Identifier cannot be empty"),
            IdError::InvalidBase(id) => write!(f, "Invalid identifier base in '{}'", id),
            IdError::InvalidSuffix(id) => write!(f, "Invalid revision suffix in '{}'", id),
        }
    }
}

impl std::error::Error for IdError {}

/// Dotted constraint identifier (`C121`, `C498.a`, `C498.ab`)
///
/// The part before the dot is the *base*, shared by every version of a
/// family. The optional suffix is a bijective base-26 letter sequence:
/// `a` is the first revision, `z` the 26th, `aa` the 27th.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConstraintId(String);

/// Identifier of a constraint family (the base id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FamilyId(String);

impl ConstraintId {
    /// Parse and validate a constraint identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_domain::ConstraintId;
    ///
    /// let id = ConstraintId::parse("C498.a").unwrap();
    /// assert_eq!(id.base(), "C498");
    /// assert_eq!(id.suffix(), Some("a"));
    /// assert!(ConstraintId::parse("C498.A").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let (base, suffix) = match s.split_once('.') {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (s, None),
        };

        let base_ok = !base.is_empty()
            && base
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !base_ok {
            return Err(IdError::InvalidBase(s.to_string()));
        }

        if let Some(suffix) = suffix {
            if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(IdError::InvalidSuffix(s.to_string()));
            }
        }

        Ok(Self(s.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base part of the identifier
    pub fn base(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(base, _)| base)
    }

    /// Revision suffix, if any
    pub fn suffix(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, suffix)| suffix)
    }

    /// Family this identifier names by convention
    pub fn family(&self) -> FamilyId {
        FamilyId(self.base().to_string())
    }

    /// Identifier for the n-th revision of a base (`n == 0` is the base itself)
    pub fn revision(base: &FamilyId, n: u32) -> Self {
        if n == 0 {
            return Self(base.0.clone());
        }
        Self(format!("{}.{}", base.0, suffix_for(n)))
    }
}

/// Bijective base-26 suffix: 1 -> a, 26 -> z, 27 -> aa
fn suffix_for(mut n: u32) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ConstraintId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConstraintId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConstraintId> for String {
    fn from(id: ConstraintId) -> Self {
        id.0
    }
}

impl FamilyId {
    /// Create a family id from a base string
    pub fn new(base: impl Into<String>) -> Self {
        Self(base.into())
    }

    /// Get family id as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a stored version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Current head of its family
    Active,

    /// Replaced by a later version
    Superseded,

    /// Removed (tiers 3-4 only); the record is kept for history
    Discarded,
}

impl Status {
    /// Get status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "ACTIVE",
            Status::Superseded => "SUPERSEDED",
            Status::Discarded => "DISCARDED",
        }
    }

    /// Parse status (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Status::Active),
            "SUPERSEDED" => Some(Status::Superseded),
            "DISCARDED" => Some(Status::Discarded),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A note left by the contradiction checker for human review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNote {
    /// Record the note concerns, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<ConstraintId>,

    /// What made the check ambiguous
    pub reason: String,
}

impl ReviewNote {
    /// Create a note
    pub fn new(related: Option<ConstraintId>, reason: impl Into<String>) -> Self {
        Self {
            related,
            reason: reason.into(),
        }
    }
}

/// Outcome of the contradiction check recorded on an accepted record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "notes", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    /// Appended without a contradiction check (restore, replay)
    #[default]
    Unchecked,

    /// Checked, no ambiguity found
    Clear,

    /// Accepted, but flagged for human review
    Unverified(Vec<ReviewNote>),
}

impl ReviewState {
    /// Whether the record is flagged for review
    pub fn is_unverified(&self) -> bool {
        matches!(self, ReviewState::Unverified(_))
    }

    /// Whether the record passed a check cleanly
    pub fn is_clear(&self) -> bool {
        matches!(self, ReviewState::Clear)
    }
}

/// A candidate constraint as authored in a phase import
///
/// Candidates carry the authoring declarations the contradiction checker acts
/// on. They become [`Constraint`] versions once the ledger accepts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Requested identifier; reusing the active head id requests a revision
    pub id: ConstraintId,

    /// Opaque statement text
    pub statement: String,

    /// Requested tier
    pub tier: Tier,

    /// Scope
    pub scope: Scope,

    /// Origin of the record
    #[serde(default)]
    pub provenance: Provenance,

    /// Version this candidate revises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ConstraintId>,

    /// Normalized key of the underlying claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_key: Option<String>,

    /// Records declared mutually exclusive with this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<ConstraintId>,

    /// Records this one explicitly contradicts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contradicts: Vec<ConstraintId>,

    /// Evidence supporting a promotion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Candidate {
    /// Create a candidate with no declarations
    pub fn new(id: ConstraintId, statement: impl Into<String>, tier: Tier, scope: Scope) -> Self {
        Self {
            id,
            statement: statement.into(),
            tier,
            scope,
            provenance: Provenance::default(),
            supersedes: None,
            claim_key: None,
            excludes: Vec::new(),
            contradicts: Vec::new(),
            evidence: None,
        }
    }

    /// Set the provenance
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Declare the version this candidate revises
    pub fn superseding(mut self, predecessor: ConstraintId) -> Self {
        self.supersedes = Some(predecessor);
        self
    }

    /// Set the claim key
    pub fn with_claim_key(mut self, key: impl Into<String>) -> Self {
        self.claim_key = Some(key.into());
        self
    }

    /// Declare a mutually exclusive record
    pub fn excluding(mut self, id: ConstraintId) -> Self {
        self.excludes.push(id);
        self
    }

    /// Declare an explicit contradiction
    pub fn contradicting(mut self, id: ConstraintId) -> Self {
        self.contradicts.push(id);
        self
    }

    /// Attach promotion evidence
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Whether the candidate declares any conflict relation
    pub fn declares_relations(&self) -> bool {
        !self.excludes.is_empty() || !self.contradicts.is_empty()
    }
}

/// A stored, immutable constraint version
///
/// Versions are never edited once committed; revisions and edits create new
/// versions in the same family. Supersession links live in the provenance
/// graph, not on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Unique identifier
    pub id: ConstraintId,

    /// Family (base id) this version belongs to
    pub family: FamilyId,

    /// Position within the family (0 = first version)
    pub version: u32,

    /// Opaque statement text
    pub statement: String,

    /// Epistemic tier
    pub tier: Tier,

    /// Scope
    pub scope: Scope,

    /// Origin of the record
    pub provenance: Provenance,

    /// Lifecycle status
    pub status: Status,

    /// Normalized key of the underlying claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_key: Option<String>,

    /// Records declared mutually exclusive with this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<ConstraintId>,

    /// Records this one explicitly contradicts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contradicts: Vec<ConstraintId>,

    /// Evidence recorded with a promotion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    /// Contradiction-check outcome
    #[serde(default)]
    pub review: ReviewState,

    /// Commit time (seconds since Unix epoch)
    pub committed_at: u64,
}

impl Constraint {
    /// Materialize a candidate as a stored version
    pub fn from_candidate(
        candidate: Candidate,
        id: ConstraintId,
        family: FamilyId,
        version: u32,
        review: ReviewState,
        committed_at: u64,
    ) -> Self {
        Self {
            id,
            family,
            version,
            statement: candidate.statement,
            tier: candidate.tier,
            scope: candidate.scope,
            provenance: candidate.provenance,
            status: Status::Active,
            claim_key: candidate.claim_key,
            excludes: candidate.excludes,
            contradicts: candidate.contradicts,
            evidence: candidate.evidence,
            review,
            committed_at,
        }
    }

    /// Whether this version is the active head of its family
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Whether this version is binding (tiers 0-2, not discarded)
    pub fn is_binding(&self) -> bool {
        self.tier.is_binding() && self.status != Status::Discarded
    }

    /// Whether this version declares a relation to the given family
    pub fn declares_against(&self, family: &FamilyId) -> bool {
        self.excludes
            .iter()
            .chain(self.contradicts.iter())
            .any(|id| &id.family() == family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parts() {
        let id = ConstraintId::parse("C498.b").unwrap();
        assert_eq!(id.base(), "C498");
        assert_eq!(id.suffix(), Some("b"));
        assert_eq!(id.family(), FamilyId::new("C498"));

        let base = ConstraintId::parse("C121").unwrap();
        assert_eq!(base.suffix(), None);
        assert_eq!(base.family().as_str(), "C121");
    }

    #[test]
    fn test_invalid_ids() {
        assert_eq!(ConstraintId::parse(""), Err(IdError::Empty));
        assert!(matches!(ConstraintId::parse("C 1"), Err(IdError::InvalidBase(_))));
        assert!(matches!(ConstraintId::parse(".a"), Err(IdError::InvalidBase(_))));
        assert!(matches!(ConstraintId::parse("C1."), Err(IdError::InvalidSuffix(_))));
        assert!(matches!(ConstraintId::parse("C1.a.b"), Err(IdError::InvalidSuffix(_))));
        assert!(matches!(ConstraintId::parse("C1.1"), Err(IdError::InvalidSuffix(_))));
    }

    #[test]
    fn test_revision_suffixes() {
        let family = FamilyId::new("C498");
        assert_eq!(ConstraintId::revision(&family, 0).as_str(), "C498");
        assert_eq!(ConstraintId::revision(&family, 1).as_str(), "C498.a");
        assert_eq!(ConstraintId::revision(&family, 4).as_str(), "C498.d");
        assert_eq!(ConstraintId::revision(&family, 26).as_str(), "C498.z");
        assert_eq!(ConstraintId::revision(&family, 27).as_str(), "C498.aa");
        assert_eq!(ConstraintId::revision(&family, 53).as_str(), "C498.ba");
    }

    #[test]
    fn test_candidate_builder() {
        let candidate = Candidate::new(
            ConstraintId::parse("C130").unwrap(),
            "token class X never follows Y",
            Tier::Falsified,
            Scope::B,
        )
        .with_claim_key("x-follows-y")
        .contradicting(ConstraintId::parse("C12").unwrap());

        assert!(candidate.declares_relations());
        assert_eq!(candidate.claim_key.as_deref(), Some("x-follows-y"));
    }

    #[test]
    fn test_review_state_serde() {
        let state = ReviewState::Unverified(vec![ReviewNote::new(None, "shared claim key")]);
        let json = serde_json::to_string(&state).unwrap();
        let back: ReviewState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
        assert!(back.is_unverified());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: every generated revision id parses back into the same family
        #[test]
        fn test_revision_ids_roundtrip(base in "[A-Z][0-9]{1,4}", n in 0u32..2000) {
            let family = FamilyId::new(base.clone());
            let id = ConstraintId::revision(&family, n);
            let parsed = ConstraintId::parse(id.as_str()).unwrap();
            prop_assert_eq!(parsed.family(), family);
            prop_assert_eq!(parsed.suffix().is_some(), n > 0);
        }

        /// Property: distinct revision numbers never collide
        #[test]
        fn test_revision_ids_distinct(a in 0u32..5000, b in 0u32..5000) {
            let family = FamilyId::new("C1");
            let left = ConstraintId::revision(&family, a);
            let right = ConstraintId::revision(&family, b);
            prop_assert_eq!(left == right, a == b);
        }
    }
}
