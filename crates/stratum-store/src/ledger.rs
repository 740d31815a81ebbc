//! Append-only ledger of constraint versions
//!
//! Versions are never edited or deleted. A revision inserts a new version and
//! marks the previous head SUPERSEDED; a discard only flips the status.

use crate::{FrozenCause, LedgerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_domain::{
    Candidate, Constraint, ConstraintId, FamilyId, ReviewState, Status, Tier,
};
use stratum_governor::{candidate_family, TierGovernor, TransitionKind};
use tracing::debug;

/// Change notification emitted for every accepted mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A version was appended
    Appended {
        /// New version id
        id: ConstraintId,
        /// Family it belongs to
        family: FamilyId,
        /// Tier of the new version
        tier: Tier,
        /// What the append amounted to
        kind: TransitionKind,
        /// Previous head, now SUPERSEDED
        supersedes: Option<ConstraintId>,
    },

    /// A version was discarded
    Discarded {
        /// Discarded version id
        id: ConstraintId,
        /// Family it belongs to
        family: FamilyId,
    },
}

impl LedgerEvent {
    /// Family touched by the event
    pub fn family(&self) -> &FamilyId {
        match self {
            LedgerEvent::Appended { family, .. } | LedgerEvent::Discarded { family, .. } => family,
        }
    }
}

/// Resolved placement of a candidate, computed before any mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendPlan {
    /// Id the version will be stored under
    pub id: ConstraintId,
    /// Family
    pub family: FamilyId,
    /// Position within the family
    pub version: u32,
    /// Current head that will be superseded
    pub predecessor: Option<ConstraintId>,
    /// Tier of that head
    pub previous_tier: Option<Tier>,
    /// Transition kind authorized by the governor
    pub kind: TransitionKind,
}

/// Append-only store of immutable constraint versions with a family index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    versions: BTreeMap<ConstraintId, Constraint>,
    families: BTreeMap<FamilyId, Vec<ConstraintId>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether no version is stored
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Get a stored version
    pub fn get_version(&self, id: &ConstraintId) -> Result<&Constraint, LedgerError> {
        self.versions
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    /// Get a stored version, if present
    pub fn get(&self, id: &ConstraintId) -> Option<&Constraint> {
        self.versions.get(id)
    }

    /// Every version of a family, oldest first
    pub fn family(&self, family: &FamilyId) -> Vec<&Constraint> {
        self.families
            .get(family)
            .into_iter()
            .flatten()
            .filter_map(|id| self.versions.get(id))
            .collect()
    }

    /// Active head of a family
    pub fn active(&self, family: &FamilyId) -> Option<&Constraint> {
        self.families
            .get(family)?
            .iter()
            .rev()
            .filter_map(|id| self.versions.get(id))
            .find(|c| c.is_active())
    }

    /// Every stored version in id order
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.versions.values()
    }

    /// Every family id
    pub fn family_ids(&self) -> impl Iterator<Item = &FamilyId> + '_ {
        self.families.keys()
    }

    /// Resolve where a candidate lands and authorize the tier change
    ///
    /// Does not mutate. Freezes still need [`TierGovernor::confirm`] once the
    /// contradiction verdict is known.
    pub fn plan(
        &self,
        candidate: &Candidate,
        governor: &TierGovernor,
    ) -> Result<AppendPlan, LedgerError> {
        if let Some(predecessor) = &candidate.supersedes {
            if predecessor.family() != candidate.id.family() {
                return Err(LedgerError::FamilyMismatch {
                    id: candidate.id.clone(),
                    supersedes: predecessor.clone(),
                });
            }
        }

        for named in std::iter::once(&candidate.id).chain(candidate.supersedes.as_ref()) {
            if let Some(existing) = self.versions.get(named) {
                let cause = match existing.status {
                    Status::Active => continue,
                    Status::Superseded => FrozenCause::Superseded,
                    Status::Discarded => FrozenCause::Discarded,
                };
                return Err(LedgerError::FrozenViolation {
                    id: named.clone(),
                    cause,
                });
            }
        }

        let family = candidate_family(candidate);
        let version = self.families.get(&family).map_or(0, |v| v.len()) as u32;

        let Some(head) = self.active(&family) else {
            if let Some(predecessor) = &candidate.supersedes {
                return Err(LedgerError::NotFound(predecessor.clone()));
            }
            return Ok(AppendPlan {
                id: candidate.id.clone(),
                family,
                version,
                predecessor: None,
                previous_tier: None,
                kind: TransitionKind::Insert,
            });
        };

        if head.tier.is_terminal() {
            return Err(LedgerError::FrozenViolation {
                id: head.id.clone(),
                cause: FrozenCause::Terminal(head.tier),
            });
        }

        if let Some(predecessor) = &candidate.supersedes {
            if predecessor != &head.id {
                return Err(LedgerError::NotFound(predecessor.clone()));
            }
        }

        let kind = governor.authorize(head.tier, candidate.tier, candidate.evidence.as_deref())?;

        let id = if candidate.id == head.id {
            self.next_revision_id(&family)
        } else if self.versions.contains_key(&candidate.id) {
            return Err(LedgerError::DuplicateId(candidate.id.clone()));
        } else {
            candidate.id.clone()
        };

        Ok(AppendPlan {
            id,
            family,
            version,
            predecessor: Some(head.id.clone()),
            previous_tier: Some(head.tier),
            kind,
        })
    }

    /// First unused suffixed id in a family (`.a`, `.b`, … `.aa`)
    pub fn next_revision_id(&self, family: &FamilyId) -> ConstraintId {
        (1u32..)
            .map(|n| ConstraintId::revision(family, n))
            .find(|id| !self.versions.contains_key(id))
            .unwrap_or_else(|| ConstraintId::revision(family, u32::MAX))
    }

    /// Insert a planned version
    pub fn apply(
        &mut self,
        candidate: Candidate,
        plan: &AppendPlan,
        review: ReviewState,
        committed_at: u64,
    ) -> LedgerEvent {
        let record = Constraint::from_candidate(
            candidate,
            plan.id.clone(),
            plan.family.clone(),
            plan.version,
            review,
            committed_at,
        );
        let tier = record.tier;
        self.insert_resolved(record, plan.predecessor.as_ref());

        debug!(id = %plan.id, family = %plan.family, kind = ?plan.kind, "Appended constraint version");

        LedgerEvent::Appended {
            id: plan.id.clone(),
            family: plan.family.clone(),
            tier,
            kind: plan.kind,
            supersedes: plan.predecessor.clone(),
        }
    }

    /// Plan, confirm and apply in one step
    pub fn append(
        &mut self,
        candidate: Candidate,
        governor: &TierGovernor,
        review: ReviewState,
        committed_at: u64,
    ) -> Result<LedgerEvent, LedgerError> {
        let plan = self.plan(&candidate, governor)?;
        if let Some(previous) = plan.previous_tier {
            governor.confirm(plan.kind, previous, &review)?;
        }
        Ok(self.apply(candidate, &plan, review, committed_at))
    }

    /// Insert an already-resolved version (log replay and trusted restore)
    ///
    /// Marks `predecessor` SUPERSEDED when given.
    pub fn insert_resolved(&mut self, record: Constraint, predecessor: Option<&ConstraintId>) {
        if let Some(previous) = predecessor.and_then(|id| self.versions.get_mut(id)) {
            previous.status = Status::Superseded;
        }
        let ids = self.families.entry(record.family.clone()).or_default();
        if !ids.contains(&record.id) {
            ids.push(record.id.clone());
        }
        self.versions.insert(record.id.clone(), record);
    }

    /// Discard an active tier-3/4 version
    pub fn discard(
        &mut self,
        id: &ConstraintId,
        governor: &TierGovernor,
    ) -> Result<LedgerEvent, LedgerError> {
        let record = self.get_version(id)?;
        match record.status {
            Status::Active => {}
            Status::Superseded => {
                return Err(LedgerError::FrozenViolation {
                    id: id.clone(),
                    cause: FrozenCause::Superseded,
                })
            }
            Status::Discarded => {
                return Err(LedgerError::FrozenViolation {
                    id: id.clone(),
                    cause: FrozenCause::Discarded,
                })
            }
        }
        governor.authorize_discard(record.tier)?;
        let family = record.family.clone();

        self.mark_discarded(id);
        debug!(id = %id, "Discarded constraint version");

        Ok(LedgerEvent::Discarded {
            id: id.clone(),
            family,
        })
    }

    /// Flip a version to DISCARDED without checks (log replay)
    pub fn mark_discarded(&mut self, id: &ConstraintId) {
        if let Some(record) = self.versions.get_mut(id) {
            record.status = Status::Discarded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::Scope;
    use stratum_governor::GovernorError;

    fn id(s: &str) -> ConstraintId {
        ConstraintId::parse(s).unwrap()
    }

    fn candidate(s: &str, tier: Tier) -> Candidate {
        Candidate::new(id(s), format!("statement {}", s), tier, Scope::A)
    }

    fn append(ledger: &mut Ledger, c: Candidate) -> Result<LedgerEvent, LedgerError> {
        ledger.append(c, &TierGovernor::default_config(), ReviewState::Clear, 100)
    }

    #[test]
    fn test_insert_new_family() {
        let mut ledger = Ledger::new();
        let event = append(&mut ledger, candidate("C121", Tier::Frozen)).unwrap();
        assert_eq!(
            event,
            LedgerEvent::Appended {
                id: id("C121"),
                family: FamilyId::new("C121"),
                tier: Tier::Frozen,
                kind: TransitionKind::Insert,
                supersedes: None,
            }
        );
        let stored = ledger.get_version(&id("C121")).unwrap();
        assert_eq!(stored.version, 0);
        assert_eq!(stored.status, Status::Active);
        assert_eq!(stored.committed_at, 100);
    }

    #[test]
    fn test_revision_allocates_suffix() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C498", Tier::Established)).unwrap();
        append(&mut ledger, candidate("C498", Tier::Established)).unwrap();

        let family = ledger.family(&FamilyId::new("C498"));
        assert_eq!(family.len(), 2);
        assert_eq!(family[0].status, Status::Superseded);
        assert_eq!(family[1].id, id("C498.a"));
        assert_eq!(family[1].version, 1);
        assert_eq!(ledger.active(&FamilyId::new("C498")).unwrap().id, id("C498.a"));
    }

    #[test]
    fn test_explicit_revision_id() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C12", Tier::Established)).unwrap();
        let event = append(
            &mut ledger,
            candidate("C12.b", Tier::Established).superseding(id("C12")),
        )
        .unwrap();
        assert!(matches!(
            event,
            LedgerEvent::Appended { ref id, kind: TransitionKind::Revise, .. } if id.as_str() == "C12.b"
        ));
        assert_eq!(ledger.next_revision_id(&FamilyId::new("C12")), id("C12.a"));
    }

    #[test]
    fn test_editing_superseded_version_is_frozen_violation() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C498", Tier::Established)).unwrap();
        append(
            &mut ledger,
            candidate("C498.a", Tier::Established).superseding(id("C498")),
        )
        .unwrap();

        let err = append(&mut ledger, candidate("C498", Tier::Established)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::FrozenViolation {
                id: id("C498"),
                cause: FrozenCause::Superseded,
            }
        );
    }

    #[test]
    fn test_terminal_family_refuses_versions() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C130", Tier::Falsified)).unwrap();

        for tier in Tier::ALL {
            let err = append(&mut ledger, candidate("C130", tier)).unwrap_err();
            assert!(matches!(
                err,
                LedgerError::FrozenViolation { cause: FrozenCause::Terminal(Tier::Falsified), .. }
            ));
        }
    }

    #[test]
    fn test_illegal_transition_reported_by_governor() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C9", Tier::Established)).unwrap();
        let err = append(&mut ledger, candidate("C9", Tier::Speculative)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Governor(GovernorError::IllegalTierTransition { .. })
        ));
    }

    #[test]
    fn test_freeze_requires_clear_review() {
        let governor = TierGovernor::default_config();
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C40", Tier::Established)).unwrap();

        let promoted = candidate("C40", Tier::Frozen).with_evidence("replicated in phase 80");
        let err = ledger
            .append(promoted.clone(), &governor, ReviewState::Unchecked, 0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Governor(_)));

        ledger.append(promoted, &governor, ReviewState::Clear, 0).unwrap();
        let head = ledger.active(&FamilyId::new("C40")).unwrap();
        assert_eq!(head.tier, Tier::Frozen);
        assert_eq!(head.id, id("C40.a"));
    }

    #[test]
    fn test_family_mismatch() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C1", Tier::Established)).unwrap();
        let err = append(
            &mut ledger,
            candidate("C2", Tier::Established).superseding(id("C1")),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::FamilyMismatch { .. }));
    }

    #[test]
    fn test_discard_rules() {
        let governor = TierGovernor::default_config();
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C70", Tier::Speculative)).unwrap();
        append(&mut ledger, candidate("C71", Tier::Established)).unwrap();

        ledger.discard(&id("C70"), &governor).unwrap();
        assert_eq!(ledger.get_version(&id("C70")).unwrap().status, Status::Discarded);
        assert!(ledger.active(&FamilyId::new("C70")).is_none());

        assert!(matches!(
            ledger.discard(&id("C70"), &governor),
            Err(LedgerError::FrozenViolation { cause: FrozenCause::Discarded, .. })
        ));
        assert!(matches!(
            ledger.discard(&id("C71"), &governor),
            Err(LedgerError::Governor(GovernorError::IllegalDiscard(Tier::Established)))
        ));
        assert!(matches!(
            ledger.discard(&id("C99"), &governor),
            Err(LedgerError::NotFound(_))
        ));

        // A discarded family accepts a fresh head
        append(&mut ledger, candidate("C70.a", Tier::Exploratory)).unwrap();
        assert_eq!(ledger.active(&FamilyId::new("C70")).unwrap().version, 1);
    }

    #[test]
    fn test_naming_the_head_requests_a_revision() {
        let mut ledger = Ledger::new();
        append(&mut ledger, candidate("C3", Tier::Exploratory)).unwrap();
        append(&mut ledger, candidate("C3.c", Tier::Exploratory)).unwrap();
        // C3.c is now the head; naming it again is a revision
        append(&mut ledger, candidate("C3.c", Tier::Exploratory)).unwrap();
        assert_eq!(ledger.active(&FamilyId::new("C3")).unwrap().id, id("C3.a"));
        assert_eq!(ledger.family(&FamilyId::new("C3")).len(), 3);
    }
}
