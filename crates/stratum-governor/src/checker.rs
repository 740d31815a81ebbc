//! Contradiction checking against the binding set
//!
//! Detection is conservative: it only acts on declared conflicts (`claim_key`
//! polarity, `contradicts`, `excludes`). Anything it cannot decide passes with
//! review notes instead of blocking.

use crate::{CancellationToken, CheckError, GovernanceConfig};
use std::collections::BTreeMap;
use stratum_domain::{
    Candidate, Constraint, ConstraintId, ConstraintSource, FamilyId, ReviewNote, ReviewState,
};
use tracing::debug;

/// Outcome of checking one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No conflict and nothing ambiguous
    Clear,

    /// No conflict, but some relations could not be decided
    Unverified(Vec<ReviewNote>),

    /// The candidate conflicts with a binding record
    Conflict {
        /// The binding record it conflicts with
        with: ConstraintId,
        /// Why
        reason: String,
    },
}

impl Verdict {
    /// Whether the candidate must be rejected
    pub fn is_conflict(&self) -> bool {
        matches!(self, Verdict::Conflict { .. })
    }

    /// Review state to record on the accepted version (`None` for a conflict)
    pub fn review_state(&self) -> Option<ReviewState> {
        match self {
            Verdict::Clear => Some(ReviewState::Clear),
            Verdict::Unverified(notes) => Some(ReviewState::Unverified(notes.clone())),
            Verdict::Conflict { .. } => None,
        }
    }
}

/// Family a candidate will land in: its supersession target's, else its own base
pub fn candidate_family(candidate: &Candidate) -> FamilyId {
    candidate
        .supersedes
        .as_ref()
        .map(ConstraintId::family)
        .unwrap_or_else(|| candidate.id.family())
}

/// Checks candidates against the active binding set (tiers 0-2)
#[derive(Debug, Clone, Default)]
pub struct ContradictionChecker {
    config: GovernanceConfig,
}

impl ContradictionChecker {
    /// Create a checker with the given configuration
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    /// Create a checker with default configuration
    pub fn default_config() -> Self {
        Self::new(GovernanceConfig::default())
    }

    /// Start a batch session over a pre-batch snapshot
    pub fn begin<'a, S>(&'a self, source: &'a S) -> CheckSession<'a, S>
    where
        S: ConstraintSource + ?Sized,
    {
        CheckSession {
            checker: self,
            source,
            staged: BTreeMap::new(),
        }
    }

    /// Check a single candidate against the binding set of `source`
    pub fn check<S>(
        &self,
        candidate: &Candidate,
        source: &S,
        cancel: &CancellationToken,
    ) -> Result<Verdict, CheckError>
    where
        S: ConstraintSource + ?Sized,
    {
        self.begin(source).check(candidate, cancel)
    }

    /// Check a batch in order
    ///
    /// Each candidate is checked against the pre-batch binding set plus the
    /// earlier members of the batch that passed. Stops at the first conflict;
    /// the returned list then ends with that conflict.
    pub fn check_batch<S>(
        &self,
        candidates: &[Candidate],
        source: &S,
        cancel: &CancellationToken,
    ) -> Result<Vec<Verdict>, CheckError>
    where
        S: ConstraintSource + ?Sized,
    {
        let mut session = self.begin(source);
        let mut verdicts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let verdict = session.check(candidate, cancel)?;
            let conflict = verdict.is_conflict();
            if !conflict {
                session.stage_candidate(candidate);
            }
            verdicts.push(verdict);
            if conflict {
                break;
            }
        }

        Ok(verdicts)
    }
}

/// Working binding set for one batch
///
/// Staged records shadow the snapshot's active head of the same family.
pub struct CheckSession<'a, S: ?Sized> {
    checker: &'a ContradictionChecker,
    source: &'a S,
    staged: BTreeMap<FamilyId, Constraint>,
}

impl<'a, S> CheckSession<'a, S>
where
    S: ConstraintSource + ?Sized,
{
    /// Record an accepted version as part of the working set
    pub fn accept(&mut self, record: Constraint) {
        self.staged.insert(record.family.clone(), record);
    }

    /// Number of records staged in this session
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    fn stage_candidate(&mut self, candidate: &Candidate) {
        let family = candidate_family(candidate);
        let record = Constraint::from_candidate(
            candidate.clone(),
            candidate.id.clone(),
            family,
            0,
            ReviewState::Unchecked,
            0,
        );
        self.accept(record);
    }

    fn head(&self, family: &FamilyId) -> Option<&Constraint> {
        match self.staged.get(family) {
            Some(record) => Some(record),
            None => self.source.active_in_family(family),
        }
    }

    fn binding(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.source
            .binding_constraints()
            .filter(move |r| !self.staged.contains_key(&r.family))
            .chain(self.staged.values().filter(|r| r.is_binding()))
    }

    /// Check one candidate against the working binding set
    pub fn check(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<Verdict, CheckError> {
        if cancel.is_cancelled() {
            return Err(CheckError::Cancelled);
        }

        let config = &self.checker.config;
        let family = candidate_family(candidate);
        let mut notes = Vec::new();

        if config.flag_unresolved_relations {
            self.note_unresolved(candidate, &family, &mut notes);
        }

        let interval = config.cancellation_check_interval.max(1);
        for (scanned, record) in self.binding().enumerate() {
            if scanned > 0 && scanned % interval == 0 && cancel.is_cancelled() {
                return Err(CheckError::Cancelled);
            }
            if record.family == family {
                continue;
            }
            if let Some(reason) = self.compare(candidate, &family, record, &mut notes) {
                debug!(
                    candidate = %candidate.id,
                    with = %record.id,
                    reason = %reason,
                    "Contradiction detected"
                );
                return Ok(Verdict::Conflict {
                    with: record.id.clone(),
                    reason,
                });
            }
        }

        if notes.is_empty() {
            Ok(Verdict::Clear)
        } else {
            debug!(candidate = %candidate.id, notes = notes.len(), "Candidate unverified");
            Ok(Verdict::Unverified(notes))
        }
    }

    fn note_unresolved(&self, candidate: &Candidate, family: &FamilyId, notes: &mut Vec<ReviewNote>) {
        for target in candidate.excludes.iter().chain(&candidate.contradicts) {
            let target_family = target.family();
            if &target_family == family {
                notes.push(ReviewNote::new(
                    Some(target.clone()),
                    "declared relation targets its own family",
                ));
                continue;
            }
            match self.head(&target_family) {
                None => notes.push(ReviewNote::new(
                    Some(target.clone()),
                    "declared relation to an unknown or discarded record",
                )),
                Some(head) if !head.is_binding() => notes.push(ReviewNote::new(
                    Some(head.id.clone()),
                    format!("declared relation to non-binding tier {}", head.tier),
                )),
                Some(_) => {}
            }
        }
    }

    /// Compare against one binding record of another family
    fn compare(
        &self,
        candidate: &Candidate,
        family: &FamilyId,
        record: &Constraint,
        notes: &mut Vec<ReviewNote>,
    ) -> Option<String> {
        let targets = |ids: &[ConstraintId]| ids.iter().any(|id| id.family() == record.family);
        let candidate_excludes = targets(&candidate.excludes);
        let candidate_contradicts = targets(&candidate.contradicts);
        let record_excludes = record.excludes.iter().any(|id| &id.family() == family);
        let record_contradicts = record.contradicts.iter().any(|id| &id.family() == family);
        let declared =
            candidate_excludes || candidate_contradicts || record_excludes || record_contradicts;

        if !candidate.scope.intersects(&record.scope) {
            if declared {
                notes.push(ReviewNote::new(
                    Some(record.id.clone()),
                    format!(
                        "declared relation across disjoint scopes {} and {}",
                        candidate.scope, record.scope
                    ),
                ));
            }
            return None;
        }

        let same_key = matches!(
            (&candidate.claim_key, &record.claim_key),
            (Some(a), Some(b)) if a == b
        );

        if let (Some(ours), Some(theirs)) = (candidate.tier.polarity(), record.tier.polarity()) {
            if same_key && ours == theirs.opposite() {
                return Some(format!(
                    "{} record contradicts {} record {} on the same claim",
                    candidate.tier.as_str(),
                    record.tier.as_str(),
                    record.id
                ));
            }
        }

        if candidate_contradicts {
            if record.tier.is_terminal() {
                return Some(format!(
                    "contradicts {} record {}",
                    record.tier.as_str(),
                    record.id
                ));
            }
            if candidate.tier.is_binding() {
                return Some(format!(
                    "contradicts ESTABLISHED record {} without superseding it",
                    record.id
                ));
            }
            notes.push(ReviewNote::new(
                Some(record.id.clone()),
                "non-binding candidate contradicts a binding record",
            ));
        }

        if candidate_excludes || record_excludes {
            if candidate.tier.is_binding() {
                return Some(format!(
                    "declared mutually exclusive with binding record {}",
                    record.id
                ));
            }
            notes.push(ReviewNote::new(
                Some(record.id.clone()),
                "non-binding candidate is mutually exclusive with a binding record",
            ));
        }

        if record_contradicts {
            notes.push(ReviewNote::new(
                Some(record.id.clone()),
                "binding record declares a contradiction against this family",
            ));
        }

        if same_key && !declared && self.checker.config.flag_shared_claim_keys {
            notes.push(ReviewNote::new(
                Some(record.id.clone()),
                "shares a claim key with a binding record",
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Fit, FitId, Scope, Status, Tier};

    #[derive(Default)]
    struct Fixture {
        records: Vec<Constraint>,
    }

    impl Fixture {
        fn with(mut self, candidate: Candidate) -> Self {
            let family = candidate_family(&candidate);
            let id = candidate.id.clone();
            self.records.push(Constraint::from_candidate(
                candidate,
                id,
                family,
                0,
                ReviewState::Clear,
                0,
            ));
            self
        }
    }

    impl ConstraintSource for Fixture {
        fn constraint(&self, id: &ConstraintId) -> Option<&Constraint> {
            self.records.iter().find(|c| &c.id == id)
        }

        fn active_in_family(&self, family: &FamilyId) -> Option<&Constraint> {
            self.records
                .iter()
                .find(|c| &c.family == family && c.status == Status::Active)
        }

        fn constraints(&self) -> Box<dyn Iterator<Item = &Constraint> + '_> {
            Box::new(self.records.iter())
        }

        fn fit(&self, _id: &FitId) -> Option<&Fit> {
            None
        }

        fn fits(&self) -> Box<dyn Iterator<Item = &Fit> + '_> {
            Box::new(std::iter::empty())
        }
    }

    fn id(s: &str) -> ConstraintId {
        ConstraintId::parse(s).unwrap()
    }

    fn candidate(s: &str, tier: Tier, scope: Scope) -> Candidate {
        Candidate::new(id(s), format!("statement {}", s), tier, scope)
    }

    #[test]
    fn test_clear_when_nothing_declared() {
        let fixture = Fixture::default().with(candidate("C1", Tier::Established, Scope::A));
        let checker = ContradictionChecker::default_config();
        let verdict = checker
            .check(
                &candidate("C2", Tier::Established, Scope::A),
                &fixture,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(verdict, Verdict::Clear);
        assert_eq!(verdict.review_state(), Some(ReviewState::Clear));
    }

    #[test]
    fn test_contradicting_falsified_record_conflicts() {
        let fixture = Fixture::default()
            .with(candidate("C130", Tier::Falsified, Scope::B).with_claim_key("x-holds"));
        let checker = ContradictionChecker::default_config();

        for tier in [Tier::Falsified, Tier::Established] {
            let c = candidate("C131", tier, Scope::B)
                .with_claim_key("x-holds")
                .contradicting(id("C130"));
            let verdict = checker.check(&c, &fixture, &CancellationToken::new()).unwrap();
            match verdict {
                Verdict::Conflict { with, .. } => assert_eq!(with, id("C130")),
                other => panic!("Expected conflict, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_opposite_polarity_same_key_conflicts() {
        let fixture = Fixture::default()
            .with(candidate("C10", Tier::Frozen, Scope::A).with_claim_key("links-dense"));
        let checker = ContradictionChecker::default_config();

        let c = candidate("C11", Tier::Falsified, Scope::Global).with_claim_key("links-dense");
        assert!(checker
            .check(&c, &fixture, &CancellationToken::new())
            .unwrap()
            .is_conflict());

        // Same polarity is only a shared key
        let same = candidate("C12", Tier::Frozen, Scope::A).with_claim_key("links-dense");
        assert!(matches!(
            checker.check(&same, &fixture, &CancellationToken::new()).unwrap(),
            Verdict::Unverified(_)
        ));
    }

    #[test]
    fn test_disjoint_scopes_never_conflict() {
        let fixture = Fixture::default()
            .with(candidate("C10", Tier::Frozen, Scope::A).with_claim_key("k"));
        let checker = ContradictionChecker::default_config();

        let c = candidate("C11", Tier::Falsified, Scope::B)
            .with_claim_key("k")
            .contradicting(id("C10"));
        let verdict = checker.check(&c, &fixture, &CancellationToken::new()).unwrap();
        match verdict {
            Verdict::Unverified(notes) => {
                assert!(notes.iter().any(|n| n.reason.contains("disjoint scopes")));
            }
            other => panic!("Expected unverified, got {:?}", other),
        }
    }

    #[test]
    fn test_contradicting_established_without_superseding() {
        let fixture = Fixture::default().with(candidate("C20", Tier::Established, Scope::A));
        let checker = ContradictionChecker::default_config();

        let binding = candidate("C21", Tier::Established, Scope::A).contradicting(id("C20"));
        assert!(checker
            .check(&binding, &fixture, &CancellationToken::new())
            .unwrap()
            .is_conflict());

        // A revision of the same family is not a contradiction
        let revision = candidate("C20.a", Tier::Established, Scope::A)
            .superseding(id("C20"))
            .contradicting(id("C20"));
        assert!(!checker
            .check(&revision, &fixture, &CancellationToken::new())
            .unwrap()
            .is_conflict());

        // Non-binding candidates only get flagged
        let speculative = candidate("C22", Tier::Speculative, Scope::A).contradicting(id("C20"));
        assert!(matches!(
            checker.check(&speculative, &fixture, &CancellationToken::new()).unwrap(),
            Verdict::Unverified(_)
        ));
    }

    #[test]
    fn test_excludes_both_directions() {
        let fixture = Fixture::default()
            .with(candidate("C30", Tier::Established, Scope::Ht).excluding(id("C31")));
        let checker = ContradictionChecker::default_config();

        let reverse = candidate("C31", Tier::Established, Scope::Ht);
        assert!(checker
            .check(&reverse, &fixture, &CancellationToken::new())
            .unwrap()
            .is_conflict());

        let forward = candidate("C32", Tier::Frozen, Scope::Ht).excluding(id("C30"));
        assert!(checker
            .check(&forward, &fixture, &CancellationToken::new())
            .unwrap()
            .is_conflict());
    }

    #[test]
    fn test_unknown_relation_is_unverified() {
        let fixture = Fixture::default();
        let checker = ContradictionChecker::default_config();
        let c = candidate("C40", Tier::Established, Scope::A).excluding(id("C999"));
        match checker.check(&c, &fixture, &CancellationToken::new()).unwrap() {
            Verdict::Unverified(notes) => {
                assert_eq!(notes.len(), 1);
                assert_eq!(notes[0].related, Some(id("C999")));
            }
            other => panic!("Expected unverified, got {:?}", other),
        }

        let quiet = ContradictionChecker::new(GovernanceConfig::permissive());
        assert_eq!(
            quiet.check(&c, &fixture, &CancellationToken::new()).unwrap(),
            Verdict::Clear
        );
    }

    #[test]
    fn test_batch_sees_earlier_members() {
        let fixture = Fixture::default();
        let checker = ContradictionChecker::default_config();
        let batch = vec![
            candidate("C500", Tier::Falsified, Scope::A).with_claim_key("x"),
            candidate("C501", Tier::Established, Scope::A),
            candidate("C502", Tier::Established, Scope::A).contradicting(id("C500")),
            candidate("C503", Tier::Established, Scope::A),
        ];

        let verdicts = checker
            .check_batch(&batch, &fixture, &CancellationToken::new())
            .unwrap();
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0], Verdict::Clear);
        assert_eq!(verdicts[1], Verdict::Clear);
        assert!(verdicts[2].is_conflict());
    }

    #[test]
    fn test_cancelled_scan() {
        let fixture = Fixture::default().with(candidate("C1", Tier::Established, Scope::A));
        let checker = ContradictionChecker::default_config();
        let token = CancellationToken::new();
        token.cancel();

        let result = checker.check(
            &candidate("C2", Tier::Established, Scope::A),
            &fixture,
            &token,
        );
        assert_eq!(result, Err(CheckError::Cancelled));
    }

    #[test]
    fn test_candidate_family() {
        let plain = candidate("C7", Tier::Established, Scope::A);
        assert_eq!(candidate_family(&plain), FamilyId::new("C7"));
        let revision = candidate("C7.c", Tier::Established, Scope::A).superseding(id("C7.b"));
        assert_eq!(candidate_family(&revision), FamilyId::new("C7"));
    }
}
