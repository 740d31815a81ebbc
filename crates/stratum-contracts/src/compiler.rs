//! Contract compilation, lock verification and draft caching

use crate::{ContractError, Selector};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stratum_domain::{
    Constraint, ConstraintId, ConstraintSource, Contract, ContractKey, ContractMeta,
    ContractStatus, FitId, SectionEntry, SectionKind, Status, Tier,
};
use stratum_store::{tsv, LedgerEvent, Snapshot, Store, StoreError, StoreEvent};
use tracing::{debug, info};

/// Disclaimer stamped on every compiled contract
pub const DEFAULT_GOVERNANCE_NOTE: &str =
    "Derived view of binding constraints. Statements are copied verbatim from the ledger; \
     the ledger remains authoritative.";

/// Lock commits attempted before giving up on a contended store
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: usize = 8;

/// Explicit routing for one contract section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Target section
    pub kind: SectionKind,

    /// Narrowing selector applied on top of the contract selector; `None`
    /// routes nothing from the selection
    #[serde(default)]
    pub selector: Option<String>,

    /// Extra ids cited verbatim (constraint or fit ids)
    #[serde(default)]
    pub cite: Vec<String>,
}

impl SectionSpec {
    /// Empty spec for a section
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            selector: None,
            cite: Vec::new(),
        }
    }

    /// Route selected records matching `selector` into this section
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Cite an id explicitly
    pub fn cite(mut self, id: impl Into<String>) -> Self {
        self.cite.push(id.into());
        self
    }
}

/// Section a selected record lands in when no explicit specs are given
pub fn default_section(tier: Tier) -> SectionKind {
    match tier {
        Tier::Frozen => SectionKind::Guarantees,
        Tier::Falsified => SectionKind::Disallowed,
        _ => SectionKind::Invariants,
    }
}

#[derive(Debug, Clone)]
struct Draft {
    selector: Selector,
    sections: Vec<SectionSpec>,
    contract: Contract,
}

/// Builds and locks contracts against store snapshots
///
/// Drafts are cached by name and version. A cached draft is reused only for
/// the snapshot sequence it was compiled at, and is dropped early when
/// [`ContractCompiler::observe`] sees a commit that could change it.
#[derive(Debug)]
pub struct ContractCompiler {
    governance_note: String,
    max_commit_attempts: usize,
    drafts: RwLock<HashMap<ContractKey, Draft>>,
}

impl ContractCompiler {
    /// Create a compiler with the default governance note
    pub fn new() -> Self {
        Self::with_governance_note(DEFAULT_GOVERNANCE_NOTE)
    }

    /// Create a compiler with a custom governance note
    pub fn with_governance_note(note: impl Into<String>) -> Self {
        Self {
            governance_note: note.into(),
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            drafts: RwLock::new(HashMap::new()),
        }
    }

    /// Bound the commits [`ContractCompiler::lock`] attempts
    pub fn with_max_commit_attempts(mut self, attempts: usize) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    /// Number of cached drafts
    pub fn cached_drafts(&self) -> usize {
        self.drafts.read().len()
    }

    /// Compile a DRAFT contract from the active binding records of `snapshot`
    ///
    /// Without `sections`, selected records are routed by tier: 0 to
    /// guarantees, 1 to disallowed, 2 to invariants. Rebuilding identical
    /// content under a locked key returns the locked artifact; different
    /// content fails with [`ContractError::ImmutableContractViolation`].
    pub fn build(
        &self,
        snapshot: &Snapshot,
        name: &str,
        version: &str,
        selector: &str,
        sections: &[SectionSpec],
    ) -> Result<Contract, ContractError> {
        let key = ContractKey::new(name, version);
        let selector = Selector::parse(selector)?;
        let locked = snapshot.contract(&key);

        if locked.is_none() {
            if let Some(draft) = self.drafts.read().get(&key) {
                if draft.contract.meta.compiled_at_sequence == snapshot.sequence
                    && draft.selector == selector
                    && draft.sections == sections
                {
                    debug!(contract = %key, "Draft cache hit");
                    return Ok(draft.contract.clone());
                }
            }
        }

        let contract = self.compile(snapshot, &key, &selector, sections)?;

        if let Some(locked) = locked {
            if same_content(locked, &contract) {
                return Ok(locked.clone());
            }
            return Err(ContractError::ImmutableContractViolation(key.to_string()));
        }

        info!(
            contract = %key,
            entries = contract.entry_count(),
            sequence = snapshot.sequence,
            "Compiled contract draft"
        );
        self.drafts.write().insert(
            key,
            Draft {
                selector,
                sections: sections.to_vec(),
                contract: contract.clone(),
            },
        );
        Ok(contract)
    }

    fn compile(
        &self,
        snapshot: &Snapshot,
        key: &ContractKey,
        selector: &Selector,
        sections: &[SectionSpec],
    ) -> Result<Contract, ContractError> {
        let mut meta = ContractMeta::new(key.name.clone(), key.version.clone(), selector.as_str());
        meta.governance = self.governance_note.clone();
        meta.compiled_at_sequence = snapshot.sequence;
        let mut contract = Contract::new(meta);

        let selected: Vec<&Constraint> = snapshot
            .binding_constraints()
            .filter(|c| selector.matches(c))
            .collect();

        if sections.is_empty() {
            for record in selected {
                contract
                    .section_mut(default_section(record.tier))
                    .push(constraint_entry(record));
            }
        } else {
            for spec in sections {
                let narrowing = spec.selector.as_deref().map(Selector::parse).transpose()?;
                let entries = contract.section_mut(spec.kind);
                if let Some(narrowing) = &narrowing {
                    entries.extend(
                        selected
                            .iter()
                            .filter(|c| narrowing.matches(c))
                            .map(|c| constraint_entry(c)),
                    );
                }
                entries.extend(spec.cite.iter().map(|id| cited_entry(snapshot, id)));
            }
        }

        contract.refresh_provenance();
        Ok(contract)
    }

    /// Lock a contract and record it in the store
    ///
    /// Locking content identical to an already locked artifact returns that
    /// artifact without a new commit. A commit that loses the race to another
    /// writer is retried up to the configured number of attempts.
    pub fn lock(&self, store: &Store, contract: Contract) -> Result<Contract, ContractError> {
        let key = contract.key();
        let mut locked = contract;
        locked.meta.status = ContractStatus::Locked;
        locked.refresh_provenance();

        for attempt in 1..=self.max_commit_attempts {
            let mut txn = store.begin();

            if let Some(existing) = txn.snapshot().contract(&key) {
                if same_content(existing, &locked) {
                    debug!(contract = %key, "Contract already locked");
                    return Ok(existing.clone());
                }
                return Err(ContractError::ImmutableContractViolation(key.to_string()));
            }

            verify(&locked, txn.snapshot())?;

            match txn.record_contract(locked.clone()) {
                Ok(_) => {}
                Err(StoreError::ContractLocked(_)) => {
                    return Err(ContractError::ImmutableContractViolation(key.to_string()))
                }
                Err(e) => return Err(e.into()),
            }

            match store.commit(txn) {
                Ok(snapshot) => {
                    self.drafts.write().remove(&key);
                    info!(
                        contract = %key,
                        references = locked.provenance.len(),
                        sequence = snapshot.sequence,
                        "Locked contract"
                    );
                    return Ok(locked);
                }
                Err(StoreError::Stale { .. }) => {
                    debug!(contract = %key, attempt, "Lock raced a commit, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ContractError::RetriesExhausted {
            contract: key.to_string(),
            attempts: self.max_commit_attempts,
        })
    }

    /// Drop cached drafts a committed event could change
    ///
    /// Returns the number of drafts invalidated.
    pub fn observe(&self, event: &StoreEvent) -> usize {
        let families = event.families();
        if families.is_empty() {
            return 0;
        }
        let appended_tier = match event {
            StoreEvent::Constraint {
                event: LedgerEvent::Appended { tier, .. },
            } => Some(*tier),
            _ => None,
        };

        let mut drafts = self.drafts.write();
        let before = drafts.len();
        drafts.retain(|key, draft| {
            let touched = draft.contract.all_references().iter().any(|reference| {
                ConstraintId::parse(reference)
                    .map(|id| families.contains(&id.family()))
                    .unwrap_or(false)
            });
            let admits = appended_tier.is_some_and(|tier| {
                families.iter().any(|f| draft.selector.may_match(f, tier))
            });
            if touched || admits {
                debug!(contract = %key, "Invalidated draft");
            }
            !(touched || admits)
        });
        before - drafts.len()
    }

    /// Observe every event of a commit
    pub fn observe_all<'a>(&self, events: impl IntoIterator<Item = &'a StoreEvent>) -> usize {
        events.into_iter().map(|e| self.observe(e)).sum()
    }
}

impl Default for ContractCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that every reference resolves to a non-discarded binding constraint
pub fn verify<S>(contract: &Contract, source: &S) -> Result<(), ContractError>
where
    S: ConstraintSource + ?Sized,
{
    let key = contract.key().to_string();

    for reference in contract.all_references() {
        if let Ok(fit_id) = FitId::new(reference.as_str()) {
            if let Some(fit) = source.fit(&fit_id) {
                return Err(ContractError::NonBindingReference {
                    contract: key,
                    id: reference,
                    reason: format!("fit with tier label {}", fit.tier.as_str()),
                });
            }
        }

        let record = tsv::normalize_id(&reference)
            .ok()
            .and_then(|id| source.constraint(&id));

        match record {
            None => {
                return Err(ContractError::UnresolvedProvenance {
                    contract: key,
                    id: reference,
                })
            }
            Some(record) if record.status == Status::Discarded => {
                return Err(ContractError::UnresolvedProvenance {
                    contract: key,
                    id: reference,
                })
            }
            Some(record) if !record.tier.is_binding() => {
                return Err(ContractError::NonBindingReference {
                    contract: key,
                    id: reference,
                    reason: format!("constraint at tier {}", record.tier),
                })
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Whether two contracts carry the same content (status and compile sequence ignored)
fn same_content(a: &Contract, b: &Contract) -> bool {
    a.meta.name == b.meta.name
        && a.meta.version == b.meta.version
        && a.meta.selector == b.meta.selector
        && a.guarantees == b.guarantees
        && a.invariants == b.invariants
        && a.disallowed == b.disallowed
        && a.all_references() == b.all_references()
}

fn constraint_entry(record: &Constraint) -> SectionEntry {
    SectionEntry {
        id: record.id.to_string(),
        statement: Some(record.statement.clone()),
        tier: Some(record.tier),
        scope: Some(record.scope),
        provenance: vec![record.id.to_string()],
    }
}

fn cited_entry(snapshot: &Snapshot, id: &str) -> SectionEntry {
    if let Some(fit) = FitId::new(id).ok().and_then(|f| snapshot.fits.get(&f)) {
        return SectionEntry {
            id: fit.id.to_string(),
            statement: Some(fit.statement.clone()),
            tier: Some(fit.tier),
            scope: Some(fit.scope),
            provenance: vec![fit.id.to_string()],
        };
    }
    match tsv::normalize_id(id).ok().and_then(|cid| snapshot.ledger.get(&cid)) {
        Some(record) => constraint_entry(record),
        None => SectionEntry::reference(id.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Candidate, ReviewState, Scope};
    use stratum_governor::TierGovernor;

    fn seeded() -> Store {
        let store = Store::in_memory();
        let governor = TierGovernor::default_config();
        let mut txn = store.begin();
        for (id, tier, scope) in [
            ("C1", Tier::Frozen, Scope::B),
            ("C2", Tier::Falsified, Scope::B),
            ("C3", Tier::Established, Scope::Global),
            ("C4", Tier::Speculative, Scope::B),
            ("C5", Tier::Established, Scope::A),
        ] {
            let cid = ConstraintId::parse(id).unwrap();
            txn.append(
                Candidate::new(cid, format!("statement {}", id), tier, scope),
                &governor,
                ReviewState::Clear,
            )
            .unwrap();
        }
        store.commit(txn).unwrap();
        store
    }

    #[test]
    fn test_default_routing() {
        let store = seeded();
        let compiler = ContractCompiler::new();
        let contract = compiler
            .build(&store.snapshot(), "BCSC", "1", "scope = B", &[])
            .unwrap();

        let ids = |kind| {
            contract
                .section(kind)
                .iter()
                .map(|e| e.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(SectionKind::Guarantees), vec!["C1"]);
        assert_eq!(ids(SectionKind::Disallowed), vec!["C2"]);
        assert_eq!(ids(SectionKind::Invariants), vec!["C3"]);
        assert_eq!(contract.provenance, vec!["C1", "C2", "C3"]);
        assert_eq!(contract.meta.status, ContractStatus::Draft);
        assert_eq!(contract.meta.governance, DEFAULT_GOVERNANCE_NOTE);
        assert_eq!(
            contract.guarantees[0].statement.as_deref(),
            Some("statement C1")
        );
    }

    #[test]
    fn test_explicit_sections() {
        let store = seeded();
        let compiler = ContractCompiler::new();
        let sections = vec![
            SectionSpec::new(SectionKind::Guarantees).with_selector("tier <= 1"),
            SectionSpec::new(SectionKind::Invariants).cite("5"),
        ];
        let contract = compiler
            .build(&store.snapshot(), "BCSC", "2", "*", &sections)
            .unwrap();

        assert_eq!(contract.guarantees.len(), 2);
        assert_eq!(contract.invariants.len(), 1);
        assert_eq!(contract.invariants[0].id, "C5");
        assert!(contract.disallowed.is_empty());
    }

    #[test]
    fn test_lock_rejects_non_binding_and_unresolved() {
        let store = seeded();
        let compiler = ContractCompiler::new();

        let sections = vec![SectionSpec::new(SectionKind::Invariants).cite("C4")];
        let contract = compiler
            .build(&store.snapshot(), "BCSC", "3", "tier = 0", &sections)
            .unwrap();
        assert!(matches!(
            compiler.lock(&store, contract),
            Err(ContractError::NonBindingReference { .. })
        ));

        let sections = vec![SectionSpec::new(SectionKind::Invariants).cite("C404")];
        let contract = compiler
            .build(&store.snapshot(), "BCSC", "4", "tier = 0", &sections)
            .unwrap();
        assert!(matches!(
            compiler.lock(&store, contract),
            Err(ContractError::UnresolvedProvenance { .. })
        ));
        assert!(store.snapshot().contracts.is_empty());
    }

    #[test]
    fn test_lock_is_idempotent() {
        let store = seeded();
        let compiler = ContractCompiler::new();
        let draft = compiler
            .build(&store.snapshot(), "BCSC", "1", "tier <= 2", &[])
            .unwrap();

        let first = compiler.lock(&store, draft.clone()).unwrap();
        let sequence = store.sequence();
        let second = compiler.lock(&store, draft).unwrap();
        let third = compiler.lock(&store, first.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert!(first.is_locked());
        assert_eq!(store.sequence(), sequence);
        assert_eq!(
            store
                .snapshot()
                .referencing_contracts(&ConstraintId::parse("C1").unwrap())
                .len(),
            1
        );
    }

    #[test]
    fn test_locked_key_is_immutable() {
        let store = seeded();
        let compiler = ContractCompiler::new();
        let draft = compiler
            .build(&store.snapshot(), "BCSC", "1", "tier = 0", &[])
            .unwrap();
        compiler.lock(&store, draft).unwrap();

        // Same content rebuilds to the locked artifact
        let rebuilt = compiler
            .build(&store.snapshot(), "BCSC", "1", "tier = 0", &[])
            .unwrap();
        assert!(rebuilt.is_locked());

        assert!(matches!(
            compiler.build(&store.snapshot(), "BCSC", "1", "tier <= 2", &[]),
            Err(ContractError::ImmutableContractViolation(_))
        ));
    }

    #[test]
    fn test_draft_is_rebuilt_for_a_newer_snapshot() {
        let store = seeded();
        let compiler = ContractCompiler::new();
        let first = compiler
            .build(&store.snapshot(), "BCSC", "1", "scope = B", &[])
            .unwrap();

        let governor = TierGovernor::default_config();
        let mut txn = store.begin();
        txn.append(
            Candidate::new(
                ConstraintId::parse("C6").unwrap(),
                "statement C6",
                Tier::Established,
                Scope::B,
            ),
            &governor,
            ReviewState::Clear,
        )
        .unwrap();
        store.commit(txn).unwrap();

        // The commit never went through observe
        assert_eq!(compiler.cached_drafts(), 1);
        let snapshot = store.snapshot();
        let second = compiler
            .build(&snapshot, "BCSC", "1", "scope = B", &[])
            .unwrap();

        assert_eq!(first.provenance, vec!["C1", "C2", "C3"]);
        assert_eq!(second.provenance, vec!["C1", "C2", "C3", "C6"]);
        assert_eq!(second.meta.compiled_at_sequence, snapshot.sequence);

        // Same snapshot, same inputs: served from the cache
        let third = compiler
            .build(&snapshot, "BCSC", "1", "scope = B", &[])
            .unwrap();
        assert_eq!(third, second);
    }

    #[test]
    fn test_lock_attempts_are_bounded() {
        let store = seeded();
        let compiler = ContractCompiler::new().with_max_commit_attempts(0);
        let draft = compiler
            .build(&store.snapshot(), "BCSC", "1", "tier = 0", &[])
            .unwrap();
        let sequence = store.sequence();

        assert!(matches!(
            compiler.lock(&store, draft.clone()),
            Err(ContractError::RetriesExhausted { attempts: 0, .. })
        ));
        assert_eq!(store.sequence(), sequence);
        assert!(store.snapshot().contracts.is_empty());

        let compiler = compiler.with_max_commit_attempts(1);
        assert!(compiler.lock(&store, draft).unwrap().is_locked());
    }

    #[test]
    fn test_observe_invalidates_touched_drafts() {
        let store = seeded();
        let compiler = ContractCompiler::new();
        let snapshot = store.snapshot();
        compiler.build(&snapshot, "A", "1", "tier = 0", &[]).unwrap();
        compiler.build(&snapshot, "B", "1", "family = C5", &[]).unwrap();
        assert_eq!(compiler.cached_drafts(), 2);

        let governor = TierGovernor::default_config();
        let mut txn = store.begin();
        txn.append(
            Candidate::new(
                ConstraintId::parse("C5").unwrap(),
                "revised",
                Tier::Established,
                Scope::A,
            ),
            &governor,
            ReviewState::Clear,
        )
        .unwrap();
        let events = txn.events().to_vec();
        store.commit(txn).unwrap();

        assert_eq!(compiler.observe_all(&events), 1);
        assert_eq!(compiler.cached_drafts(), 1);

        let rebuilt = compiler
            .build(&store.snapshot(), "B", "1", "family = C5", &[])
            .unwrap();
        assert_eq!(rebuilt.invariants[0].id, "C5.a");
    }
}
