//! Integration tests for stratum-contracts

use stratum_contracts::{document, ContractCompiler, ContractError, SectionSpec};
use stratum_domain::{
    Candidate, ConstraintId, Fit, FitId, FitResult, FitSubmission, PhaseBatch, Scope, SectionKind,
    Tier,
};
use stratum_governor::{CancellationToken, ContradictionChecker, TierGovernor};
use stratum_store::Store;

fn id(s: &str) -> ConstraintId {
    ConstraintId::parse(s).unwrap()
}

fn seeded_store() -> Store {
    let store = Store::in_memory();
    let fit = Fit {
        id: FitId::new("F-B-007").unwrap(),
        statement: "LINK density follows a positional gradient".to_string(),
        tier: Tier::Speculative,
        scope: Scope::B,
        result: FitResult::Partial,
        file: Some("fits/F-B-007.md".to_string()),
    };
    let batch = PhaseBatch::new("PHASE_77_LINK_DENSITY")
        .with_constraint(Candidate::new(id("C121"), "Token inventory is closed", Tier::Frozen, Scope::B))
        .with_constraint(Candidate::new(id("C130"), "Ring closure holds", Tier::Falsified, Scope::B))
        .with_constraint(Candidate::new(id("C609"), "LINK density is uniform", Tier::Established, Scope::B))
        .with_constraint(Candidate::new(id("C700"), "Prefix marks role", Tier::Speculative, Scope::B))
        .with_fit(FitSubmission::new(fit, vec![id("C609")]));

    let mut txn = store.begin();
    txn.import(
        batch,
        &TierGovernor::default_config(),
        &ContradictionChecker::default_config(),
        &CancellationToken::new(),
    )
    .unwrap();
    store.commit(txn).unwrap();
    store
}

#[test]
fn test_citing_a_fit_blocks_lock() {
    let store = seeded_store();
    let compiler = ContractCompiler::new();

    let sections = vec![
        SectionSpec::new(SectionKind::Guarantees).with_selector("tier = 0"),
        SectionSpec::new(SectionKind::Disallowed).with_selector("tier = 1"),
        SectionSpec::new(SectionKind::Invariants)
            .with_selector("tier = 2")
            .cite("F-B-007"),
    ];
    let draft = compiler
        .build(&store.snapshot(), "BCSC", "1", "scope=B AND tier<=2", &sections)
        .unwrap();
    assert!(draft.provenance.contains(&"F-B-007".to_string()));
    assert!(!draft.provenance.contains(&"C700".to_string()));

    let err = compiler.lock(&store, draft).unwrap_err();
    match err {
        ContractError::NonBindingReference { contract, id, .. } => {
            assert_eq!(contract, "BCSC v1");
            assert_eq!(id, "F-B-007");
        }
        other => panic!("Expected NonBindingReference, got {:?}", other),
    }
    assert!(store.snapshot().contracts.is_empty());
}

#[test]
fn test_locked_contract_survives_yaml_and_new_version() {
    let store = seeded_store();
    let compiler = ContractCompiler::new();

    let draft = compiler
        .build(&store.snapshot(), "BCSC", "1", "scope=B AND tier<=2", &[])
        .unwrap();
    assert_eq!(draft.entry_count(), 3);
    let locked = compiler.lock(&store, draft).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = document::write_contract(dir.path(), &locked).unwrap();
    assert_eq!(document::read_contract(&path).unwrap(), locked);

    // Revise C609, then the old key refuses the new content
    let mut txn = store.begin();
    txn.append(
        Candidate::new(id("C609"), "LINK density is uniform per line", Tier::Established, Scope::B),
        &TierGovernor::default_config(),
        stratum_domain::ReviewState::Clear,
    )
    .unwrap();
    store.commit(txn).unwrap();

    assert!(matches!(
        compiler.build(&store.snapshot(), "BCSC", "1", "scope=B AND tier<=2", &[]),
        Err(ContractError::ImmutableContractViolation(_))
    ));

    let v2 = compiler
        .build(&store.snapshot(), "BCSC", "2", "scope=B AND tier<=2", &[])
        .unwrap();
    assert!(v2.provenance.contains(&"C609.a".to_string()));
    compiler.lock(&store, v2).unwrap();

    // The superseded version stays citable by the first lock
    assert_eq!(store.snapshot().referencing_contracts(&id("C609")).len(), 1);
    assert_eq!(store.snapshot().referencing_contracts(&id("C609.a")).len(), 1);
}
