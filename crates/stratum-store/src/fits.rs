//! Fit registry
//!
//! Fits are explanatory context. Registering one only adds SUPPORTS edges; it
//! never touches a constraint.

use crate::{FitError, Ledger, ProvenanceGraph, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_domain::{ConstraintId, EdgeKind, Fit, FitId, FitSubmission, NodeRef, Status};

/// Registered fits keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitRegistry {
    fits: BTreeMap<FitId, Fit>,
}

impl FitRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered fits
    pub fn len(&self) -> usize {
        self.fits.len()
    }

    /// Whether no fit is registered
    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    /// Get a fit by id
    pub fn get(&self, id: &FitId) -> Option<&Fit> {
        self.fits.get(id)
    }

    /// Every fit in id order
    pub fn iter(&self) -> impl Iterator<Item = &Fit> + '_ {
        self.fits.values()
    }

    /// Register a fit and its SUPPORTS edges
    ///
    /// Every supported id must name a stored, non-discarded version. Nothing
    /// is inserted unless all of them resolve.
    pub fn register(
        &mut self,
        submission: FitSubmission,
        ledger: &Ledger,
        graph: &mut ProvenanceGraph,
    ) -> Result<FitId, StoreError> {
        let FitSubmission { fit, supports } = submission;

        if self.fits.contains_key(&fit.id) {
            return Err(FitError::DuplicateFit(fit.id).into());
        }

        for supported in &supports {
            let resolves = ledger
                .get(supported)
                .is_some_and(|c| c.status != Status::Discarded);
            if !resolves {
                return Err(FitError::DanglingReference {
                    fit: fit.id.clone(),
                    missing: supported.clone(),
                }
                .into());
            }
        }

        let id = fit.id.clone();
        for supported in supports {
            graph.add_edge(id.clone(), supported, EdgeKind::Supports)?;
        }
        self.fits.insert(id.clone(), fit);

        Ok(id)
    }

    /// Insert a fit without validation (log replay)
    pub fn insert_resolved(&mut self, fit: Fit) {
        self.fits.insert(fit.id.clone(), fit);
    }

    /// Fits with a SUPPORTS edge into a constraint version
    pub fn supporters_of<'a>(
        &'a self,
        id: &ConstraintId,
        graph: &'a ProvenanceGraph,
    ) -> Vec<&'a Fit> {
        graph
            .edges_to(&NodeRef::Constraint(id.clone()))
            .filter(|e| e.kind == EdgeKind::Supports)
            .filter_map(|e| e.source.as_fit())
            .filter_map(|fit| self.fits.get(fit))
            .collect()
    }

    /// Constraint ids a fit supports
    pub fn supported_by<'a>(&self, id: &FitId, graph: &'a ProvenanceGraph) -> Vec<&'a ConstraintId> {
        graph
            .edges_from(&NodeRef::Fit(id.clone()))
            .filter(|e| e.kind == EdgeKind::Supports)
            .filter_map(|e| e.target.as_constraint())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Candidate, FitResult, ReviewState, Scope, Tier};
    use stratum_governor::TierGovernor;

    fn id(s: &str) -> ConstraintId {
        ConstraintId::parse(s).unwrap()
    }

    fn fit(s: &str) -> Fit {
        Fit {
            id: FitId::new(s).unwrap(),
            statement: "positional model".to_string(),
            tier: Tier::Speculative,
            scope: Scope::Azc,
            result: FitResult::Partial,
            file: Some("fits/azc.md".to_string()),
        }
    }

    fn ledger_with(ids: &[&str]) -> Ledger {
        let governor = TierGovernor::default_config();
        let mut ledger = Ledger::new();
        for s in ids {
            ledger
                .append(
                    Candidate::new(id(s), "statement", Tier::Established, Scope::Azc),
                    &governor,
                    ReviewState::Clear,
                    0,
                )
                .unwrap();
        }
        ledger
    }

    #[test]
    fn test_register_and_lookup() {
        let ledger = ledger_with(&["C10", "C11"]);
        let mut graph = ProvenanceGraph::new();
        let mut registry = FitRegistry::new();

        let submission = FitSubmission::new(fit("F-AZC-016"), vec![id("C10"), id("C11")]);
        let fit_id = registry.register(submission, &ledger, &mut graph).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(graph.len(), 2);
        assert_eq!(registry.supporters_of(&id("C10"), &graph)[0].id, fit_id);
        assert_eq!(registry.supported_by(&fit_id, &graph).len(), 2);
        assert!(registry.supporters_of(&id("C12"), &graph).is_empty());
    }

    #[test]
    fn test_dangling_reference_leaves_nothing_behind() {
        let ledger = ledger_with(&["C10"]);
        let mut graph = ProvenanceGraph::new();
        let mut registry = FitRegistry::new();

        let submission = FitSubmission::new(fit("F-AZC-017"), vec![id("C10"), id("C404")]);
        let err = registry.register(submission, &ledger, &mut graph).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Fit(FitError::DanglingReference { ref missing, .. }) if missing == &id("C404")
        ));
        assert!(registry.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_duplicate_fit() {
        let ledger = ledger_with(&["C10"]);
        let mut graph = ProvenanceGraph::new();
        let mut registry = FitRegistry::new();

        registry
            .register(FitSubmission::new(fit("F-1"), vec![]), &ledger, &mut graph)
            .unwrap();
        let err = registry
            .register(FitSubmission::new(fit("F-1"), vec![]), &ledger, &mut graph)
            .unwrap_err();
        assert!(matches!(err, StoreError::Fit(FitError::DuplicateFit(_))));
    }

    #[test]
    fn test_registration_never_changes_tiers() {
        let ledger = ledger_with(&["C10"]);
        let before = ledger.clone();
        let mut graph = ProvenanceGraph::new();
        let mut registry = FitRegistry::new();

        let mut falsifying = fit("F-2");
        falsifying.result = FitResult::Falsified;
        registry
            .register(FitSubmission::new(falsifying, vec![id("C10")]), &ledger, &mut graph)
            .unwrap();
        assert_eq!(ledger, before);
    }
}
