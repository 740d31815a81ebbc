//! Immutable snapshots of ledger, graph, fits and locked contracts

use crate::{FitRegistry, Ledger, LedgerEvent, ProvenanceGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratum_domain::{
    Constraint, ConstraintId, ConstraintSource, Contract, ContractKey, EdgeKind, FamilyId, Fit,
    FitId, NodeRef,
};

/// One consistent view of the store
///
/// Snapshots are never mutated once published; readers hold them through an
/// `Arc`. Serialization is deterministic (ordered maps, insertion-ordered edges).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Constraint versions
    pub ledger: Ledger,

    /// Provenance edges
    pub graph: ProvenanceGraph,

    /// Registered fits
    pub fits: FitRegistry,

    /// Locked contracts keyed by their display key (`BCSC v3.11`)
    #[serde(default)]
    pub contracts: BTreeMap<String, Contract>,

    /// Number of commits that produced this snapshot
    pub sequence: u64,

    /// Commit time (seconds since Unix epoch)
    pub committed_at: u64,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty() && self.fits.is_empty() && self.contracts.is_empty()
    }

    /// Every version of a family, oldest first
    pub fn chain(&self, family: &FamilyId) -> Vec<&Constraint> {
        self.ledger.family(family)
    }

    /// Predecessor of a version
    pub fn supersedes(&self, id: &ConstraintId) -> Option<&ConstraintId> {
        self.graph.supersedes(id)
    }

    /// Successor of a version
    pub fn superseded_by(&self, id: &ConstraintId) -> Option<&ConstraintId> {
        self.graph.superseded_by(id)
    }

    /// Fits supporting a version
    pub fn supporters_of(&self, id: &ConstraintId) -> Vec<&Fit> {
        self.fits.supporters_of(id, &self.graph)
    }

    /// Locked contract by key
    pub fn contract(&self, key: &ContractKey) -> Option<&Contract> {
        self.contracts.get(&key.to_string())
    }

    /// Locked contracts referencing a version
    pub fn referencing_contracts(&self, id: &ConstraintId) -> Vec<&ContractKey> {
        self.graph
            .edges_to(&NodeRef::Constraint(id.clone()))
            .filter(|e| e.kind == EdgeKind::References)
            .filter_map(|e| match &e.source {
                NodeRef::Contract(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl ConstraintSource for Snapshot {
    fn constraint(&self, id: &ConstraintId) -> Option<&Constraint> {
        self.ledger.get(id)
    }

    fn active_in_family(&self, family: &FamilyId) -> Option<&Constraint> {
        self.ledger.active(family)
    }

    fn constraints(&self) -> Box<dyn Iterator<Item = &Constraint> + '_> {
        Box::new(self.ledger.iter())
    }

    fn fit(&self, id: &FitId) -> Option<&Fit> {
        self.fits.get(id)
    }

    fn fits(&self) -> Box<dyn Iterator<Item = &Fit> + '_> {
        Box::new(self.fits.iter())
    }
}

/// Something a commit changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Ledger mutation
    Constraint {
        /// The ledger event
        event: LedgerEvent,
    },

    /// Fit registered
    Fit {
        /// Fit id
        id: FitId,
        /// Supported versions
        supports: Vec<ConstraintId>,
    },

    /// Contract locked
    Contract {
        /// Contract key
        key: ContractKey,
    },
}

impl StoreEvent {
    /// Families touched by the event
    pub fn families(&self) -> Vec<FamilyId> {
        match self {
            StoreEvent::Constraint { event } => vec![event.family().clone()],
            StoreEvent::Fit { supports, .. } => supports.iter().map(ConstraintId::family).collect(),
            StoreEvent::Contract { .. } => Vec::new(),
        }
    }
}

/// Broadcast after every successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitNotice {
    /// Sequence of the new snapshot
    pub sequence: u64,

    /// Phase label, if the commit was a phase import
    pub phase: Option<String>,

    /// What changed, in order
    pub events: Vec<StoreEvent>,
}
