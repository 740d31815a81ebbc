//! Storage error types

use stratum_domain::{ConstraintId, FitId, NodeRef, Tier};
use stratum_governor::{CheckError, GovernorError};
use thiserror::Error;

/// Why a version refused a new successor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrozenCause {
    /// The family head is at a terminal tier
    Terminal(Tier),
    /// The named version was already superseded
    Superseded,
    /// The named version was discarded
    Discarded,
}

impl std::fmt::Display for FrozenCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrozenCause::Terminal(tier) => write!(f, "tier {} is immutable", tier),
            FrozenCause::Superseded => write!(f, "version is SUPERSEDED, not ACTIVE"),
            FrozenCause::Discarded => write!(f, "version is DISCARDED"),
        }
    }
}

/// Errors raised by the ledger
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Attempt to change a frozen family or a stale version
    #[error("Frozen violation on {id}: {cause}")]
    FrozenViolation {
        /// The version that refused the change
        id: ConstraintId,
        /// Why
        cause: FrozenCause,
    },

    /// A candidate declares a predecessor in another family
    #[error("{id} cannot supersede {supersedes}: different families")]
    FamilyMismatch {
        /// Candidate id
        id: ConstraintId,
        /// Declared predecessor
        supersedes: ConstraintId,
    },

    /// The id is already taken
    #[error("Duplicate constraint id: {0}")]
    DuplicateId(ConstraintId),

    /// No such version
    #[error("Constraint not found: {0}")]
    NotFound(ConstraintId),

    /// Governance rejected the transition
    #[error(transparent)]
    Governor(#[from] GovernorError),
}

/// Errors raised by the provenance graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A SUPERSEDES edge would break the forest shape
    #[error("Supersession cycle error: {source_node} -> {target}: {reason}")]
    SupersessionCycle {
        /// Successor
        source_node: NodeRef,
        /// Predecessor
        target: NodeRef,
        /// Which forest rule was violated
        reason: String,
    },
}

/// Errors raised by the fit registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// A supported id does not resolve to a stored, non-discarded version
    #[error("Fit {fit} references unknown constraint {missing}")]
    DanglingReference {
        /// The fit being registered
        fit: FitId,
        /// The unresolved id
        missing: ConstraintId,
    },

    /// The fit id is already registered
    #[error("Duplicate fit id: {0}")]
    DuplicateFit(FitId),
}

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Ledger rule violated
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Graph rule violated
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Fit registration failed
    #[error(transparent)]
    Fit(#[from] FitError),

    /// Governance rejected the operation
    #[error(transparent)]
    Governor(#[from] GovernorError),

    /// A candidate conflicts with a binding record
    #[error("Conflict: {candidate} conflicts with {with}: {reason}")]
    Conflict {
        /// Rejected candidate
        candidate: ConstraintId,
        /// Binding record it conflicts with
        with: ConstraintId,
        /// Checker explanation
        reason: String,
    },

    /// Contradiction scan failed
    #[error(transparent)]
    Check(#[from] CheckError),

    /// Another commit landed after the transaction started
    #[error("Stale transaction: based on sequence {base}, store is at {current}")]
    Stale {
        /// Sequence the transaction was started from
        base: u64,
        /// Current sequence
        current: u64,
    },

    /// A different contract is already locked under the key
    #[error("Contract {0} is already locked with different content")]
    ContractLocked(String),

    /// Restore requires an empty store
    #[error("Restore requires an empty store")]
    NotEmpty,

    /// No snapshot matches the request
    #[error("No snapshot at {0}")]
    NoSnapshot(String),

    /// Malformed table input
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
