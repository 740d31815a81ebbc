//! Error types for the contract compiler

use stratum_store::StoreError;
use thiserror::Error;

/// Errors that can occur while building or locking contracts
#[derive(Error, Debug)]
pub enum ContractError {
    /// A referenced id resolves to nothing (or to a discarded record)
    #[error("Contract {contract} cites unresolved id {id}")]
    UnresolvedProvenance {
        /// Contract key
        contract: String,
        /// Offending id
        id: String,
    },

    /// A referenced id resolves to a fit or a tier-3/4 constraint
    #[error("Contract {contract} cites non-binding {id}: {reason}")]
    NonBindingReference {
        /// Contract key
        contract: String,
        /// Offending id
        id: String,
        /// What the id resolved to
        reason: String,
    },

    /// Different content under a locked name and version
    #[error("Contract {0} is locked; use a new version")]
    ImmutableContractViolation(String),

    /// Every lock attempt raced a concurrent commit
    #[error("Contract {contract} not locked after {attempts} attempt(s)")]
    RetriesExhausted {
        /// Contract key
        contract: String,
        /// Attempts made
        attempts: usize,
    },

    /// Selector text could not be parsed
    #[error("Invalid selector '{selector}': {message}")]
    Selector {
        /// Selector text
        selector: String,
        /// What went wrong
        message: String,
    },

    /// Store error while recording a lock
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Contract document error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error reading or writing a contract document
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
