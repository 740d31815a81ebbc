//! Governor error types

use stratum_domain::Tier;
use thiserror::Error;

/// Errors that can occur during governance checks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernorError {
    /// Tier state-machine violation
    #[error("Illegal tier transition {from} -> {to}: {reason}")]
    IllegalTierTransition {
        /// Tier of the current head
        from: Tier,
        /// Requested tier
        to: Tier,
        /// Why the transition was refused
        reason: String,
    },

    /// Discard attempted on a tier that does not allow it
    #[error("Records at tier {0} cannot be discarded")]
    IllegalDiscard(Tier),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that can occur during a contradiction scan
///
/// A detected conflict is a [`crate::Verdict`], not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// The scan observed a cancelled token
    #[error("Contradiction scan cancelled")]
    Cancelled,
}
