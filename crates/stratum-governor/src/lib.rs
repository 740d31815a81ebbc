//! Stratum Governor
//!
//! Executable governance rules applied before a constraint is accepted.
//!
//! The governor provides:
//! - The 5-level tier state machine (`TierGovernor`)
//! - Contradiction checks against the binding set (`ContradictionChecker`)
//! - Cooperative cancellation for long scans
//!
//! # Examples
//!
//! ```no_run
//! use stratum_governor::{CancellationToken, ContradictionChecker, GovernanceConfig, TierGovernor};
//! use stratum_domain::Tier;
//!
//! let governor = TierGovernor::new(GovernanceConfig::default());
//! assert!(governor.validate_transition(Tier::Established, Tier::Frozen));
//!
//! let checker = ContradictionChecker::new(GovernanceConfig::default());
//! // let verdict = checker.check(&candidate, &snapshot, &CancellationToken::new());
//! ```

#![warn(missing_docs)]

mod cancel;
mod checker;
mod config;
mod error;
mod governor;

pub use cancel::CancellationToken;
pub use checker::{candidate_family, CheckSession, ContradictionChecker, Verdict};
pub use config::GovernanceConfig;
pub use error::{CheckError, GovernorError};
pub use governor::{TierGovernor, TransitionKind};
