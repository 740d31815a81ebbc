//! Stratum Domain Layer
//!
//! This crate contains the core value types of the Stratum constraint store.
//! It carries no storage or policy logic; the governor, store, compiler and
//! query crates all depend on it.
//!
//! ## Key Concepts
//!
//! - **Constraint**: an atomic, id-tagged claim with an epistemic tier and scope
//! - **Tier**: epistemic status (0 Frozen … 4 Exploratory) governing mutability
//! - **Scope**: the subsystem a constraint applies to
//! - **Family**: every version sharing a base id (`C498`, `C498.a`, `C498.b`)
//! - **Fit**: a non-binding explanatory model that supports constraints
//! - **Contract**: a named, versioned view compiled from binding constraints
//! - **Edge**: a provenance link (supersedes, supports, references)
//!
//! ## Dependencies
//!
//! Only `serde` (every type is persisted in snapshots and the commit log) and
//! `uuid` (time-ordered phase identifiers).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod constraint;
pub mod contract;
pub mod edge;
pub mod fit;
pub mod provenance;
pub mod scope;
pub mod tier;
pub mod traits;

// Re-exports for convenience
pub use batch::{PhaseBatch, PhaseId};
pub use constraint::{
    Candidate, Constraint, ConstraintId, FamilyId, IdError, ReviewNote, ReviewState, Status,
};
pub use contract::{
    Contract, ContractKey, ContractMeta, ContractStatus, SectionEntry, SectionKind,
};
pub use edge::{Edge, EdgeKind, NodeRef};
pub use fit::{Fit, FitId, FitResult, FitSubmission};
pub use provenance::{LocationKind, Provenance};
pub use scope::Scope;
pub use tier::{Policy, Polarity, Tier};
pub use traits::{ConstraintQuery, ConstraintSource};
