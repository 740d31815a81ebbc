//! Stratum Contract Compiler
//!
//! Contracts are named, versioned views compiled from the binding
//! constraints (tiers 0-2) of a snapshot. The compiler only aggregates and
//! labels: every entry copies an existing record verbatim and carries its id
//! as provenance.
//!
//! ## Lifecycle
//!
//! 1. [`ContractCompiler::build`] evaluates a [`Selector`] and produces a DRAFT
//! 2. [`ContractCompiler::lock`] verifies every reference and records the
//!    contract in the store as LOCKED
//! 3. A locked name and version never changes; new ledger state needs a new
//!    version
//!
//! ## Example
//!
//! ```no_run
//! use stratum_contracts::ContractCompiler;
//! use stratum_store::Store;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::in_memory();
//! let compiler = ContractCompiler::new();
//! let draft = compiler.build(&store.snapshot(), "BCSC", "1", "scope=B AND tier<=2", &[])?;
//! let locked = compiler.lock(&store, draft)?;
//! println!("{}", stratum_contracts::document::to_yaml(&locked)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod compiler;
pub mod document;
mod error;
mod selector;

pub use compiler::{
    default_section, verify, ContractCompiler, SectionSpec, DEFAULT_GOVERNANCE_NOTE,
    DEFAULT_MAX_COMMIT_ATTEMPTS,
};
pub use error::ContractError;
pub use selector::Selector;
