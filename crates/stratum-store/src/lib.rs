//! Stratum Storage Layer
//!
//! Versioned, copy-on-write storage for constraints, fits and provenance.
//!
//! # Architecture
//!
//! - `Ledger`: append-only constraint versions with a family index
//! - `ProvenanceGraph`: SUPERSEDES / SUPPORTS / REFERENCES edges
//! - `FitRegistry`: non-binding fits, referentially validated
//! - `Store`: current `Arc<Snapshot>`, history, transactions and commit events
//! - `CommitLog`: SQLite commit log plus compacted checkpoints
//! - `tsv`: constraint and fit table import/export
//!
//! # Examples
//!
//! ```no_run
//! use stratum_store::Store;
//!
//! let store = Store::in_memory();
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.sequence, 0);
//! ```

#![warn(missing_docs)]

mod error;
mod fits;
mod graph;
mod ledger;
mod log;
mod snapshot;
mod store;
pub mod tsv;

pub use error::{FitError, FrozenCause, GraphError, LedgerError, StoreError};
pub use fits::FitRegistry;
pub use graph::{EdgeList, ProvenanceGraph};
pub use ledger::{AppendPlan, Ledger, LedgerEvent};
pub use log::{CommitLog, CommitRecord, LogOp};
pub use snapshot::{CommitNotice, Snapshot, StoreEvent};
pub use store::{unix_now, ImportReport, Store, StoreConfig, Txn};
