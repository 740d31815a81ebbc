//! Stratum Query Engine
//!
//! Scoped, citation-grounded lookups over one immutable snapshot.
//!
//! ## Capability boundary
//!
//! A [`QueryEngine`] owns an `Arc<Snapshot>` and no other handle: no store,
//! no file system, no network. Every answer is assembled from records in
//! that snapshot and cites their ids. When the snapshot cannot answer, the
//! engine returns [`Answer::InsufficientContext`] naming the missing terms.
//!
//! ## Example
//!
//! ```
//! use stratum_query::{Answer, QueryEngine};
//! use stratum_store::Store;
//!
//! let store = Store::in_memory();
//! let engine = QueryEngine::with_defaults(store.snapshot());
//! assert!(matches!(engine.answer("LINK density"), Answer::InsufficientContext { .. }));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod engine;

pub use config::QueryConfig;
pub use engine::{content_terms, Answer, Citation, QueryEngine};
