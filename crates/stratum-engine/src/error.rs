//! Error types for the engine

use stratum_contracts::ContractError;
use stratum_store::StoreError;
use thiserror::Error;

/// Errors that can occur while running the import pipeline or its workers
#[derive(Error, Debug)]
pub enum EngineError {
    /// Store, ledger or governance error (aborts the batch)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Contract compiler error
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Phase manifest could not be read
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Optimistic commit kept losing to concurrent writers
    #[error("Phase '{phase}' could not commit after {attempts} attempts")]
    RetriesExhausted {
        /// Phase label
        phase: String,
        /// Attempts made
        attempts: usize,
    },

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Worker(e.to_string())
    }
}
