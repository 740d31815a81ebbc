//! Stratum Engine
//!
//! The write path and background maintenance of a Stratum store.
//!
//! # Overview
//!
//! The engine is responsible for:
//! - **Phase imports**: running each batch through governance and committing it atomically
//! - **Write serialization**: imports sharing a family run one at a time, disjoint ones in parallel
//! - **Contract freshness**: invalidating compiled drafts when their sources change
//! - **Checkpoints**: folding the commit log into a snapshot on a schedule
//! - **Metrics collection**: counting imports, rejections and checkpoints
//!
//! # Usage
//!
//! ## Importing a phase
//!
//! ```no_run
//! use stratum_engine::{manifest, Engine, StratumConfig};
//! use stratum_governor::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::open(StratumConfig::load("stratum.toml".as_ref())?)?;
//!     let batch = manifest::read_manifest("phase_77.json".as_ref())?;
//!
//!     let report = engine.import_phase(batch, CancellationToken::new()).await?;
//!     println!("{} accepted, {} unverified", report.accepted.len(), report.unverified.len());
//!     println!("\n{}", engine.metrics().summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Background checkpoints
//!
//! ```no_run
//! use stratum_engine::{CheckpointWorker, Engine, StratumConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StratumConfig::load("stratum.toml".as_ref())?;
//!     let engine = Engine::open(config.clone())?;
//!
//!     // Run indefinitely (until Ctrl+C)
//!     CheckpointWorker::new(engine, config.checkpoint).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration Presets
//!
//! ```
//! use stratum_engine::CheckpointConfig;
//!
//! // Default: every 10 minutes once 16 commits are pending
//! let config = CheckpointConfig::default();
//!
//! // Aggressive: every minute, any pending commit
//! let config = CheckpointConfig::aggressive();
//!
//! // Lenient: hourly, 256 pending commits
//! let config = CheckpointConfig::lenient();
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod metrics;
mod pipeline;
mod worker;

pub mod manifest;

pub use config::{CheckpointConfig, EngineConfig, StratumConfig};
pub use error::EngineError;
pub use metrics::{rejection_kind, EngineMetrics};
pub use pipeline::Engine;
pub use worker::CheckpointWorker;
