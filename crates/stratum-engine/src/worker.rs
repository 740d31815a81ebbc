//! Background worker for periodic checkpoints

use crate::{CheckpointConfig, Engine, EngineError};
use tokio::time::{interval, Duration};

/// Background worker that folds the commit log into a checkpoint on a schedule
///
/// Each cycle writes a checkpoint when at least `min_pending_entries` log rows
/// have accumulated since the last one. In-memory stores are never checkpointed.
///
/// # Examples
///
/// ```no_run
/// use stratum_engine::{CheckpointWorker, Engine, StratumConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StratumConfig::load("stratum.toml".as_ref())?;
///     let engine = Engine::open(config.clone())?;
///     let worker = CheckpointWorker::new(engine, config.checkpoint);
///
///     // Run indefinitely (until Ctrl+C)
///     worker.run().await?;
///     Ok(())
/// }
/// ```
pub struct CheckpointWorker {
    engine: Engine,
    config: CheckpointConfig,
}

impl CheckpointWorker {
    /// Create a new worker for an engine
    pub fn new(engine: Engine, config: CheckpointConfig) -> Self {
        Self { engine, config }
    }

    /// Wake-up interval
    pub fn interval(&self) -> Duration {
        self.config.interval()
    }

    /// Run a single cycle; returns the checkpointed sequence if one was written
    pub fn cycle(&self) -> Result<Option<u64>, EngineError> {
        let store = self.engine.store();
        if !store.is_durable() {
            self.engine.record_checkpoint_cycle(false);
            return Ok(None);
        }

        let pending = store.pending_log_entries()?;
        if pending < self.config.min_pending_entries.max(1) {
            tracing::debug!(pending, "Skipping checkpoint");
            self.engine.record_checkpoint_cycle(false);
            return Ok(None);
        }

        let written = self.engine.checkpoint()?;
        self.engine.record_checkpoint_cycle(written.is_some());
        if let Some(sequence) = written {
            tracing::info!(sequence, folded = pending, "Checkpoint written");
        }
        Ok(written)
    }

    /// Run the worker until a shutdown signal (Ctrl+C) is received
    ///
    /// Cycle failures are logged and the worker keeps going.
    pub async fn run(&self) -> Result<(), EngineError> {
        if !self.config.enabled {
            tracing::info!("Checkpoint worker disabled");
            return Ok(());
        }

        let mut ticker = interval(self.interval());
        tracing::info!("Checkpoint worker started (interval: {:?})", self.interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.cycle() {
                        tracing::error!("Checkpoint cycle failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, writing final checkpoint");
                    break;
                }
            }
        }

        if self.engine.store().is_durable() {
            self.engine.checkpoint()?;
        }
        tracing::info!(
            "Checkpoint worker stopped. Final metrics:\n{}",
            self.engine.metrics().summary()
        );
        Ok(())
    }

    /// Run for a specific number of cycles (useful for testing)
    ///
    /// The first cycle runs immediately. A failing cycle stops the worker.
    pub async fn run_cycles(&self, cycles: usize) -> Result<(), EngineError> {
        let mut ticker = interval(self.interval());

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting checkpoint cycle {}/{}", cycle + 1, cycles);

            if let Err(e) = self.cycle() {
                tracing::error!("Checkpoint cycle {}/{} failed: {}", cycle + 1, cycles, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StratumConfig;
    use stratum_domain::{Candidate, ConstraintId, PhaseBatch, Scope, Tier};
    use stratum_governor::CancellationToken;
    use stratum_store::StoreConfig;

    fn durable_engine(dir: &tempfile::TempDir) -> Engine {
        let config = StratumConfig {
            store: StoreConfig::durable(dir.path().join("stratum.db")),
            ..Default::default()
        };
        Engine::open(config).unwrap()
    }

    async fn import(engine: &Engine, ids: &[&str]) {
        let batch = ids.iter().fold(PhaseBatch::new("phase"), |batch, s| {
            batch.with_constraint(Candidate::new(
                ConstraintId::parse(s).unwrap(),
                "statement",
                Tier::Established,
                Scope::A,
            ))
        });
        engine
            .import_phase(batch, CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_store_is_skipped() {
        let engine = Engine::in_memory();
        import(&engine, &["C1"]).await;

        let worker = CheckpointWorker::new(engine.clone(), CheckpointConfig::aggressive());
        worker.run_cycles(2).await.unwrap();

        let metrics = engine.metrics();
        assert_eq!(metrics.checkpoint_cycles, 2);
        assert_eq!(metrics.checkpoints_written, 0);
    }

    #[tokio::test]
    async fn test_checkpoint_after_pending_entries() {
        let dir = tempfile::tempdir().unwrap();
        let engine = durable_engine(&dir);
        import(&engine, &["C1"]).await;
        import(&engine, &["C2"]).await;

        let worker = CheckpointWorker::new(engine.clone(), CheckpointConfig::aggressive());
        assert_eq!(worker.cycle().unwrap(), Some(2));
        assert_eq!(engine.store().pending_log_entries().unwrap(), 0);

        // Nothing pending, nothing written
        assert_eq!(worker.cycle().unwrap(), None);
        assert_eq!(engine.metrics().checkpoints_written, 1);
    }

    #[tokio::test]
    async fn test_threshold_defers_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let engine = durable_engine(&dir);
        import(&engine, &["C1"]).await;

        let worker = CheckpointWorker::new(engine.clone(), CheckpointConfig::lenient());
        assert_eq!(worker.cycle().unwrap(), None);
        assert_eq!(engine.store().pending_log_entries().unwrap(), 1);
    }
}
