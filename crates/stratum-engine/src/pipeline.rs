//! Phase-import pipeline with per-family write serialization

use crate::{EngineError, EngineMetrics, StratumConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use stratum_contracts::{ContractCompiler, SectionSpec};
use stratum_domain::{ConstraintId, Contract, FamilyId, PhaseBatch, Tier};
use stratum_governor::{CancellationToken, ContradictionChecker, TierGovernor};
use stratum_query::QueryEngine;
use stratum_store::{ImportReport, Snapshot, Store, StoreError, StoreEvent};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, info, warn};

/// The write path of a Stratum store
///
/// Imports touching disjoint families run in parallel on the blocking pool;
/// imports sharing a family are serialized by per-family async mutexes taken
/// in sorted order. Commits are optimistic and retried on a stale snapshot.
/// Cloning shares every component.
#[derive(Clone)]
pub struct Engine {
    store: Arc<Store>,
    governor: Arc<TierGovernor>,
    checker: Arc<ContradictionChecker>,
    compiler: Arc<ContractCompiler>,
    family_locks: Arc<Mutex<HashMap<FamilyId, Arc<AsyncMutex<()>>>>>,
    permits: Arc<Semaphore>,
    metrics: Arc<Mutex<EngineMetrics>>,
    config: Arc<StratumConfig>,
}

impl Engine {
    /// Create an engine over an existing store
    pub fn new(store: Store, config: StratumConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::assemble(store, config))
    }

    /// Open the configured store (recovering from its log) and wrap it
    pub fn open(config: StratumConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = Store::open(config.store.clone())?;
        Ok(Self::assemble(store, config))
    }

    /// In-memory engine with default configuration
    pub fn in_memory() -> Self {
        Self::assemble(Store::in_memory(), StratumConfig::default())
    }

    fn assemble(store: Store, config: StratumConfig) -> Self {
        Self {
            store: Arc::new(store),
            governor: Arc::new(TierGovernor::new(config.governance.clone())),
            checker: Arc::new(ContradictionChecker::new(config.governance.clone())),
            compiler: Arc::new(
                ContractCompiler::new().with_max_commit_attempts(config.engine.max_commit_attempts),
            ),
            family_locks: Arc::new(Mutex::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(config.engine.max_concurrent_imports)),
            metrics: Arc::new(Mutex::new(EngineMetrics::new())),
            config: Arc::new(config),
        }
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &StratumConfig {
        &self.config
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// Query engine over the latest committed snapshot
    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(self.store.snapshot(), self.config.query.clone())
    }

    /// The contract compiler (drafts are invalidated on every commit)
    pub fn compiler(&self) -> &ContractCompiler {
        &self.compiler
    }

    /// Copy of the current metrics
    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.lock().clone()
    }

    /// Record a checkpoint worker cycle
    pub(crate) fn record_checkpoint_cycle(&self, written: bool) {
        self.metrics.lock().record_checkpoint_cycle(written);
    }

    fn family_lock(&self, family: &FamilyId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.family_locks.lock();
        // Only the map holds an idle lock; held and awaited locks have clones out
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(family.clone()).or_default())
    }

    async fn lock_families(&self, families: &[FamilyId]) -> Vec<OwnedMutexGuard<()>> {
        // Sorted acquisition order rules out deadlock between overlapping imports
        let mut sorted = families.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for family in &sorted {
            guards.push(self.family_lock(family).lock_owned().await);
        }
        guards
    }

    /// Import a research phase atomically
    ///
    /// Every candidate passes the tier governor, the contradiction checker,
    /// the ledger and the provenance graph in order; then the fits are
    /// registered and the whole batch commits as one snapshot. The first
    /// error aborts the batch and leaves the store untouched.
    pub async fn import_phase(
        &self,
        batch: PhaseBatch,
        cancel: CancellationToken,
    ) -> Result<ImportReport, EngineError> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))?;
        let _guards = self.lock_families(&batch.families()).await;

        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.import_phase_blocking(batch, &cancel)).await?
    }

    /// Synchronous import, for callers outside a runtime
    ///
    /// Does not take the family locks; concurrent writers are still kept
    /// consistent by the optimistic commit.
    pub fn import_phase_blocking(
        &self,
        batch: PhaseBatch,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, EngineError> {
        let started = Instant::now();
        let phase = batch.phase.clone();
        let attempts = self.config.engine.max_commit_attempts;

        for attempt in 1..=attempts {
            let mut txn = self.store.begin();
            let report = match txn.import(batch.clone(), &self.governor, &self.checker, cancel) {
                Ok(report) => report,
                Err(e) => return Err(self.reject(&phase, e)),
            };
            let tiers: Vec<Tier> = report
                .accepted
                .iter()
                .filter_map(|id| txn.snapshot().ledger.get(id).map(|c| c.tier))
                .collect();
            let events = txn.events().to_vec();

            match self.store.commit(txn) {
                Ok(snapshot) => {
                    self.observe(&events);
                    let elapsed = started.elapsed().as_millis() as u64;
                    self.metrics.lock().record_import(&report, &tiers, elapsed);
                    info!(
                        phase = %phase,
                        accepted = report.accepted.len(),
                        unverified = report.unverified.len(),
                        fits = report.fits.len(),
                        sequence = snapshot.sequence,
                        "Imported phase"
                    );
                    return Ok(report);
                }
                Err(StoreError::Stale { base, current }) => {
                    debug!(phase = %phase, attempt, base, current, "Snapshot moved, retrying import");
                    self.metrics.lock().record_retry();
                }
                Err(e) => return Err(self.reject(&phase, e)),
            }
        }

        Err(EngineError::RetriesExhausted { phase, attempts })
    }

    fn reject(&self, phase: &str, error: StoreError) -> EngineError {
        warn!(phase, error = %error, "Rejected phase import");
        self.metrics.lock().record_rejection(&error);
        error.into()
    }

    fn observe(&self, events: &[StoreEvent]) {
        let invalidated = self.compiler.observe_all(events);
        if invalidated > 0 {
            debug!(invalidated, "Invalidated contract drafts");
        }
    }

    /// Discard an ACTIVE tier-3/4 version
    pub async fn discard(&self, id: ConstraintId) -> Result<(), EngineError> {
        let _guards = self.lock_families(&[id.family()]).await;
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.discard_blocking(&id)).await?
    }

    /// Synchronous discard
    pub fn discard_blocking(&self, id: &ConstraintId) -> Result<(), EngineError> {
        for _ in 0..self.config.engine.max_commit_attempts {
            let mut txn = self.store.begin();
            txn.set_phase(format!("discard {}", id));
            txn.discard(id, &self.governor)?;
            let events = txn.events().to_vec();

            match self.store.commit(txn) {
                Ok(_) => {
                    self.observe(&events);
                    info!(id = %id, "Discarded constraint");
                    return Ok(());
                }
                Err(StoreError::Stale { .. }) => self.metrics.lock().record_retry(),
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::RetriesExhausted {
            phase: format!("discard {}", id),
            attempts: self.config.engine.max_commit_attempts,
        })
    }

    /// Compile a DRAFT contract against the latest snapshot
    pub fn build_contract(
        &self,
        name: &str,
        version: &str,
        selector: &str,
        sections: &[SectionSpec],
    ) -> Result<Contract, EngineError> {
        Ok(self
            .compiler
            .build(&self.store.snapshot(), name, version, selector, sections)?)
    }

    /// Lock a contract and record it in the store
    pub fn lock_contract(&self, contract: Contract) -> Result<Contract, EngineError> {
        Ok(self.compiler.lock(&self.store, contract)?)
    }

    /// Write a checkpoint now; `None` for an in-memory store
    pub fn checkpoint(&self) -> Result<Option<u64>, EngineError> {
        Ok(self.store.checkpoint()?)
    }
}
