//! Copy-on-write store: current snapshot, history, transactions and events

use crate::{
    AppendPlan, CommitLog, CommitNotice, CommitRecord, LedgerError, LogOp, Snapshot, StoreError,
    StoreEvent,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use stratum_domain::{
    Candidate, Constraint, ConstraintId, Contract, EdgeKind, FitId, FitSubmission, PhaseBatch, PhaseId,
    ReviewState,
};
use stratum_governor::{CancellationToken, ContradictionChecker, TierGovernor, Verdict};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Current time in seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file for the commit log; `None` keeps everything in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Number of past snapshots kept for `snapshot_at`
    pub history_limit: usize,

    /// Capacity of the commit broadcast channel
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            history_limit: 256,
            event_capacity: 64,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration with defaults
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Durable configuration backed by a SQLite file
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.history_limit == 0 {
            return Err("history_limit must be greater than 0".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Outcome of a phase import inside a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Batch id
    pub phase_id: PhaseId,

    /// Phase label
    pub phase: String,

    /// Ids the accepted candidates were stored under, in order
    pub accepted: Vec<ConstraintId>,

    /// Accepted ids carrying UNVERIFIED review notes
    pub unverified: Vec<ConstraintId>,

    /// Registered fits
    pub fits: Vec<FitId>,
}

/// Staged changes on a private copy of the snapshot
///
/// Nothing is visible to readers until [`Store::commit`]. A transaction that
/// returned an error must be dropped, not committed.
#[derive(Debug)]
pub struct Txn {
    base_sequence: u64,
    timestamp: u64,
    phase: Option<String>,
    state: Snapshot,
    ops: Vec<LogOp>,
    events: Vec<StoreEvent>,
}

impl Txn {
    fn new(base: &Snapshot, timestamp: u64) -> Self {
        Self {
            base_sequence: base.sequence,
            timestamp,
            phase: None,
            state: base.clone(),
            ops: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Staged view, including this transaction's changes
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    /// Sequence the transaction started from
    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    /// Timestamp stamped on every version written by this transaction
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Label the commit with a phase name
    pub fn set_phase(&mut self, phase: impl Into<String>) {
        self.phase = Some(phase.into());
    }

    /// Whether nothing has been staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Events staged so far
    pub fn events(&self) -> &[StoreEvent] {
        &self.events
    }

    /// Resolve and authorize a candidate without staging it
    pub fn plan(&self, candidate: &Candidate, governor: &TierGovernor) -> Result<AppendPlan, StoreError> {
        Ok(self.state.ledger.plan(candidate, governor)?)
    }

    /// Stage a planned version and its SUPERSEDES edge
    pub fn apply(
        &mut self,
        candidate: Candidate,
        plan: &AppendPlan,
        review: ReviewState,
    ) -> Result<ConstraintId, StoreError> {
        let event = self
            .state
            .ledger
            .apply(candidate, plan, review, self.timestamp);

        if let Some(predecessor) = &plan.predecessor {
            self.state.graph.add_edge(
                plan.id.clone(),
                predecessor.clone(),
                EdgeKind::Supersedes,
            )?;
        }

        let record = self.state.ledger.get_version(&plan.id)?.clone();
        self.ops.push(LogOp::Constraint {
            record,
            supersedes: plan.predecessor.clone(),
        });
        self.events.push(StoreEvent::Constraint { event });
        Ok(plan.id.clone())
    }

    /// Plan, confirm and stage a candidate with a known review state
    pub fn append(
        &mut self,
        candidate: Candidate,
        governor: &TierGovernor,
        review: ReviewState,
    ) -> Result<ConstraintId, StoreError> {
        let plan = self.plan(&candidate, governor)?;
        if let Some(previous) = plan.previous_tier {
            governor.confirm(plan.kind, previous, &review)?;
        }
        self.apply(candidate, &plan, review)
    }

    /// Discard an active tier-3/4 version
    pub fn discard(&mut self, id: &ConstraintId, governor: &TierGovernor) -> Result<(), StoreError> {
        let event = self.state.ledger.discard(id, governor)?;
        self.ops.push(LogOp::Discard { id: id.clone() });
        self.events.push(StoreEvent::Constraint { event });
        Ok(())
    }

    /// Register a fit and its SUPPORTS edges
    pub fn register_fit(&mut self, submission: FitSubmission) -> Result<FitId, StoreError> {
        let op = LogOp::Fit {
            fit: submission.fit.clone(),
            supports: submission.supports.clone(),
        };
        let supports = submission.supports.clone();
        let id = self
            .state
            .fits
            .register(submission, &self.state.ledger, &mut self.state.graph)?;
        self.ops.push(op);
        self.events.push(StoreEvent::Fit {
            id: id.clone(),
            supports,
        });
        Ok(id)
    }

    /// Record a locked contract and its REFERENCES edges
    ///
    /// Returns `false` when the identical contract is already recorded.
    pub fn record_contract(&mut self, contract: Contract) -> Result<bool, StoreError> {
        let key = contract.key();
        if let Some(existing) = self.state.contract(&key) {
            if existing == &contract {
                return Ok(false);
            }
            return Err(StoreError::ContractLocked(key.to_string()));
        }

        let op = LogOp::Contract { contract };
        op.apply_to(&mut self.state)?;
        self.ops.push(op);
        self.events.push(StoreEvent::Contract { key });
        Ok(true)
    }

    /// Stage an already-resolved version without governance (trusted restore)
    pub fn restore_constraint(
        &mut self,
        record: Constraint,
        supersedes: Option<ConstraintId>,
    ) -> Result<(), StoreError> {
        if self.state.ledger.get(&record.id).is_some() {
            return Err(LedgerError::DuplicateId(record.id).into());
        }
        let op = LogOp::Constraint { record, supersedes };
        op.apply_to(&mut self.state)?;
        self.ops.push(op);
        Ok(())
    }

    /// Run a phase import through the governance pipeline
    ///
    /// Per candidate: tier governor, contradiction check, ledger append,
    /// graph edge. Then the fits. The first error aborts; the caller drops
    /// the transaction.
    pub fn import(
        &mut self,
        batch: PhaseBatch,
        governor: &TierGovernor,
        checker: &ContradictionChecker,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, StoreError> {
        let PhaseBatch {
            id: phase_id,
            phase,
            constraints,
            fits,
        } = batch;

        self.set_phase(phase.clone());
        let before = self.state.clone();
        let mut session = checker.begin(&before);
        let mut report = ImportReport {
            phase_id,
            phase,
            accepted: Vec::with_capacity(constraints.len()),
            unverified: Vec::new(),
            fits: Vec::with_capacity(fits.len()),
        };

        for candidate in constraints {
            let plan = self.plan(&candidate, governor)?;

            let review = match session.check(&candidate, cancel)? {
                Verdict::Conflict { with, reason } => {
                    warn!(candidate = %candidate.id, with = %with, "Rejected conflicting candidate");
                    return Err(StoreError::Conflict {
                        candidate: candidate.id,
                        with,
                        reason,
                    });
                }
                Verdict::Clear => ReviewState::Clear,
                Verdict::Unverified(notes) => ReviewState::Unverified(notes),
            };

            if let Some(previous) = plan.previous_tier {
                governor.confirm(plan.kind, previous, &review)?;
            }

            let unverified = review.is_unverified();
            let id = self.apply(candidate, &plan, review)?;
            session.accept(self.state.ledger.get_version(&id)?.clone());

            if unverified {
                report.unverified.push(id.clone());
            }
            report.accepted.push(id);
        }

        for submission in fits {
            report.fits.push(self.register_fit(submission)?);
        }

        debug!(
            phase = %report.phase,
            accepted = report.accepted.len(),
            fits = report.fits.len(),
            "Staged phase import"
        );
        Ok(report)
    }
}

/// The constraint store
///
/// Readers take an `Arc<Snapshot>` and never observe a partial commit.
/// Writers stage a [`Txn`] on a private copy and commit it optimistically.
pub struct Store {
    current: RwLock<Arc<Snapshot>>,
    history: RwLock<VecDeque<Arc<Snapshot>>>,
    commit_lock: Mutex<()>,
    log: Option<Mutex<CommitLog>>,
    events: broadcast::Sender<CommitNotice>,
    config: StoreConfig,
}

impl Store {
    /// Create an in-memory store
    pub fn in_memory() -> Self {
        Self::with_snapshot(Snapshot::new(), None, StoreConfig::in_memory())
    }

    /// Open a store, recovering from the commit log when `config.path` is set
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        match &config.path {
            Some(path) => {
                let log = CommitLog::open(path)?;
                let snapshot = log.recover()?;
                info!(path = %path.display(), sequence = snapshot.sequence, "Opened durable store");
                Ok(Self::with_snapshot(snapshot, Some(log), config))
            }
            None => Ok(Self::with_snapshot(Snapshot::new(), None, config)),
        }
    }

    fn with_snapshot(snapshot: Snapshot, log: Option<CommitLog>, config: StoreConfig) -> Self {
        let snapshot = Arc::new(snapshot);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            current: RwLock::new(Arc::clone(&snapshot)),
            history: RwLock::new(VecDeque::from([snapshot])),
            commit_lock: Mutex::new(()),
            log: log.map(Mutex::new),
            events,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether commits are persisted
    pub fn is_durable(&self) -> bool {
        self.log.is_some()
    }

    /// Latest committed snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Sequence of the latest committed snapshot
    pub fn sequence(&self) -> u64 {
        self.current.read().sequence
    }

    /// Start a transaction stamped with the current time
    pub fn begin(&self) -> Txn {
        self.begin_at(unix_now())
    }

    /// Start a transaction stamped with `timestamp`
    pub fn begin_at(&self, timestamp: u64) -> Txn {
        Txn::new(&self.snapshot(), timestamp)
    }

    /// Commit a transaction
    ///
    /// Fails with [`StoreError::Stale`] if another commit landed since the
    /// transaction began; the caller re-runs against the new snapshot. An
    /// empty transaction commits nothing.
    pub fn commit(&self, txn: Txn) -> Result<Arc<Snapshot>, StoreError> {
        let _guard = self.commit_lock.lock();
        let current = self.snapshot();

        if current.sequence != txn.base_sequence {
            return Err(StoreError::Stale {
                base: txn.base_sequence,
                current: current.sequence,
            });
        }
        if txn.is_empty() {
            return Ok(current);
        }

        let Txn {
            timestamp,
            phase,
            mut state,
            ops,
            events,
            ..
        } = txn;

        let sequence = current.sequence + 1;
        let committed_at = timestamp.max(current.committed_at);
        state.sequence = sequence;
        state.committed_at = committed_at;

        if let Some(log) = &self.log {
            log.lock().append(&CommitRecord {
                sequence,
                committed_at,
                phase: phase.clone(),
                ops,
            })?;
        }

        let snapshot = Arc::new(state);
        *self.current.write() = Arc::clone(&snapshot);
        {
            let mut history = self.history.write();
            history.push_back(Arc::clone(&snapshot));
            while history.len() > self.config.history_limit.max(1) {
                history.pop_front();
            }
        }

        info!(sequence, events = events.len(), phase = ?phase, "Committed snapshot");
        // No subscribers is not an error
        let _ = self.events.send(CommitNotice {
            sequence,
            phase,
            events,
        });

        Ok(snapshot)
    }

    /// Newest retained snapshot committed at or before `time`
    pub fn snapshot_at(&self, time: u64) -> Option<Arc<Snapshot>> {
        self.history
            .read()
            .iter()
            .rev()
            .find(|s| s.committed_at <= time)
            .cloned()
    }

    /// Retained snapshot with the given sequence
    pub fn snapshot_at_sequence(&self, sequence: u64) -> Option<Arc<Snapshot>> {
        self.history
            .read()
            .iter()
            .find(|s| s.sequence == sequence)
            .cloned()
    }

    /// Subscribe to commit notices
    pub fn subscribe(&self) -> broadcast::Receiver<CommitNotice> {
        self.events.subscribe()
    }

    /// Compact the commit log into a checkpoint of the current snapshot
    ///
    /// Returns the checkpointed sequence, or `None` for an in-memory store.
    pub fn checkpoint(&self) -> Result<Option<u64>, StoreError> {
        let Some(log) = &self.log else {
            return Ok(None);
        };
        let _guard = self.commit_lock.lock();
        let snapshot = self.snapshot();
        log.lock().write_checkpoint(&snapshot, unix_now())?;
        Ok(Some(snapshot.sequence))
    }

    /// Log rows not yet compacted (0 for an in-memory store)
    pub fn pending_log_entries(&self) -> Result<usize, StoreError> {
        match &self.log {
            Some(log) => log.lock().pending_entries(),
            None => Ok(0),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::in_memory()
    }
}
