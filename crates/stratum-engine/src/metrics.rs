//! Metrics collection for engine operations

use std::collections::{BTreeMap, HashMap};
use stratum_domain::Tier;
use stratum_store::{ImportReport, StoreError};

/// Counters for imports, commits and checkpoints
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Phase imports committed
    pub imports_committed: usize,

    /// Phase imports rejected, by error kind
    pub rejected: BTreeMap<&'static str, usize>,

    /// Accepted constraint versions per tier
    pub accepted: HashMap<Tier, usize>,

    /// Accepted versions flagged UNVERIFIED
    pub unverified: usize,

    /// Fits registered
    pub fits_registered: usize,

    /// Commits retried after losing an optimistic race
    pub commit_retries: usize,

    /// Checkpoint worker wake-ups
    pub checkpoint_cycles: usize,

    /// Checkpoints written
    pub checkpoints_written: usize,

    /// Time spent in import pipelines (milliseconds)
    pub total_import_ms: u64,
}

/// Short name for the kind of error that rejected a batch
pub fn rejection_kind(error: &StoreError) -> &'static str {
    use stratum_store::{FitError, LedgerError};

    match error {
        StoreError::Ledger(LedgerError::FrozenViolation { .. }) => "frozen_violation",
        StoreError::Ledger(LedgerError::Governor(_)) | StoreError::Governor(_) => {
            "illegal_tier_transition"
        }
        StoreError::Ledger(_) => "ledger",
        StoreError::Conflict { .. } => "conflict",
        StoreError::Graph(_) => "supersession_cycle",
        StoreError::Fit(FitError::DanglingReference { .. }) => "dangling_reference",
        StoreError::Fit(_) => "fit",
        StoreError::Check(_) => "cancelled",
        _ => "other",
    }
}

impl EngineMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed import
    pub fn record_import(&mut self, report: &ImportReport, tiers: &[Tier], elapsed_ms: u64) {
        self.imports_committed += 1;
        for tier in tiers {
            *self.accepted.entry(*tier).or_insert(0) += 1;
        }
        self.unverified += report.unverified.len();
        self.fits_registered += report.fits.len();
        self.total_import_ms += elapsed_ms;
    }

    /// Record a rejected import
    pub fn record_rejection(&mut self, error: &StoreError) {
        *self.rejected.entry(rejection_kind(error)).or_insert(0) += 1;
    }

    /// Record a commit retry
    pub fn record_retry(&mut self) {
        self.commit_retries += 1;
    }

    /// Record a checkpoint worker cycle and whether it wrote a checkpoint
    pub fn record_checkpoint_cycle(&mut self, written: bool) {
        self.checkpoint_cycles += 1;
        if written {
            self.checkpoints_written += 1;
        }
    }

    /// Get total accepted versions across all tiers
    pub fn total_accepted(&self) -> usize {
        self.accepted.values().sum()
    }

    /// Get total rejected imports
    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Engine Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Imports committed: {}", self.imports_committed),
            format!("Imports rejected: {}", self.total_rejected()),
            format!("Commit retries: {}", self.commit_retries),
            format!("Import time: {}ms", self.total_import_ms),
            String::new(),
        ];

        if !self.accepted.is_empty() {
            lines.push("Accepted by tier:".to_string());
            for tier in Tier::ALL {
                if let Some(count) = self.accepted.get(&tier) {
                    lines.push(format!("  {}: {}", tier, count));
                }
            }
            lines.push(format!("  Unverified: {}", self.unverified));
            lines.push(format!("  Fits: {}", self.fits_registered));
            lines.push(String::new());
        }

        if !self.rejected.is_empty() {
            lines.push("Rejections:".to_string());
            for (kind, count) in &self.rejected {
                lines.push(format!("  {}: {}", kind, count));
            }
            lines.push(String::new());
        }

        lines.push(format!(
            "Checkpoints: {} written in {} cycles",
            self.checkpoints_written, self.checkpoint_cycles
        ));

        lines.join("\n")
    }
}
