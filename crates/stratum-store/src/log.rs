//! Durable commit log (SQLite)
//!
//! Every commit is appended as one JSON row before the new snapshot is
//! published. Recovery loads the newest checkpoint and replays later rows.

use crate::{Snapshot, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use stratum_domain::{Constraint, ConstraintId, Contract, EdgeKind, Fit, NodeRef};
use tracing::{debug, info};

/// One resolved mutation, replayable without governance checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LogOp {
    /// Version inserted (as it was at insert time)
    Constraint {
        /// The stored version
        record: Constraint,
        /// Predecessor it superseded
        #[serde(default, skip_serializing_if = "Option::is_none")]
        supersedes: Option<ConstraintId>,
    },

    /// Version discarded
    Discard {
        /// Discarded id
        id: ConstraintId,
    },

    /// Fit registered
    Fit {
        /// Fit attributes
        fit: Fit,
        /// Supported versions
        supports: Vec<ConstraintId>,
    },

    /// Contract locked
    Contract {
        /// The locked artifact
        contract: Contract,
    },
}

impl LogOp {
    /// Apply to a snapshot without validation
    pub fn apply_to(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
        match self {
            LogOp::Constraint { record, supersedes } => {
                snapshot
                    .ledger
                    .insert_resolved(record.clone(), supersedes.as_ref());
                if let Some(predecessor) = supersedes {
                    snapshot.graph.add_edge(
                        record.id.clone(),
                        predecessor.clone(),
                        EdgeKind::Supersedes,
                    )?;
                }
            }
            LogOp::Discard { id } => snapshot.ledger.mark_discarded(id),
            LogOp::Fit { fit, supports } => {
                for supported in supports {
                    snapshot
                        .graph
                        .add_edge(fit.id.clone(), supported.clone(), EdgeKind::Supports)?;
                }
                snapshot.fits.insert_resolved(fit.clone());
            }
            LogOp::Contract { contract } => {
                let key = contract.key();
                for reference in contract.all_references() {
                    if let Ok(id) = ConstraintId::parse(&reference) {
                        if snapshot.ledger.get(&id).is_some() {
                            snapshot.graph.add_edge(
                                NodeRef::Contract(key.clone()),
                                id,
                                EdgeKind::References,
                            )?;
                        }
                    }
                }
                snapshot.contracts.insert(key.to_string(), contract.clone());
            }
        }
        Ok(())
    }
}

/// One committed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Sequence of the snapshot this commit produced
    pub sequence: u64,

    /// Commit time (seconds since Unix epoch)
    pub committed_at: u64,

    /// Phase label, if any
    pub phase: Option<String>,

    /// Mutations in order
    pub ops: Vec<LogOp>,
}

impl CommitRecord {
    /// Replay onto a snapshot, advancing its sequence and time
    pub fn replay(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
        for op in &self.ops {
            op.apply_to(snapshot)?;
        }
        snapshot.sequence = self.sequence;
        snapshot.committed_at = self.committed_at;
        Ok(())
    }
}

/// SQLite-backed commit log and checkpoint table
///
/// SQLite connections are not thread-safe; the store wraps the log in a mutex.
pub struct CommitLog {
    conn: Connection,
}

impl CommitLog {
    /// Open (or create) a log at the given path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut log = Self { conn };
        log.initialize_schema()?;
        Ok(log)
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Append a commit record
    pub fn append(&mut self, record: &CommitRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record.ops)?;
        self.conn.execute(
            "INSERT INTO commit_log (sequence, committed_at, phase, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.sequence as i64,
                record.committed_at as i64,
                &record.phase,
                payload,
            ],
        )?;
        debug!(sequence = record.sequence, ops = record.ops.len(), "Appended commit record");
        Ok(())
    }

    /// Records with a sequence greater than `after`, in order
    pub fn records_after(&self, after: u64) -> Result<Vec<CommitRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, committed_at, phase, payload FROM commit_log
             WHERE sequence > ?1 ORDER BY sequence",
        )?;

        let rows = stmt
            .query_map(params![after as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(sequence, committed_at, phase, payload)| -> Result<CommitRecord, StoreError> {
                Ok(CommitRecord {
                    sequence,
                    committed_at,
                    phase,
                    ops: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }

    /// Number of log rows not yet compacted into a checkpoint
    pub fn pending_entries(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commit_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Newest checkpoint, if any
    pub fn latest_checkpoint(&self) -> Result<Option<Snapshot>, StoreError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT snapshot FROM checkpoints ORDER BY sequence DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Write a checkpoint and drop the log rows and checkpoints it compacts
    pub fn write_checkpoint(&mut self, snapshot: &Snapshot, created_at: u64) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO checkpoints (sequence, created_at, snapshot) VALUES (?1, ?2, ?3)",
            params![snapshot.sequence as i64, created_at as i64, json],
        )?;
        let compacted = tx.execute(
            "DELETE FROM commit_log WHERE sequence <= ?1",
            params![snapshot.sequence as i64],
        )?;
        tx.execute(
            "DELETE FROM checkpoints WHERE sequence < ?1",
            params![snapshot.sequence as i64],
        )?;
        tx.commit()?;

        info!(sequence = snapshot.sequence, compacted, "Checkpoint written");
        Ok(())
    }

    /// Rebuild the latest snapshot from checkpoint plus log
    pub fn recover(&self) -> Result<Snapshot, StoreError> {
        let mut snapshot = self.latest_checkpoint()?.unwrap_or_default();
        let records = self.records_after(snapshot.sequence)?;
        let replayed = records.len();
        for record in records {
            record.replay(&mut snapshot)?;
        }
        info!(sequence = snapshot.sequence, replayed, "Recovered store state");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Candidate, ReviewState, Scope, Tier};

    fn record(sequence: u64, id: &str, supersedes: Option<&str>) -> CommitRecord {
        let cid = ConstraintId::parse(id).unwrap();
        let candidate = Candidate::new(cid.clone(), "statement", Tier::Established, Scope::B);
        CommitRecord {
            sequence,
            committed_at: 1_000 + sequence,
            phase: Some(format!("phase {}", sequence)),
            ops: vec![LogOp::Constraint {
                record: Constraint::from_candidate(
                    candidate,
                    cid.clone(),
                    cid.family(),
                    supersedes.map_or(0, |_| 1),
                    ReviewState::Clear,
                    1_000 + sequence,
                ),
                supersedes: supersedes.map(|s| ConstraintId::parse(s).unwrap()),
            }],
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let mut log = CommitLog::open(":memory:").unwrap();
        log.append(&record(1, "C1", None)).unwrap();
        log.append(&record(2, "C1.a", Some("C1"))).unwrap();

        assert_eq!(log.pending_entries().unwrap(), 2);
        let records = log.records_after(1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record(2, "C1.a", Some("C1")));
    }

    #[test]
    fn test_recover_replays_supersession() {
        let mut log = CommitLog::open(":memory:").unwrap();
        log.append(&record(1, "C1", None)).unwrap();
        log.append(&record(2, "C1.a", Some("C1"))).unwrap();

        let snapshot = log.recover().unwrap();
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.committed_at, 1_002);
        let c1 = ConstraintId::parse("C1").unwrap();
        assert!(!snapshot.ledger.get(&c1).unwrap().is_active());
        assert_eq!(snapshot.superseded_by(&c1).map(|id| id.as_str()), Some("C1.a"));
    }

    #[test]
    fn test_checkpoint_compacts_log() {
        let mut log = CommitLog::open(":memory:").unwrap();
        log.append(&record(1, "C1", None)).unwrap();
        log.append(&record(2, "C2", None)).unwrap();

        let snapshot = log.recover().unwrap();
        log.write_checkpoint(&snapshot, 5_000).unwrap();
        assert_eq!(log.pending_entries().unwrap(), 0);

        log.append(&record(3, "C3", None)).unwrap();
        let recovered = log.recover().unwrap();
        assert_eq!(recovered.sequence, 3);
        assert_eq!(recovered.ledger.len(), 3);
    }
}
