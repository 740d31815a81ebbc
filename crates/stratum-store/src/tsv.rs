//! Tab-separated constraint and fit tables
//!
//! Constraint table: `NUM, CONSTRAINT, TIER, SCOPE, LOCATION`, optionally
//! followed by `SUPERSEDES, STATUS`. Fit table: `ID, FIT, TIER, SCOPE, RESULT,
//! SUPPORTS, FILE`. Columns are matched by header name; blank lines and lines
//! starting with `#` are skipped.

use crate::{LedgerError, Snapshot, Store, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use stratum_domain::{
    Candidate, Constraint, ConstraintId, Fit, FitId, FitResult, FitSubmission, Provenance,
    ReviewState, Scope, Status, Tier,
};
use tracing::info;

const CONSTRAINT_COLUMNS: [&str; 5] = ["NUM", "CONSTRAINT", "TIER", "SCOPE", "LOCATION"];
const FIT_COLUMNS: [&str; 7] = ["ID", "FIT", "TIER", "SCOPE", "RESULT", "SUPPORTS", "FILE"];

/// One row of a constraint table
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRow {
    /// Normalized id (`121` becomes `C121`)
    pub id: ConstraintId,
    /// Statement text
    pub statement: String,
    /// Tier
    pub tier: Tier,
    /// Scope
    pub scope: Scope,
    /// Parsed LOCATION column
    pub provenance: Provenance,
    /// SUPERSEDES column, if present and non-empty
    pub supersedes: Option<ConstraintId>,
    /// STATUS column, if present and non-empty
    pub status: Option<Status>,
}

impl ConstraintRow {
    /// Candidate for a governed import (STATUS is ignored)
    pub fn into_candidate(self) -> Candidate {
        let mut candidate = Candidate::new(self.id, self.statement, self.tier, self.scope)
            .with_provenance(self.provenance);
        candidate.supersedes = self.supersedes;
        candidate
    }
}

/// Normalize a NUM cell: bare digits get the `C` prefix
pub fn normalize_id(raw: &str) -> Result<ConstraintId, String> {
    let raw = raw.trim();
    let base = raw.split('.').next().unwrap_or_default();
    let normalized = if !base.is_empty() && base.chars().all(|c| c.is_ascii_digit()) {
        format!("C{}", raw)
    } else {
        raw.to_string()
    };
    ConstraintId::parse(&normalized).map_err(|e| e.to_string())
}

struct Table<'a> {
    columns: HashMap<String, usize>,
    rows: Vec<(usize, Vec<&'a str>)>,
}

impl<'a> Table<'a> {
    fn parse(input: &'a str, required: &[&str]) -> Result<Self, StoreError> {
        let mut lines = input
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));

        let (header_line, header) = lines.next().ok_or(StoreError::Parse {
            line: 1,
            message: "missing header".to_string(),
        })?;

        let columns: HashMap<String, usize> = header
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim().to_ascii_uppercase(), i))
            .collect();

        for name in required {
            if !columns.contains_key(*name) {
                return Err(StoreError::Parse {
                    line: header_line,
                    message: format!("missing column {}", name),
                });
            }
        }

        Ok(Self {
            columns,
            rows: lines.map(|(n, line)| (n, line.split('\t').collect())).collect(),
        })
    }

    fn cell(&self, row: &[&'a str], name: &str) -> &'a str {
        self.columns
            .get(name)
            .and_then(|&i| row.get(i).copied())
            .map(str::trim)
            .unwrap_or("")
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> StoreError {
    StoreError::Parse {
        line,
        message: message.into(),
    }
}

/// Parse a constraint table
pub fn parse_constraints(input: &str) -> Result<Vec<ConstraintRow>, StoreError> {
    let table = Table::parse(input, &CONSTRAINT_COLUMNS)?;
    let mut rows = Vec::with_capacity(table.rows.len());

    for (line, cells) in &table.rows {
        let line = *line;
        let id = normalize_id(table.cell(cells, "NUM")).map_err(|e| parse_error(line, e))?;
        let tier_cell = table.cell(cells, "TIER");
        let tier = Tier::parse(tier_cell)
            .ok_or_else(|| parse_error(line, format!("invalid tier '{}'", tier_cell)))?;
        let scope_cell = table.cell(cells, "SCOPE");
        let scope = Scope::parse(scope_cell)
            .ok_or_else(|| parse_error(line, format!("invalid scope '{}'", scope_cell)))?;

        let supersedes = match table.cell(cells, "SUPERSEDES") {
            "" => None,
            cell => Some(normalize_id(cell).map_err(|e| parse_error(line, e))?),
        };
        let status = match table.cell(cells, "STATUS") {
            "" => None,
            cell => Some(
                Status::parse(cell)
                    .ok_or_else(|| parse_error(line, format!("invalid status '{}'", cell)))?,
            ),
        };

        rows.push(ConstraintRow {
            id,
            statement: table.cell(cells, "CONSTRAINT").to_string(),
            tier,
            scope,
            provenance: Provenance::parse_location(table.cell(cells, "LOCATION")),
            supersedes,
            status,
        });
    }

    Ok(rows)
}

/// Parse a fit table
pub fn parse_fits(input: &str) -> Result<Vec<FitSubmission>, StoreError> {
    let table = Table::parse(input, &FIT_COLUMNS[..6])?;
    let mut fits = Vec::with_capacity(table.rows.len());

    for (line, cells) in &table.rows {
        let line = *line;
        let id = FitId::new(table.cell(cells, "ID")).map_err(|e| parse_error(line, e))?;
        let tier_cell = table.cell(cells, "TIER");
        let tier = Tier::parse(tier_cell)
            .ok_or_else(|| parse_error(line, format!("invalid tier '{}'", tier_cell)))?;
        let scope_cell = table.cell(cells, "SCOPE");
        let scope = Scope::parse(scope_cell)
            .ok_or_else(|| parse_error(line, format!("invalid scope '{}'", scope_cell)))?;

        let supports = table
            .cell(cells, "SUPPORTS")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| normalize_id(s).map_err(|e| parse_error(line, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let file = match table.cell(cells, "FILE") {
            "" => None,
            f => Some(f.to_string()),
        };

        fits.push(FitSubmission::new(
            Fit {
                id,
                statement: table.cell(cells, "FIT").to_string(),
                tier,
                scope,
                result: FitResult::parse(table.cell(cells, "RESULT")),
                file,
            },
            supports,
        ));
    }

    Ok(fits)
}

fn clean(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

/// Export every stored version, grouped by family, with extension columns
pub fn export_constraints(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str("NUM\tCONSTRAINT\tTIER\tSCOPE\tLOCATION\tSUPERSEDES\tSTATUS\n");
    for family in snapshot.ledger.family_ids() {
        for record in snapshot.ledger.family(family) {
            let supersedes = snapshot
                .supersedes(&record.id)
                .map(|id| id.as_str().to_string())
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                record.id,
                clean(&record.statement),
                record.tier.level(),
                record.scope,
                clean(&record.provenance.to_string()),
                supersedes,
                record.status,
            );
        }
    }
    out
}

/// Export every registered fit
pub fn export_fits(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str(&FIT_COLUMNS.join("\t"));
    out.push('\n');
    for fit in snapshot.fits.iter() {
        let supports: Vec<&str> = snapshot
            .fits
            .supported_by(&fit.id, &snapshot.graph)
            .into_iter()
            .map(|id| id.as_str())
            .collect();
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            fit.id,
            clean(&fit.statement),
            fit.tier.level(),
            fit.scope,
            fit.result.as_str(),
            supports.join(","),
            fit.file.as_deref().map(clean).unwrap_or_default(),
        );
    }
    out
}

/// Load exported tables into an empty store without governance checks
///
/// Used to rebuild a store from its own export. Rows must list predecessors
/// before successors; every family may end with at most one ACTIVE version.
pub fn restore(
    store: &Store,
    constraints: Vec<ConstraintRow>,
    fits: Vec<FitSubmission>,
) -> Result<Arc<Snapshot>, StoreError> {
    if !store.snapshot().is_empty() {
        return Err(StoreError::NotEmpty);
    }

    let mut txn = store.begin();
    txn.set_phase("restore");
    let timestamp = txn.timestamp();
    let mut versions: BTreeMap<_, u32> = BTreeMap::new();

    for row in constraints {
        let family = row.id.family();
        if let Some(predecessor) = &row.supersedes {
            if predecessor.family() != family {
                return Err(LedgerError::FamilyMismatch {
                    id: row.id,
                    supersedes: predecessor.clone(),
                }
                .into());
            }
            if txn.snapshot().ledger.get(predecessor).is_none() {
                return Err(LedgerError::NotFound(predecessor.clone()).into());
            }
        }

        let counter = versions.entry(family.clone()).or_insert(0);
        let version = *counter;
        *counter += 1;

        let status = row.status.unwrap_or(Status::Active);
        let supersedes = row.supersedes.clone();
        let id = row.id.clone();
        let mut record = Constraint::from_candidate(
            row.into_candidate(),
            id,
            family,
            version,
            ReviewState::Unchecked,
            timestamp,
        );
        record.status = status;
        txn.restore_constraint(record, supersedes)?;
    }

    for family in versions.keys() {
        let active = txn
            .snapshot()
            .ledger
            .family(family)
            .iter()
            .filter(|c| c.is_active())
            .count();
        if active > 1 {
            return Err(parse_error(
                0,
                format!("family {} has {} ACTIVE versions", family, active),
            ));
        }
    }

    for submission in fits {
        txn.register_fit(submission)?;
    }

    let snapshot = store.commit(txn)?;
    info!(
        constraints = snapshot.ledger.len(),
        fits = snapshot.fits.len(),
        "Restored store from tables"
    );
    Ok(snapshot)
}
