//! Show, family and list commands.

use crate::cli::{FamilyArgs, ListArgs, ShowArgs};
use crate::error::{CliError, Result};
use crate::output::{is_listed, Formatter};
use stratum_domain::{Constraint, FitId, Scope, Tier};
use stratum_engine::Engine;
use stratum_store::tsv;

/// Execute the show command.
pub fn execute_show(args: ShowArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let snapshot = engine.snapshot();

    if let Ok(id) = tsv::normalize_id(&args.id) {
        if let Some(record) = snapshot.ledger.get(&id) {
            println!("{}", formatter.format_constraint(&snapshot, record)?);
            return Ok(());
        }
    }
    if let Ok(id) = FitId::new(args.id.trim()) {
        if let Some(fit) = snapshot.fits.get(&id) {
            println!("{}", formatter.format_fit(&snapshot, fit)?);
            return Ok(());
        }
    }

    Err(CliError::NotFound(args.id))
}

/// Execute the family command.
pub fn execute_family(args: FamilyArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let id = tsv::normalize_id(&args.base).map_err(CliError::InvalidInput)?;
    let snapshot = engine.snapshot();
    let chain = snapshot.chain(&id.family());
    if chain.is_empty() {
        return Err(CliError::NotFound(format!("family {}", id.family())));
    }

    println!("{}", formatter.format_constraints(&chain)?);
    Ok(())
}

/// Execute the list command.
pub fn execute_list(args: ListArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let tier = args.tier.as_deref().map(parse_tier).transpose()?;
    let scope = args.scope.as_deref().map(parse_scope).transpose()?;

    let snapshot = match args.at {
        Some(sequence) => engine
            .store()
            .snapshot_at_sequence(sequence)
            .ok_or_else(|| CliError::NotFound(format!("snapshot at sequence {}", sequence)))?,
        None => engine.snapshot(),
    };

    let mut records: Vec<&Constraint> = snapshot
        .ledger
        .iter()
        .filter(|c| is_listed(c, args.all))
        .filter(|c| tier.is_none_or(|t| c.tier == t))
        .filter(|c| scope.is_none_or(|s| c.scope == s))
        .collect();
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    println!("{}", formatter.format_constraints(&records)?);
    Ok(())
}

/// Parse a tier argument (level or name).
pub fn parse_tier(value: &str) -> Result<Tier> {
    Tier::parse(value).ok_or_else(|| CliError::InvalidInput(format!("Unknown tier '{}'", value)))
}

/// Parse a scope argument.
pub fn parse_scope(value: &str) -> Result<Scope> {
    Scope::parse(value).ok_or_else(|| CliError::InvalidInput(format!("Unknown scope '{}'", value)))
}
