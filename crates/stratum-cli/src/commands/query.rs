//! Query and ask commands.

use super::inspect::{parse_scope, parse_tier};
use crate::cli::{AskArgs, QueryArgs};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use stratum_domain::Tier;
use stratum_engine::Engine;

/// Execute the query command.
pub fn execute_query(args: QueryArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let term = args.term.join(" ");
    if term.trim().is_empty() {
        return Err(CliError::InvalidInput("Query term is empty".to_string()));
    }
    let tiers = args
        .tier
        .iter()
        .map(|t| parse_tier(t))
        .collect::<Result<Vec<Tier>>>()?;
    let scope = args.scope.as_deref().map(parse_scope).transpose()?;

    let hits = engine.query_engine().query(
        &term,
        (!tiers.is_empty()).then_some(tiers.as_slice()),
        scope,
    );
    println!("{}", formatter.format_citations(&hits)?);
    Ok(())
}

/// Execute the ask command.
pub fn execute_ask(args: AskArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let answer = engine.query_engine().answer(&args.question.join(" "));
    println!("{}", formatter.format_answer(&answer)?);
    Ok(())
}
