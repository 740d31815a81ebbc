//! Discard command implementation.

use crate::cli::DiscardArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::io::{self, Write};
use stratum_engine::Engine;
use stratum_store::tsv;

/// Execute the discard command.
pub async fn execute_discard(args: DiscardArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let id = tsv::normalize_id(&args.id).map_err(CliError::InvalidInput)?;

    // Confirm unless --yes is specified
    if !args.yes {
        print!("Discard {}? Stored versions are kept but leave the active set. [y/N] ", id);
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;

        if !response.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.info("Operation cancelled"));
            return Ok(());
        }
    }

    engine.discard(id.clone()).await?;
    println!("{}", formatter.success(&format!("Discarded {}", id)));
    Ok(())
}
