//! Import, restore and export commands.

use crate::cli::{ExportArgs, ImportArgs, RestoreArgs};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::fs;
use std::path::Path;
use stratum_domain::PhaseBatch;
use stratum_engine::{manifest, Engine};
use stratum_governor::CancellationToken;
use stratum_store::tsv;

/// Execute the import command.
///
/// Ctrl+C during the import cancels the contradiction scan; the batch is
/// then discarded as a whole.
pub async fn execute_import(args: ImportArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let batch = read_batch(&args)?;

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let result = engine.import_phase(batch, cancel).await;
    watcher.abort();

    println!("{}", formatter.format_report(&result?)?);
    Ok(())
}

fn read_batch(args: &ImportArgs) -> Result<PhaseBatch> {
    if let Some(path) = &args.manifest {
        let mut batch = manifest::read_manifest(path)?;
        if let Some(phase) = &args.phase {
            batch.phase = phase.clone();
        }
        return Ok(batch);
    }

    let source = args
        .constraints
        .as_deref()
        .or(args.fits.as_deref())
        .ok_or_else(|| {
            CliError::InvalidInput("Provide --manifest, --constraints or --fits".to_string())
        })?;
    let phase = match &args.phase {
        Some(phase) => phase.clone(),
        None => phase_name(source),
    };

    let fits = args.fits.as_deref().map(fs::read_to_string).transpose()?;
    match &args.constraints {
        Some(path) => Ok(manifest::batch_from_tables(
            &phase,
            &fs::read_to_string(path)?,
            fits.as_deref(),
        )?),
        None => {
            let mut batch = PhaseBatch::new(phase);
            for submission in tsv::parse_fits(fits.as_deref().unwrap_or_default())? {
                batch = batch.with_fit(submission);
            }
            Ok(batch)
        }
    }
}

/// Phase label derived from a table file name.
fn phase_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "import".to_string())
}

/// Execute the restore command.
pub fn execute_restore(args: RestoreArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let rows = tsv::parse_constraints(&fs::read_to_string(&args.constraints)?)?;
    let fits = match &args.fits {
        Some(path) => tsv::parse_fits(&fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let snapshot = tsv::restore(engine.store(), rows, fits)?;
    println!(
        "{}",
        formatter.success(&format!(
            "Restored {} version(s) and {} fit(s)",
            snapshot.ledger.len(),
            snapshot.fits.len()
        ))
    );
    Ok(())
}

/// Execute the export command.
pub fn execute_export(args: ExportArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    let snapshot = engine.snapshot();
    let constraints = tsv::export_constraints(&snapshot);
    let fits = tsv::export_fits(&snapshot);

    match &args.out {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            fs::write(dir.join("constraints.tsv"), constraints)?;
            fs::write(dir.join("fits.tsv"), fits)?;
            println!(
                "{}",
                formatter.success(&format!(
                    "Exported {} version(s) and {} fit(s) to {}",
                    snapshot.ledger.len(),
                    snapshot.fits.len(),
                    dir.display()
                ))
            );
        }
        None => {
            print!("{}", constraints);
            if !snapshot.fits.is_empty() {
                print!("\n{}", fits);
            }
        }
    }
    Ok(())
}
