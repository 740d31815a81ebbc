//! Checkpoint, worker and configuration commands.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use std::path::Path;
use stratum_engine::{CheckpointConfig, CheckpointWorker, Engine};

/// Execute the checkpoint command.
pub fn execute_checkpoint(engine: &Engine, formatter: &Formatter) -> Result<()> {
    match engine.checkpoint()? {
        Some(sequence) => println!(
            "{}",
            formatter.success(&format!("Checkpoint written at sequence {}", sequence))
        ),
        None => println!("{}", formatter.info("In-memory store, nothing to checkpoint")),
    }
    Ok(())
}

/// Run the checkpoint worker until Ctrl+C.
pub async fn execute_worker(engine: &Engine, config: &CheckpointConfig) -> Result<()> {
    CheckpointWorker::new(engine.clone(), config.clone())
        .run()
        .await?;
    Ok(())
}

/// Execute a configuration action.
pub fn execute_config(
    args: ConfigArgs,
    config: &Config,
    path: &Path,
    formatter: &Formatter,
) -> Result<()> {
    match args.action {
        ConfigAction::Show => print!("{}", config.to_toml()?),
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            if path.exists() {
                println!(
                    "{}",
                    formatter.info(&format!("{} already exists", path.display()))
                );
            } else {
                Config::default().save(path)?;
                println!(
                    "{}",
                    formatter.success(&format!("Wrote {}", path.display()))
                );
            }
        }
    }
    Ok(())
}
