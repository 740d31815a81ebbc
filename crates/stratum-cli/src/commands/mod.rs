//! Command implementations.

pub mod contract;
pub mod discard;
pub mod import;
pub mod inspect;
pub mod maintenance;
pub mod query;

pub use self::contract::execute_contract;
pub use self::discard::execute_discard;
pub use self::import::{execute_export, execute_import, execute_restore};
pub use self::inspect::{execute_family, execute_list, execute_show};
pub use self::maintenance::{execute_checkpoint, execute_config, execute_worker};
pub use self::query::{execute_ask, execute_query};

use crate::cli::Command;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::Path;
use stratum_engine::Engine;

/// Everything a command needs.
pub struct Context<'a> {
    /// Open engine
    pub engine: &'a Engine,
    /// Loaded configuration
    pub config: &'a Config,
    /// Where the configuration was loaded from
    pub config_path: &'a Path,
    /// Output formatter
    pub formatter: &'a Formatter,
}

/// Execute one command against an open engine.
pub async fn execute(command: Command, ctx: &Context<'_>) -> Result<()> {
    let Context {
        engine, formatter, ..
    } = *ctx;

    match command {
        Command::Import(args) => execute_import(args, engine, formatter).await,
        Command::Restore(args) => execute_restore(args, engine, formatter),
        Command::Export(args) => execute_export(args, engine, formatter),
        Command::Show(args) => execute_show(args, engine, formatter),
        Command::Family(args) => execute_family(args, engine, formatter),
        Command::List(args) => execute_list(args, engine, formatter),
        Command::Query(args) => execute_query(args, engine, formatter),
        Command::Ask(args) => execute_ask(args, engine, formatter),
        Command::Discard(args) => execute_discard(args, engine, formatter).await,
        Command::Contract(args) => execute_contract(args, engine, formatter),
        Command::Checkpoint => execute_checkpoint(engine, formatter),
        Command::Worker => execute_worker(engine, &ctx.config.stratum.checkpoint).await,
        Command::Config(args) => execute_config(args, ctx.config, ctx.config_path, formatter),
        Command::Repl => Err(CliError::InvalidInput("Already in REPL mode".to_string())),
    }
}
