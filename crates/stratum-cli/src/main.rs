//! Stratum CLI - Command-line interface for the Stratum constraint store.

use anyhow::Context as _;
use clap::Parser;
use stratum_cli::commands::{self, Context};
use stratum_cli::repl;
use stratum_cli::{Cli, Command, Config, Formatter};
use stratum_engine::Engine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Log to stderr; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    // Configuration commands never open the store
    let command = match cli.command {
        Some(Command::Config(args)) => {
            commands::execute_config(args, &config, &config_path, &formatter)?;
            return Ok(());
        }
        other => other,
    };

    let db = config.resolve_store_path(cli.db)?;
    let engine = Engine::open(config.stratum.clone())
        .with_context(|| format!("failed to open {}", db.display()))?;
    tracing::debug!(path = %db.display(), sequence = engine.snapshot().sequence, "Opened store");

    let ctx = Context {
        engine: &engine,
        config: &config,
        config_path: &config_path,
        formatter: &formatter,
    };

    match command {
        None | Some(Command::Repl) => repl::run_repl(&ctx).await?,
        Some(command) => commands::execute(command, &ctx).await?,
    }

    Ok(())
}
