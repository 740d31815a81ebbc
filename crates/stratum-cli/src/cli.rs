//! CLI command definitions and argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stratum CLI - Govern a tiered store of research constraints.
#[derive(Debug, Parser)]
#[command(name = "stratum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STRATUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides store.path)
    #[arg(long, global = true, env = "STRATUM_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a research phase (constraint table, fit table or JSON manifest)
    Import(ImportArgs),

    /// Rebuild an empty store from exported tables
    Restore(RestoreArgs),

    /// Export constraint and fit tables
    Export(ExportArgs),

    /// Show one constraint version or fit
    Show(ShowArgs),

    /// Show the supersession chain of a family
    Family(FamilyArgs),

    /// List constraints
    List(ListArgs),

    /// Look up constraints by id, family or keywords
    Query(QueryArgs),

    /// Ask a question answered only from cited records
    Ask(AskArgs),

    /// Discard an active tier-3/4 constraint
    Discard(DiscardArgs),

    /// Compile, lock and inspect contracts
    Contract(ContractArgs),

    /// Fold the commit log into a checkpoint
    Checkpoint,

    /// Run the checkpoint worker until Ctrl+C
    Worker,

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Enter interactive REPL mode
    Repl,
}

/// Arguments for the import command.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Constraint table (TSV)
    #[arg(long, conflicts_with = "manifest")]
    pub constraints: Option<PathBuf>,

    /// Fit table (TSV)
    #[arg(long, conflicts_with = "manifest")]
    pub fits: Option<PathBuf>,

    /// Phase manifest (JSON)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Phase name for table imports
    #[arg(short, long)]
    pub phase: Option<String>,
}

/// Arguments for the restore command.
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Exported constraint table
    pub constraints: PathBuf,

    /// Exported fit table
    #[arg(long)]
    pub fits: Option<PathBuf>,
}

/// Arguments for the export command.
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Directory for constraints.tsv and fits.tsv (stdout if omitted)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for the show command.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Constraint id (`C498.a`, `498`) or fit id (`F-AZC-016`)
    pub id: String,
}

/// Arguments for the family command.
#[derive(Debug, Args)]
pub struct FamilyArgs {
    /// Family base id (`C498`)
    pub base: String,
}

/// Arguments for the list command.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Filter by tier (0-4 or name)
    #[arg(short, long)]
    pub tier: Option<String>,

    /// Filter by scope (A, B, AZC, HT, GLOBAL)
    #[arg(short, long)]
    pub scope: Option<String>,

    /// Include superseded and discarded versions
    #[arg(short, long)]
    pub all: bool,

    /// Read the snapshot produced by this commit sequence
    #[arg(long)]
    pub at: Option<u64>,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the query command.
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Id, family base or keywords
    pub term: Vec<String>,

    /// Restrict to tiers (repeatable)
    #[arg(short, long)]
    pub tier: Vec<String>,

    /// Restrict to a scope
    #[arg(short, long)]
    pub scope: Option<String>,
}

/// Arguments for the ask command.
#[derive(Debug, Args)]
pub struct AskArgs {
    /// Question text
    #[arg(required = true)]
    pub question: Vec<String>,
}

/// Arguments for the discard command.
#[derive(Debug, Args)]
pub struct DiscardArgs {
    /// Constraint id
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for contract management.
#[derive(Debug, Args)]
pub struct ContractArgs {
    #[command(subcommand)]
    pub action: ContractAction,
}

/// Contract actions.
#[derive(Debug, Subcommand)]
pub enum ContractAction {
    /// Compile a DRAFT contract and print it
    Build(ContractSpecArgs),

    /// Compile and lock a contract, then write its YAML file
    Lock(ContractSpecArgs),

    /// Print a locked contract
    Show {
        /// Contract name
        name: String,
        /// Version label
        version: String,
    },

    /// List locked contracts
    List,
}

/// Contract identity, selector and output.
#[derive(Debug, Args)]
pub struct ContractSpecArgs {
    /// Contract name (e.g., BCSC)
    pub name: String,

    /// Version label (e.g., 3.11)
    pub version: String,

    /// Selector over active binding records (e.g., "scope = B AND tier <= 2")
    #[arg(short, long, default_value = "*")]
    pub selector: String,

    /// Extra ids cited in the invariants section (repeatable)
    #[arg(long)]
    pub cite: Vec<String>,

    /// Directory the YAML file is written to
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for configuration inspection.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write the default configuration file if none exists
    Init,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_enters_repl() {
        let cli = Cli::parse_from(["stratum"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_import_command() {
        let cli = Cli::parse_from([
            "stratum",
            "import",
            "--constraints",
            "phase77.tsv",
            "--phase",
            "PHASE_77",
        ]);
        match cli.command {
            Some(Command::Import(args)) => {
                assert_eq!(args.phase.as_deref(), Some("PHASE_77"));
                assert!(args.manifest.is_none());
            }
            _ => panic!("Expected Import command"),
        }
    }

    #[test]
    fn test_manifest_conflicts_with_tables() {
        let result = Cli::try_parse_from([
            "stratum",
            "import",
            "--manifest",
            "p.json",
            "--constraints",
            "p.tsv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_contract_lock_command() {
        let cli = Cli::parse_from([
            "stratum",
            "contract",
            "lock",
            "BCSC",
            "3.11",
            "--selector",
            "scope = B AND tier <= 2",
            "--cite",
            "C121",
        ]);
        match cli.command {
            Some(Command::Contract(ContractArgs {
                action: ContractAction::Lock(spec),
            })) => {
                assert_eq!(spec.version, "3.11");
                assert_eq!(spec.cite, vec!["C121"]);
            }
            _ => panic!("Expected contract lock"),
        }
    }
}
