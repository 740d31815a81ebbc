//! Interactive REPL (Read-Eval-Print Loop) mode.
//!
//! Lines are parsed with the same command set as the binary. A line that is
//! not a command is treated as a question for `ask`.

use crate::cli::{AskArgs, Command};
use crate::commands::{self, Context};
use crate::config;
use crate::error::{CliError, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::{Config as EditorConfig, DefaultEditor};
use std::path::PathBuf;

/// One REPL line parsed as a command.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, name = "")]
struct ReplLine {
    #[command(subcommand)]
    command: Command,
}

/// REPL command type.
#[derive(Debug)]
enum ReplCommand {
    Exit,
    Help,
    Command(Command),
}

/// Run the interactive REPL.
pub async fn run_repl(ctx: &Context<'_>) -> Result<()> {
    let formatter = ctx.formatter;
    println!(
        "{}",
        formatter.info("Stratum REPL - Type 'help' for commands, 'exit' to quit")
    );
    println!(
        "{}",
        formatter.info(&format!(
            "Snapshot at sequence {} ({} versions)",
            ctx.engine.snapshot().sequence,
            ctx.engine.snapshot().ledger.len()
        ))
    );
    println!();

    let editor_config = EditorConfig::builder()
        .max_history_size(ctx.config.settings.history_size)?
        .build();
    let mut editor = DefaultEditor::with_config(editor_config)?;

    let history_path = history_path()?;
    let _ = editor.load_history(&history_path);

    loop {
        match editor.readline("stratum> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                match parse_repl_command(line) {
                    Ok(ReplCommand::Exit) => {
                        println!("{}", formatter.info("Goodbye!"));
                        break;
                    }
                    Ok(ReplCommand::Help) => print_help(ctx),
                    Ok(ReplCommand::Command(Command::Repl)) => {
                        println!("{}", formatter.info("Already in REPL mode"));
                    }
                    Ok(ReplCommand::Command(cmd)) => {
                        if let Err(e) = commands::execute(cmd, ctx).await {
                            eprintln!("{}", formatter.error(&e.to_string()));
                        }
                    }
                    Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", formatter.info("Use 'exit' to quit"));
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", formatter.error(&format!("Error: {}", err)));
                break;
            }
        }
    }

    editor.save_history(&history_path).ok();
    Ok(())
}

/// Parse a REPL command line.
fn parse_repl_command(line: &str) -> Result<ReplCommand> {
    let words = split_words(line)?;
    let Some(first) = words.first() else {
        return Err(CliError::InvalidInput("Empty command".to_string()));
    };

    match first.as_str() {
        "exit" | "quit" | "q" => return Ok(ReplCommand::Exit),
        "help" | "?" => return Ok(ReplCommand::Help),
        _ => {}
    }

    if !is_command(first) {
        return Ok(ReplCommand::Command(Command::Ask(AskArgs {
            question: vec![line.to_string()],
        })));
    }

    ReplLine::try_parse_from(&words)
        .map(|parsed| ReplCommand::Command(parsed.command))
        .map_err(|e| CliError::InvalidInput(e.to_string().trim_end().to_string()))
}

fn is_command(word: &str) -> bool {
    use clap::CommandFactory;

    ReplLine::command()
        .get_subcommands()
        .any(|sub| sub.get_name() == word)
}

/// Split a line into words, honoring single and double quotes.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CliError::InvalidInput("Unterminated quote".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn history_path() -> Result<PathBuf> {
    let dir = config::home()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("history.txt"))
}

fn print_help(ctx: &Context<'_>) {
    println!("{}", ctx.formatter.info("Available commands:"));
    println!();
    println!("  import --constraints <tsv> [--fits <tsv>] [--phase <name>]");
    println!("  import --manifest <json>        - Import a research phase atomically");
    println!("  show <id>                       - Show a constraint version or fit");
    println!("  family <base>                   - Show a supersession chain");
    println!("  list [-t tier] [-s scope] [-a]  - List constraints");
    println!("  query <term> [-t tier] [-s scope]");
    println!("  ask <question>                  - Answer from cited records only");
    println!("  discard <id> [-y]               - Discard a tier-3/4 constraint");
    println!("  contract build|lock <name> <version> [-s selector] [--cite id]");
    println!("  contract show <name> <version>  - Print a locked contract");
    println!("  contract list                   - List locked contracts");
    println!("  export [-o dir]                 - Export constraint and fit tables");
    println!("  checkpoint                      - Fold the commit log into a checkpoint");
    println!("  help, ?                         - Show this help");
    println!("  exit, quit, q                   - Exit REPL");
    println!();
    println!("  Any other line is asked as a question.");
    println!();
}
