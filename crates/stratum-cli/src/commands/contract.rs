//! Contract command implementation.

use crate::cli::{ContractAction, ContractArgs, ContractSpecArgs};
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::Path;
use stratum_contracts::{document, SectionSpec};
use stratum_domain::{ContractKey, SectionKind};
use stratum_engine::Engine;

/// Execute a contract action.
pub fn execute_contract(args: ContractArgs, engine: &Engine, formatter: &Formatter) -> Result<()> {
    match args.action {
        ContractAction::Build(spec) => {
            let draft = build(&spec, engine)?;
            if let Some(dir) = &spec.out {
                let path = document::write_contract(dir, &draft)?;
                eprintln!("{}", formatter.info(&format!("Draft written to {}", path.display())));
            }
            println!("{}", formatter.format_contract(&draft)?);
        }
        ContractAction::Lock(spec) => {
            let draft = build(&spec, engine)?;
            let locked = engine.lock_contract(draft)?;
            let dir = spec.out.as_deref().unwrap_or(Path::new("."));
            let path = document::write_contract(dir, &locked)?;
            println!(
                "{}",
                formatter.success(&format!(
                    "Locked {} ({} reference(s)) -> {}",
                    locked.key(),
                    locked.provenance.len(),
                    path.display()
                ))
            );
        }
        ContractAction::Show { name, version } => {
            let key = ContractKey::new(name, version);
            let snapshot = engine.snapshot();
            let contract = snapshot
                .contract(&key)
                .ok_or_else(|| CliError::NotFound(format!("locked contract {}", key)))?;
            println!("{}", formatter.format_contract(contract)?);
        }
        ContractAction::List => {
            let snapshot = engine.snapshot();
            if formatter.format() == OutputFormat::Json {
                let keys: Vec<&String> = snapshot.contracts.keys().collect();
                println!("{}", serde_json::to_string_pretty(&keys)?);
            } else if snapshot.contracts.is_empty() {
                println!("{}", formatter.info("No locked contracts"));
            } else {
                for (key, contract) in &snapshot.contracts {
                    println!(
                        "{}\t{} entries\tselector: {}",
                        key,
                        contract.entry_count(),
                        contract.meta.selector
                    );
                }
            }
        }
    }
    Ok(())
}

/// Section layout for a build: tier routing, plus explicit citations.
fn sections(spec: &ContractSpecArgs) -> Vec<SectionSpec> {
    if spec.cite.is_empty() {
        return Vec::new();
    }
    let invariants = spec
        .cite
        .iter()
        .fold(SectionSpec::new(SectionKind::Invariants).with_selector("tier = 2"), |s, id| {
            s.cite(id.clone())
        });
    vec![
        SectionSpec::new(SectionKind::Guarantees).with_selector("tier = 0"),
        SectionSpec::new(SectionKind::Disallowed).with_selector("tier = 1"),
        invariants,
    ]
}

fn build(spec: &ContractSpecArgs, engine: &Engine) -> Result<stratum_domain::Contract> {
    Ok(engine.build_contract(&spec.name, &spec.version, &spec.selector, &sections(spec))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cites_land_in_invariants() {
        let spec = ContractSpecArgs {
            name: "BCSC".to_string(),
            version: "1".to_string(),
            selector: "*".to_string(),
            cite: vec!["C121".to_string()],
            out: None,
        };
        let sections = sections(&spec);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[2].kind, SectionKind::Invariants);
        assert_eq!(sections[2].cite, vec!["C121"]);
    }
}
