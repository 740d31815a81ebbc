//! Contract documents (YAML)
//!
//! Top-level keys: `meta`, `guarantees`, `invariants`, `disallowed`,
//! `provenance`. Locked documents are written once and never rewritten.

use crate::ContractError;
use std::fs;
use std::path::{Path, PathBuf};
use stratum_domain::Contract;
use tracing::debug;

/// Render a contract as YAML
pub fn to_yaml(contract: &Contract) -> Result<String, ContractError> {
    Ok(serde_yaml::to_string(contract)?)
}

/// Parse a contract from YAML
pub fn from_yaml(input: &str) -> Result<Contract, ContractError> {
    Ok(serde_yaml::from_str(input)?)
}

/// Conventional file name for a contract (`BCSC_v3.11.yaml`)
pub fn file_name(contract: &Contract) -> String {
    let version = contract.meta.version.trim_start_matches('v');
    let name: String = contract
        .meta
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_v{}.yaml", name, version)
}

/// Write a contract document into `dir`, returning its path
///
/// A locked document that already exists on disk is left untouched when its
/// content matches and refused when it differs.
pub fn write_contract(dir: &Path, contract: &Contract) -> Result<PathBuf, ContractError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(contract));

    if path.exists() {
        let existing = read_contract(&path)?;
        if existing.is_locked() {
            if &existing == contract {
                debug!(path = %path.display(), "Contract document unchanged");
                return Ok(path);
            }
            return Err(ContractError::ImmutableContractViolation(
                existing.key().to_string(),
            ));
        }
    }

    fs::write(&path, to_yaml(contract)?)?;
    debug!(path = %path.display(), "Wrote contract document");
    Ok(path)
}

/// Read a contract document
pub fn read_contract(path: &Path) -> Result<Contract, ContractError> {
    let content = fs::read_to_string(path)?;
    from_yaml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{ContractMeta, ContractStatus, SectionEntry};

    fn contract(status: ContractStatus) -> Contract {
        let mut contract = Contract::new(ContractMeta::new("BCSC", "3.11", "scope=B AND tier<=2"));
        contract.meta.status = status;
        contract.meta.governance = "derived view".to_string();
        contract.guarantees.push(SectionEntry::reference("C121"));
        contract.refresh_provenance();
        contract
    }

    #[test]
    fn test_yaml_keys() {
        let yaml = to_yaml(&contract(ContractStatus::Draft)).unwrap();
        for key in ["meta:", "guarantees:", "invariants:", "disallowed:", "provenance:"] {
            assert!(yaml.contains(key), "missing {}", key);
        }
        assert!(yaml.contains("status: DRAFT"));
        assert_eq!(from_yaml(&yaml).unwrap(), contract(ContractStatus::Draft));
    }

    #[test]
    fn test_file_name() {
        let mut c = contract(ContractStatus::Draft);
        assert_eq!(file_name(&c), "BCSC_v3.11.yaml");
        c.meta.name = "Grammar Model".to_string();
        c.meta.version = "v2".to_string();
        assert_eq!(file_name(&c), "Grammar_Model_v2.yaml");
    }

    #[test]
    fn test_locked_document_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let locked = contract(ContractStatus::Locked);
        let path = write_contract(dir.path(), &locked).unwrap();
        assert_eq!(write_contract(dir.path(), &locked).unwrap(), path);

        let mut changed = locked;
        changed.meta.governance = "edited".to_string();
        assert!(matches!(
            write_contract(dir.path(), &changed),
            Err(ContractError::ImmutableContractViolation(_))
        ));
        assert_eq!(read_contract(&path).unwrap().meta.governance, "derived view");
    }
}
