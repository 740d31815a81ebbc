//! Phase manifests
//!
//! A phase arrives either as a JSON manifest (a serialized [`PhaseBatch`]) or
//! as a constraint table with an optional fit table.
//!
//! ```json
//! {
//!   "phase": "PHASE_77_LINK_DENSITY",
//!   "constraints": [
//!     {"id": "C609", "statement": "LINK density is uniform", "tier": 2, "scope": "B"}
//!   ],
//!   "fits": [
//!     {"id": "F-B-007", "statement": "gradient model", "tier": 3, "scope": "B",
//!      "result": "PARTIAL", "supports": ["C609"]}
//!   ]
//! }
//! ```

use crate::EngineError;
use std::path::Path;
use stratum_domain::PhaseBatch;
use stratum_store::tsv;

/// Parse a JSON manifest
pub fn parse_manifest(json: &str) -> Result<PhaseBatch, EngineError> {
    let batch: PhaseBatch =
        serde_json::from_str(json).map_err(|e| EngineError::Manifest(e.to_string()))?;
    if batch.phase.trim().is_empty() {
        return Err(EngineError::Manifest("phase name is empty".to_string()));
    }
    if batch.is_empty() {
        return Err(EngineError::Manifest(format!(
            "phase '{}' carries no constraints or fits",
            batch.phase
        )));
    }
    Ok(batch)
}

/// Read a JSON manifest from disk
pub fn read_manifest(path: &Path) -> Result<PhaseBatch, EngineError> {
    let json = std::fs::read_to_string(path)?;
    parse_manifest(&json)
}

/// Assemble a batch from a constraint table and an optional fit table
///
/// STATUS columns are ignored: every row is a candidate for governance.
pub fn batch_from_tables(
    phase: &str,
    constraints: &str,
    fits: Option<&str>,
) -> Result<PhaseBatch, EngineError> {
    let mut batch = PhaseBatch::new(phase);
    for row in tsv::parse_constraints(constraints)? {
        batch = batch.with_constraint(row.into_candidate());
    }
    if let Some(fits) = fits {
        for submission in tsv::parse_fits(fits)? {
            batch = batch.with_fit(submission);
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Scope, Tier};

    #[test]
    fn test_parse_manifest() {
        let batch = parse_manifest(
            r#"{
                "phase": "PHASE_77_LINK_DENSITY",
                "constraints": [
                    {"id": "C609", "statement": "LINK density is uniform", "tier": 2, "scope": "B"}
                ],
                "fits": [
                    {"id": "F-B-007", "statement": "gradient model", "tier": 3, "scope": "B",
                     "result": "PARTIAL", "supports": ["C609"]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(batch.phase, "PHASE_77_LINK_DENSITY");
        assert_eq!(batch.constraints[0].tier, Tier::Established);
        assert_eq!(batch.constraints[0].scope, Scope::B);
        assert_eq!(batch.fits[0].supports.len(), 1);
    }

    #[test]
    fn test_rejects_empty_manifests() {
        assert!(matches!(
            parse_manifest(r#"{"phase": "P1"}"#),
            Err(EngineError::Manifest(_))
        ));
        assert!(matches!(
            parse_manifest(r#"{"phase": " ", "constraints": []}"#),
            Err(EngineError::Manifest(_))
        ));
        assert!(parse_manifest("not json").is_err());
    }

    #[test]
    fn test_batch_from_tables() {
        let constraints = "NUM\tCONSTRAINT\tTIER\tSCOPE\tLOCATION\n\
                           121\tToken inventory is closed\t0\tB\tPHASE_12\n\
                           609\tLINK density is uniform\t2\tB\tPHASE_77\n";
        let fits = "ID\tFIT\tTIER\tSCOPE\tRESULT\tSUPPORTS\n\
                    F-B-007\tgradient model\t3\tB\tPARTIAL\t609\n";

        let batch = batch_from_tables("PHASE_77", constraints, Some(fits)).unwrap();
        assert_eq!(batch.constraints.len(), 2);
        assert_eq!(batch.constraints[0].id.as_str(), "C121");
        assert_eq!(batch.fits.len(), 1);
    }
}
