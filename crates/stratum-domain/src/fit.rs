//! Fit module - non-binding explanatory models

use crate::constraint::ConstraintId;
use crate::scope::Scope;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fit identifier (e.g., `F-AZC-016`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FitId(String);

impl FitId {
    /// Create a fit id
    ///
    /// # Errors
    /// Returns error if the id is empty or contains whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return Err("Fit id cannot be empty".to_string());
        }
        if value.chars().any(char::is_whitespace) {
            return Err(format!("Fit id '{}' contains whitespace", value));
        }
        Ok(Self(value.to_string()))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FitId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FitId> for String {
    fn from(id: FitId) -> Self {
        id.0
    }
}

/// Outcome label of a fit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FitResult {
    /// Model explains the data
    Success,
    /// Model explains part of the data
    Partial,
    /// No signal
    Null,
    /// Signal against the model
    Negative,
    /// Model refuted
    Falsified,
    /// Undecided
    Inconclusive,
    /// Any other label used by the source tables
    Other(String),
}

impl FitResult {
    /// Parse a result label (case-insensitive); unknown labels are kept verbatim
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => FitResult::Success,
            "PARTIAL" => FitResult::Partial,
            "NULL" => FitResult::Null,
            "NEGATIVE" => FitResult::Negative,
            "FALSIFIED" => FitResult::Falsified,
            "INCONCLUSIVE" => FitResult::Inconclusive,
            _ => FitResult::Other(s.to_string()),
        }
    }

    /// Label as written in the fit table
    pub fn as_str(&self) -> &str {
        match self {
            FitResult::Success => "SUCCESS",
            FitResult::Partial => "PARTIAL",
            FitResult::Null => "NULL",
            FitResult::Negative => "NEGATIVE",
            FitResult::Falsified => "FALSIFIED",
            FitResult::Inconclusive => "INCONCLUSIVE",
            FitResult::Other(label) => label,
        }
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for FitResult {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self::parse(&value))
    }
}

impl From<FitResult> for String {
    fn from(result: FitResult) -> Self {
        result.as_str().to_string()
    }
}

/// A registered fit (node attributes only)
///
/// Fits are read-only context. They never supersede anything and never change
/// a constraint's tier. The constraints a fit supports are edges in the
/// provenance graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fit {
    /// Unique identifier
    pub id: FitId,

    /// Description of the model
    pub statement: String,

    /// Confidence label on the tier scale (non-binding)
    pub tier: Tier,

    /// Scope
    pub scope: Scope,

    /// Outcome
    pub result: FitResult,

    /// Source file the fit was recorded in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// A fit as submitted for registration, with the constraints it supports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSubmission {
    /// Fit attributes
    #[serde(flatten)]
    pub fit: Fit,

    /// Supported constraint ids
    #[serde(default)]
    pub supports: Vec<ConstraintId>,
}

impl FitSubmission {
    /// Create a submission
    pub fn new(fit: Fit, supports: Vec<ConstraintId>) -> Self {
        Self { fit, supports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_id_validation() {
        assert!(FitId::new("F-AZC-016").is_ok());
        assert!(FitId::new("  ").is_err());
        assert!(FitId::new("F AZC").is_err());
    }

    #[test]
    fn test_result_labels() {
        assert_eq!(FitResult::parse("success"), FitResult::Success);
        assert_eq!(FitResult::parse("INCONCLUSIVE"), FitResult::Inconclusive);
        assert_eq!(
            FitResult::parse("MIXED"),
            FitResult::Other("MIXED".to_string())
        );
        assert_eq!(FitResult::parse("MIXED").as_str(), "MIXED");
    }

    #[test]
    fn test_submission_json_is_flat() {
        let json = r#"{
            "id": "F-A-001",
            "statement": "positional model",
            "tier": 3,
            "scope": "A",
            "result": "PARTIAL",
            "supports": ["C12", "C13.a"]
        }"#;
        let submission: FitSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.fit.id.as_str(), "F-A-001");
        assert_eq!(submission.fit.result, FitResult::Partial);
        assert_eq!(submission.supports.len(), 2);
        assert!(submission.fit.file.is_none());
    }
}
