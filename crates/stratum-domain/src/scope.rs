//! Scope module - the subsystem a constraint applies to

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope of a constraint or fit
///
/// Scopes partition the corpus into subsystems. `Global` intersects every
/// other scope; all other scopes only intersect themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// Subsystem A
    A,

    /// Subsystem B
    B,

    /// AZC subsystem
    Azc,

    /// HT subsystem
    Ht,

    /// Applies everywhere
    Global,
}

impl Scope {
    /// All scopes
    pub const ALL: [Scope; 5] = [Scope::A, Scope::B, Scope::Azc, Scope::Ht, Scope::Global];

    /// Get scope label as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::A => "A",
            Scope::B => "B",
            Scope::Azc => "AZC",
            Scope::Ht => "HT",
            Scope::Global => "GLOBAL",
        }
    }

    /// Parse a scope label (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Scope::A),
            "B" => Some(Scope::B),
            "AZC" => Some(Scope::Azc),
            "HT" => Some(Scope::Ht),
            "GLOBAL" => Some(Scope::Global),
            _ => None,
        }
    }

    /// Whether two scopes overlap (equal, or either is global)
    pub fn intersects(&self, other: &Scope) -> bool {
        self == other || *self == Scope::Global || *other == Scope::Global
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid scope: {}", s))
    }
}

impl TryFrom<String> for Scope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("azc"), Some(Scope::Azc));
        assert_eq!(Scope::parse("GLOBAL"), Some(Scope::Global));
        assert_eq!(Scope::parse(" b "), Some(Scope::B));
        assert_eq!(Scope::parse("C"), None);
    }

    #[test]
    fn test_scope_intersection() {
        assert!(Scope::A.intersects(&Scope::A));
        assert!(!Scope::A.intersects(&Scope::B));
        assert!(Scope::Global.intersects(&Scope::Ht));
        assert!(Scope::Azc.intersects(&Scope::Global));
    }
}
