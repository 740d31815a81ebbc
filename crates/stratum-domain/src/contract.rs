//! Contract module - named, versioned views compiled from binding constraints

use crate::scope::Scope;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Contract identity: name plus version (`BCSC v3.11`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    /// Contract name
    pub name: String,

    /// Version label
    pub version: String,
}

impl ContractKey {
    /// Create a contract key
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version.trim_start_matches('v'))
    }
}

/// Contract lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Compiled, not yet verified
    Draft,

    /// Verified and immutable
    Locked,
}

/// The named sections of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// What the contract guarantees
    Guarantees,

    /// Invariants the contract relies on
    Invariants,

    /// Interpretations the contract rules out
    Disallowed,
}

impl SectionKind {
    /// All section kinds in document order
    pub const ALL: [SectionKind; 3] = [
        SectionKind::Guarantees,
        SectionKind::Invariants,
        SectionKind::Disallowed,
    ];

    /// Section key as used in contract documents
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Guarantees => "guarantees",
            SectionKind::Invariants => "invariants",
            SectionKind::Disallowed => "disallowed",
        }
    }

    /// Parse a section key
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guarantees" | "guarantee" => Some(SectionKind::Guarantees),
            "invariants" | "invariant" => Some(SectionKind::Invariants),
            "disallowed" => Some(SectionKind::Disallowed),
            _ => None,
        }
    }
}

/// One entry of a contract section
///
/// Entries copy statement text verbatim from the referenced record; nothing is
/// authored by the compiler. An unresolved reference carries no statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    /// Referenced record id (constraint or fit)
    pub id: String,

    /// Statement copied from the referenced record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,

    /// Tier of the referenced record at compile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,

    /// Scope of the referenced record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    /// Ids justifying this entry
    pub provenance: Vec<String>,
}

impl SectionEntry {
    /// Bare reference to a record, with no copied attributes
    pub fn reference(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            provenance: vec![id.clone()],
            id,
            statement: None,
            tier: None,
            scope: None,
        }
    }
}

/// Contract metadata block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractMeta {
    /// Contract name
    pub name: String,

    /// Version label
    pub version: String,

    /// Lifecycle status
    pub status: ContractStatus,

    /// Governance disclaimer stamped by the compiler
    pub governance: String,

    /// Selector the contract was compiled from
    pub selector: String,

    /// Snapshot sequence the contract was compiled against
    pub compiled_at_sequence: u64,
}

impl ContractMeta {
    /// Draft metadata for a selector
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            status: ContractStatus::Draft,
            governance: String::new(),
            selector: selector.into(),
            compiled_at_sequence: 0,
        }
    }
}

/// A compiled contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Metadata
    pub meta: ContractMeta,

    /// Guarantee entries
    #[serde(default)]
    pub guarantees: Vec<SectionEntry>,

    /// Invariant entries
    #[serde(default)]
    pub invariants: Vec<SectionEntry>,

    /// Disallowed-interpretation entries
    #[serde(default)]
    pub disallowed: Vec<SectionEntry>,

    /// Union of every referenced id
    #[serde(default)]
    pub provenance: Vec<String>,
}

impl Contract {
    /// Empty contract with the given metadata
    pub fn new(meta: ContractMeta) -> Self {
        Self {
            meta,
            guarantees: Vec::new(),
            invariants: Vec::new(),
            disallowed: Vec::new(),
            provenance: Vec::new(),
        }
    }

    /// Identity of the contract
    pub fn key(&self) -> ContractKey {
        ContractKey::new(self.meta.name.clone(), self.meta.version.clone())
    }

    /// Whether the contract is locked
    pub fn is_locked(&self) -> bool {
        self.meta.status == ContractStatus::Locked
    }

    /// Entries of one section
    pub fn section(&self, kind: SectionKind) -> &[SectionEntry] {
        match kind {
            SectionKind::Guarantees => &self.guarantees,
            SectionKind::Invariants => &self.invariants,
            SectionKind::Disallowed => &self.disallowed,
        }
    }

    /// Mutable entries of one section
    pub fn section_mut(&mut self, kind: SectionKind) -> &mut Vec<SectionEntry> {
        match kind {
            SectionKind::Guarantees => &mut self.guarantees,
            SectionKind::Invariants => &mut self.invariants,
            SectionKind::Disallowed => &mut self.disallowed,
        }
    }

    /// Every id referenced anywhere in the contract, deduplicated and sorted
    pub fn all_references(&self) -> BTreeSet<String> {
        let mut refs: BTreeSet<String> = self.provenance.iter().cloned().collect();
        for kind in SectionKind::ALL {
            for entry in self.section(kind) {
                refs.extend(entry.provenance.iter().cloned());
            }
        }
        refs
    }

    /// Recompute the contract-level provenance list from every reference
    pub fn refresh_provenance(&mut self) {
        self.provenance = self.all_references().into_iter().collect();
    }

    /// Number of section entries
    pub fn entry_count(&self) -> usize {
        SectionKind::ALL.iter().map(|k| self.section(*k).len()).sum()
    }
}
