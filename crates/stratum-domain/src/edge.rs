//! Edge module (provenance links between records)

use crate::constraint::ConstraintId;
use crate::contract::ContractKey;
use crate::fit::FitId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of provenance edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Newer constraint version replaces an older one
    Supersedes,

    /// A fit supports a constraint
    Supports,

    /// A contract (or any node) references a record
    References,
}

impl EdgeKind {
    /// Get edge kind as string
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Supersedes => "SUPERSEDES",
            EdgeKind::Supports => "SUPPORTS",
            EdgeKind::References => "REFERENCES",
        }
    }
}

/// A node of the provenance graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    /// A constraint version
    Constraint(ConstraintId),

    /// A fit
    Fit(FitId),

    /// A contract
    Contract(ContractKey),
}

impl NodeRef {
    /// Constraint id, if this node is a constraint
    pub fn as_constraint(&self) -> Option<&ConstraintId> {
        match self {
            NodeRef::Constraint(id) => Some(id),
            _ => None,
        }
    }

    /// Fit id, if this node is a fit
    pub fn as_fit(&self) -> Option<&FitId> {
        match self {
            NodeRef::Fit(id) => Some(id),
            _ => None,
        }
    }
}

impl From<ConstraintId> for NodeRef {
    fn from(id: ConstraintId) -> Self {
        NodeRef::Constraint(id)
    }
}

impl From<FitId> for NodeRef {
    fn from(id: FitId) -> Self {
        NodeRef::Fit(id)
    }
}

impl From<ContractKey> for NodeRef {
    fn from(key: ContractKey) -> Self {
        NodeRef::Contract(key)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Constraint(id) => write!(f, "{}", id),
            NodeRef::Fit(id) => write!(f, "{}", id),
            NodeRef::Contract(key) => write!(f, "{}", key),
        }
    }
}

/// A directed provenance edge
///
/// Direction reads "source depends on target": `C498.a SUPERSEDES C498`,
/// `F-A-001 SUPPORTS C12`, `BCSC v1 REFERENCES C12`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node
    pub source: NodeRef,

    /// Target node
    pub target: NodeRef,

    /// Edge kind
    pub kind: EdgeKind,
}

impl Edge {
    /// Create a new edge
    pub fn new(source: impl Into<NodeRef>, target: impl Into<NodeRef>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.kind.as_str(), self.target)
    }
}
