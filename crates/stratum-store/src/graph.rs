//! Provenance graph
//!
//! Typed edges between constraints, fits and contracts. SUPERSEDES edges must
//! form a forest of chains; SUPPORTS and REFERENCES edges are unrestricted.

use crate::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use stratum_domain::{ConstraintId, Edge, EdgeKind, NodeRef};

/// Serialized form of the graph: the edge list in insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeList(pub Vec<Edge>);

/// Directed provenance graph with adjacency indexes
#[derive(Debug, Clone, Default)]
pub struct ProvenanceGraph {
    edges: Vec<Edge>,
    present: HashSet<Edge>,
    outgoing: HashMap<NodeRef, Vec<usize>>,
    incoming: HashMap<NodeRef, Vec<usize>>,
}

impl ProvenanceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no edges
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whether an identical edge exists
    pub fn contains(&self, edge: &Edge) -> bool {
        self.present.contains(edge)
    }

    /// Add an edge
    ///
    /// Inserting an edge that already exists is a no-op. A SUPERSEDES edge
    /// must join two constraints, keep at most one outgoing and one incoming
    /// SUPERSEDES edge per node, and leave the graph acyclic; otherwise it is
    /// rolled back.
    pub fn add_edge(
        &mut self,
        source: impl Into<NodeRef>,
        target: impl Into<NodeRef>,
        kind: EdgeKind,
    ) -> Result<(), GraphError> {
        let edge = Edge::new(source, target, kind);
        if self.present.contains(&edge) {
            return Ok(());
        }

        if kind == EdgeKind::Supersedes {
            self.check_supersedes(&edge)?;
        }

        self.push(edge.clone());

        if kind == EdgeKind::Supersedes && self.detect_cycle() {
            self.pop();
            return Err(GraphError::SupersessionCycle {
                source_node: edge.source,
                target: edge.target,
                reason: "edge would close a cycle".to_string(),
            });
        }

        Ok(())
    }

    fn check_supersedes(&self, edge: &Edge) -> Result<(), GraphError> {
        let violation = |reason: &str| GraphError::SupersessionCycle {
            source_node: edge.source.clone(),
            target: edge.target.clone(),
            reason: reason.to_string(),
        };

        if edge.source.as_constraint().is_none() || edge.target.as_constraint().is_none() {
            return Err(violation("both endpoints must be constraints"));
        }
        if edge.source == edge.target {
            return Err(violation("a version cannot supersede itself"));
        }
        if self.supersedes_node(&edge.source).is_some() {
            return Err(violation("successor already supersedes another version"));
        }
        if self.superseded_by_node(&edge.target).is_some() {
            return Err(violation("predecessor is already superseded"));
        }
        Ok(())
    }

    fn push(&mut self, edge: Edge) {
        let index = self.edges.len();
        self.outgoing.entry(edge.source.clone()).or_default().push(index);
        self.incoming.entry(edge.target.clone()).or_default().push(index);
        self.present.insert(edge.clone());
        self.edges.push(edge);
    }

    fn pop(&mut self) {
        if let Some(edge) = self.edges.pop() {
            let index = self.edges.len();
            for (map, node) in [
                (&mut self.outgoing, &edge.source),
                (&mut self.incoming, &edge.target),
            ] {
                if let Some(list) = map.get_mut(node) {
                    list.retain(|&i| i != index);
                    if list.is_empty() {
                        map.remove(node);
                    }
                }
            }
            self.present.remove(&edge);
        }
    }

    /// Edges leaving a node
    pub fn edges_from(&self, node: &NodeRef) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    /// Edges entering a node
    pub fn edges_to(&self, node: &NodeRef) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    fn supersedes_node(&self, node: &NodeRef) -> Option<&NodeRef> {
        self.edges_from(node)
            .find(|e| e.kind == EdgeKind::Supersedes)
            .map(|e| &e.target)
    }

    fn superseded_by_node(&self, node: &NodeRef) -> Option<&NodeRef> {
        self.edges_to(node)
            .find(|e| e.kind == EdgeKind::Supersedes)
            .map(|e| &e.source)
    }

    /// Predecessor of a constraint version
    pub fn supersedes(&self, id: &ConstraintId) -> Option<&ConstraintId> {
        self.supersedes_node(&NodeRef::Constraint(id.clone()))
            .and_then(NodeRef::as_constraint)
    }

    /// Successor of a constraint version
    pub fn superseded_by(&self, id: &ConstraintId) -> Option<&ConstraintId> {
        self.superseded_by_node(&NodeRef::Constraint(id.clone()))
            .and_then(NodeRef::as_constraint)
    }

    /// Everything a node transitively depends on (follows outgoing edges)
    pub fn ancestors(&self, node: &NodeRef) -> BTreeSet<NodeRef> {
        self.closure(node, |n| self.edges_from(n).map(|e| &e.target).collect())
    }

    /// Everything that transitively depends on a node (follows incoming edges)
    pub fn descendants(&self, node: &NodeRef) -> BTreeSet<NodeRef> {
        self.closure(node, |n| self.edges_to(n).map(|e| &e.source).collect())
    }

    fn closure<'a, F>(&'a self, start: &NodeRef, next: F) -> BTreeSet<NodeRef>
    where
        F: Fn(&NodeRef) -> Vec<&'a NodeRef>,
    {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start.clone()]);
        while let Some(node) = queue.pop_front() {
            for neighbor in next(&node) {
                if neighbor != start && seen.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
        }
        seen
    }

    /// Whether the SUPERSEDES edges contain a cycle
    pub fn detect_cycle(&self) -> bool {
        // Each node has at most one outgoing SUPERSEDES edge, so walking the
        // chain from every node either terminates or revisits a node.
        let mut finished: HashSet<&NodeRef> = HashSet::new();
        for start in self.outgoing.keys() {
            if finished.contains(start) {
                continue;
            }
            let mut path: HashSet<&NodeRef> = HashSet::new();
            let mut current = start;
            loop {
                if finished.contains(current) {
                    break;
                }
                if !path.insert(current) {
                    return true;
                }
                match self.supersedes_node(current) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            finished.extend(path);
        }
        false
    }
}

impl PartialEq for ProvenanceGraph {
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges
    }
}

impl From<EdgeList> for ProvenanceGraph {
    fn from(list: EdgeList) -> Self {
        let mut graph = Self::new();
        for edge in list.0 {
            if !graph.present.contains(&edge) {
                graph.push(edge);
            }
        }
        graph
    }
}

impl From<ProvenanceGraph> for EdgeList {
    fn from(graph: ProvenanceGraph) -> Self {
        EdgeList(graph.edges)
    }
}

impl Serialize for ProvenanceGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.edges.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProvenanceGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        EdgeList::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{ContractKey, FitId};

    fn id(s: &str) -> ConstraintId {
        ConstraintId::parse(s).unwrap()
    }

    #[test]
    fn test_chain_navigation() {
        let mut graph = ProvenanceGraph::new();
        graph.add_edge(id("C498.a"), id("C498"), EdgeKind::Supersedes).unwrap();
        graph.add_edge(id("C498.b"), id("C498.a"), EdgeKind::Supersedes).unwrap();

        assert_eq!(graph.supersedes(&id("C498.b")), Some(&id("C498.a")));
        assert_eq!(graph.superseded_by(&id("C498")), Some(&id("C498.a")));
        assert_eq!(graph.superseded_by(&id("C498.b")), None);

        let ancestors = graph.ancestors(&id("C498.b").into());
        assert_eq!(ancestors.len(), 2);
        assert!(ancestors.contains(&NodeRef::from(id("C498"))));

        let descendants = graph.descendants(&id("C498").into());
        assert_eq!(descendants.len(), 2);
        assert!(!graph.detect_cycle());
    }

    #[test]
    fn test_cycle_rolled_back() {
        let mut graph = ProvenanceGraph::new();
        graph.add_edge(id("C2"), id("C1"), EdgeKind::Supersedes).unwrap();
        graph.add_edge(id("C3"), id("C2"), EdgeKind::Supersedes).unwrap();

        let err = graph
            .add_edge(id("C1"), id("C3"), EdgeKind::Supersedes)
            .unwrap_err();
        assert!(matches!(err, GraphError::SupersessionCycle { .. }));
        assert_eq!(graph.len(), 2);
        assert!(!graph.detect_cycle());
    }

    #[test]
    fn test_forest_shape_enforced() {
        let mut graph = ProvenanceGraph::new();
        graph.add_edge(id("C5.a"), id("C5"), EdgeKind::Supersedes).unwrap();

        // Second successor for the same predecessor
        assert!(graph.add_edge(id("C5.b"), id("C5"), EdgeKind::Supersedes).is_err());
        // Second predecessor for the same successor
        assert!(graph.add_edge(id("C5.a"), id("C6"), EdgeKind::Supersedes).is_err());
        // Self edge
        assert!(graph.add_edge(id("C7"), id("C7"), EdgeKind::Supersedes).is_err());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_fits_cannot_supersede() {
        let mut graph = ProvenanceGraph::new();
        let fit = FitId::new("F-A-001").unwrap();
        assert!(graph
            .add_edge(fit.clone(), id("C1"), EdgeKind::Supersedes)
            .is_err());
        assert!(graph.add_edge(fit, id("C1"), EdgeKind::Supports).is_ok());
    }

    #[test]
    fn test_supports_and_references_may_cycle() {
        let mut graph = ProvenanceGraph::new();
        let contract = ContractKey::new("BCSC", "1");
        graph.add_edge(contract.clone(), id("C1"), EdgeKind::References).unwrap();
        graph.add_edge(id("C1"), contract, EdgeKind::References).unwrap();
        assert!(!graph.detect_cycle());
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let mut graph = ProvenanceGraph::new();
        graph.add_edge(id("C2"), id("C1"), EdgeKind::Supersedes).unwrap();
        graph.add_edge(id("C2"), id("C1"), EdgeKind::Supersedes).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_serde_rebuilds_indexes() {
        let mut graph = ProvenanceGraph::new();
        graph.add_edge(id("C2"), id("C1"), EdgeKind::Supersedes).unwrap();
        graph
            .add_edge(FitId::new("F-B-002").unwrap(), id("C2"), EdgeKind::Supports)
            .unwrap();

        let json = serde_json::to_string(&graph).unwrap();
        let restored: ProvenanceGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, graph);
        assert_eq!(restored.supersedes(&id("C2")), Some(&id("C1")));
        assert_eq!(restored.edges_to(&id("C2").into()).count(), 1);
    }
}
