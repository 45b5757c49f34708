//! # Graph Engine
//!
//! The evidence graph shared by every investigative module.
//!
//! This module implements the `GraphStore` trait.
//! Node identity is the literal string a module discovered; the node type
//! is presentation metadata only. Edges are never deduplicated, never
//! removed, and may form cycles or self-loops.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// The GraphStore trait defines the graph operations modules rely on.
///
/// Backends must be permissive: `add_edge` on an unknown endpoint creates
/// that endpoint with an empty type.
pub trait GraphStore {
    /// Insert a node, or overwrite the type of an existing node.
    /// Last write wins.
    fn add_node(&mut self, id: &str, kind: &str);

    /// Append a directed edge. Parallel edges are kept.
    fn add_edge(&mut self, source: &str, target: &str, label: &str, timestamp: Option<&str>);

    /// Lookup a node by id.
    fn node(&self, id: &str) -> Option<&GraphNode>;

    /// Get all outgoing edges of a node, in creation order.
    fn out_edges(&self, id: &str) -> Vec<&GraphEdge>;

    /// Get the total number of nodes.
    fn node_count(&self) -> usize;

    /// Get the total number of edges.
    fn edge_count(&self) -> usize;

    /// Check if a node exists in the graph.
    fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }
}

// =============================================================================
// NODES & EDGES
// =============================================================================

/// A node in the evidence graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// The discovered value (IP, domain, certificate CN, ...).
    pub id: String,
    /// Open-vocabulary type tag. Empty for auto-created endpoints.
    pub kind: String,
}

/// A directed, labelled, timestamped relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    pub timestamp: Option<String>,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory evidence graph.
///
/// Nodes keep their first-insertion order; `index` maps id to position.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage in insertion order.
    nodes: Vec<GraphNode>,

    /// Reverse lookup: id -> position in `nodes`.
    index: BTreeMap<String, usize>,

    /// Edge storage in creation order.
    edges: Vec<GraphEdge>,
}

/// The single process-wide graph handed to every module at construction.
///
/// Single-threaded by contract, so `Rc<RefCell<_>>` is sufficient.
pub type SharedGraph = Rc<RefCell<Graph>>;

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty graph wrapped for sharing.
    #[must_use]
    pub fn shared() -> SharedGraph {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Get all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Get all edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    /// True when no node has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the edges between two nodes, in creation order.
    pub fn edges_between<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == source && e.target == target)
    }

    /// Ensure a node exists without touching an existing type.
    fn ensure_node(&mut self, id: &str) {
        if !self.index.contains_key(id) {
            self.insert_new(id, "");
        }
    }

    fn insert_new(&mut self, id: &str, kind: &str) {
        self.index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(GraphNode {
            id: id.to_string(),
            kind: kind.to_string(),
        });
    }
}

impl GraphStore for Graph {
    fn add_node(&mut self, id: &str, kind: &str) {
        match self.index.get(id) {
            Some(&pos) => {
                if let Some(node) = self.nodes.get_mut(pos) {
                    node.kind = kind.to_string();
                }
            }
            None => self.insert_new(id, kind),
        }
    }

    fn add_edge(&mut self, source: &str, target: &str, label: &str, timestamp: Option<&str>) {
        self.ensure_node(source);
        self.ensure_node(target);
        self.edges.push(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            label: label.to_string(),
            timestamp: timestamp.map(str::to_string),
        });
    }

    fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).and_then(|&pos| self.nodes.get(pos))
    }

    fn out_edges(&self, id: &str) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.source == id).collect()
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_adding_node_overwrites_type() {
        let mut graph = Graph::new();
        graph.add_node("8.8.8.8", "ip_or_domain");
        graph.add_node("8.8.8.8", "ip");

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("8.8.8.8").map(|n| n.kind.as_str()), Some("ip"));
    }

    #[test]
    fn add_edge_autovivifies_endpoints() {
        let mut graph = Graph::new();
        graph.add_edge("a", "b", "pdns", None);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node("a").map(|n| n.kind.as_str()), Some(""));
    }

    #[test]
    fn add_edge_keeps_existing_type() {
        let mut graph = Graph::new();
        graph.add_node("example.com", "domain");
        graph.add_edge("example.com", "93.184.216.34", "A", Some("2025-01-01T00:00:00"));

        assert_eq!(
            graph.node("example.com").map(|n| n.kind.as_str()),
            Some("domain")
        );
    }

    #[test]
    fn parallel_edges_are_kept() {
        let mut graph = Graph::new();
        graph.add_edge("1.1.1.1", "one.one.one.one", "reverse_dns", None);
        graph.add_edge("1.1.1.1", "one.one.one.one", "pdns", None);
        graph.add_edge("1.1.1.1", "one.one.one.one", "pdns", None);

        let labels: Vec<_> = graph
            .edges_between("1.1.1.1", "one.one.one.one")
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, vec!["reverse_dns", "pdns", "pdns"]);
    }

    #[test]
    fn self_loops_and_cycles_allowed() {
        let mut graph = Graph::new();
        graph.add_edge("a", "a", "self", None);
        graph.add_edge("a", "b", "x", None);
        graph.add_edge("b", "a", "y", None);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.out_edges("a").len(), 2);
    }

    #[test]
    fn nodes_keep_insertion_order() {
        let mut graph = Graph::new();
        graph.add_node("z.example", "domain");
        graph.add_node("a.example", "domain");
        graph.add_node("z.example", "hostname");

        let ids: Vec<_> = graph.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["z.example", "a.example"]);
    }

    #[test]
    fn empty_graph() {
        let graph = Graph::new();
        assert!(graph.is_empty());
        assert!(!graph.contains_node("anything"));
        assert!(graph.out_edges("anything").is_empty());
    }
}
