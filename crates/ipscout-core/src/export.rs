//! # Graph Export
//!
//! Serializes the evidence graph to Graphviz DOT. Output is deterministic:
//! nodes in first-insertion order, edges in creation order.

use crate::graph::Graph;
use crate::ReconError;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// DOT shape and fill colour for a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStyle {
    pub shape: &'static str,
    pub color: &'static str,
}

/// Fallback for types not in the table.
pub const DEFAULT_STYLE: NodeStyle = NodeStyle {
    shape: "ellipse",
    color: "white",
};

/// Presentation lookup for a node type.
#[must_use]
pub fn style_for(kind: &str) -> NodeStyle {
    let (shape, color) = match kind {
        "ip" => ("box", "lightblue"),
        "domain" => ("ellipse", "lightgreen"),
        "hostname" => ("oval", "gold"),
        "cert_subject" => ("hexagon", "cyan"),
        "org" | "issuer_org" => ("diamond", "lightcoral"),
        "port" => ("circle", "orange"),
        "san" => ("note", "lightgray"),
        _ => return DEFAULT_STYLE,
    };
    NodeStyle { shape, color }
}

/// Escape a string for use inside a double-quoted DOT id.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the graph as a DOT document.
#[must_use]
pub fn export_dot(graph: &Graph) -> String {
    let mut dot = String::from("digraph G {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [style=filled, fontname=\"Helvetica\"];\n");

    for node in graph.nodes() {
        let style = style_for(&node.kind);
        let id = escape(&node.id);
        let _ = writeln!(
            dot,
            "  \"{id}\" [label=\"{id}\", shape={}, fillcolor=\"{}\"];",
            style.shape, style.color
        );
    }

    for edge in graph.edges() {
        let label = match &edge.timestamp {
            Some(ts) => format!("{} ({ts})", edge.label),
            None => edge.label.clone(),
        };
        let _ = writeln!(
            dot,
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            escape(&edge.source),
            escape(&edge.target),
            escape(&label)
        );
    }

    dot.push_str("}\n");
    dot
}

/// Write the DOT rendering of `graph` to `path`.
pub fn write_dot(graph: &Graph, path: &Path) -> Result<(), ReconError> {
    fs::write(path, export_dot(graph))
        .map_err(|e| ReconError::IoError(format!("cannot write {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), nodes = graph.nodes().count(), "graph exported");
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
