//! Node metrics, computed once all edges are known.

use std::collections::HashMap;

use super::types::{CodeEdge, CodeNode, NodeType};

/// Fill in `loc`, `dependencies` and `dependents` for every node.
///
/// Containment edges never count as dependencies. Files keep the line count
/// set at creation; modules and the system node sum their children.
pub fn compute(nodes: &mut [CodeNode], edges: &[CodeEdge]) {
    let mut outgoing: HashMap<&str, usize> = HashMap::new();
    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for edge in edges.iter().filter(|e| !e.kind.is_containment()) {
        *outgoing.entry(edge.source.as_str()).or_default() += 1;
        *incoming.entry(edge.target.as_str()).or_default() += 1;
    }

    let mut module_loc: HashMap<String, usize> = HashMap::new();
    for node in nodes.iter_mut() {
        node.metrics.dependencies = outgoing.get(node.id.as_str()).copied().unwrap_or(0);
        node.metrics.dependents = incoming.get(node.id.as_str()).copied().unwrap_or(0);

        match node.node_type {
            NodeType::System | NodeType::Module => {}
            NodeType::File => {
                if let Some(parent) = &node.parent {
                    *module_loc.entry(parent.clone()).or_default() += node.metrics.loc;
                }
            }
            _ => {
                node.metrics.loc = match node.location.end_line {
                    Some(end) => end.saturating_sub(node.location.line) + 1,
                    None => 1,
                };
            }
        }
    }

    let mut total = 0;
    for node in nodes.iter_mut().filter(|n| n.node_type == NodeType::Module) {
        node.metrics.loc = module_loc.get(&node.id).copied().unwrap_or(0);
        total += node.metrics.loc;
    }
    if let Some(root) = nodes.iter_mut().find(|n| n.node_type == NodeType::System) {
        root.metrics.loc = total;
    }
}
