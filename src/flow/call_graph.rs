//! Call graph derived from resolved `calls` edges.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::graph::{CodeGraph, EdgeKind, Location, NodeType};

/// A callable in the call graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphNode {
    /// Id of the function node in the code graph.
    pub id: String,
    pub name: String,
    pub full_path: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub location: Location,
    pub is_entry_point: bool,
    pub is_terminal: bool,
    /// Shortest distance from any entry point; `None` when unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    /// Number of distinct callees.
    pub calls: usize,
    /// Number of distinct callers.
    pub called_by: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// The call is awaited.
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraph {
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallGraphEdge>,
}

impl CallGraph {
    /// Build the call graph of every callable node.
    ///
    /// Entry points are callables nobody calls that either call something
    /// or are exported. Depth is assigned by a breadth-first traversal
    /// seeded with all entry points at once; a node keeps the depth at which
    /// it was first discovered.
    pub fn build(graph: &CodeGraph) -> Self {
        let awaited: HashSet<(&str, &str)> = graph
            .edges_of_kind(EdgeKind::Awaits)
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();

        let edges: Vec<CallGraphEdge> = graph
            .edges_of_kind(EdgeKind::Calls)
            .map(|e| CallGraphEdge {
                source: e.source.clone(),
                target: e.target.clone(),
                location: e.location.clone(),
                is_async: awaited.contains(&(e.source.as_str(), e.target.as_str())),
            })
            .collect();

        let mut callees: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut callers: HashMap<&str, usize> = HashMap::new();
        for edge in &edges {
            callees
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            *callers.entry(edge.target.as_str()).or_default() += 1;
        }

        let mut nodes: Vec<CallGraphNode> = graph
            .nodes
            .iter()
            .filter(|n| n.node_type.is_callable())
            .map(|n| {
                let calls = callees.get(n.id.as_str()).map(Vec::len).unwrap_or(0);
                let called_by = callers.get(n.id.as_str()).copied().unwrap_or(0);
                CallGraphNode {
                    id: n.id.clone(),
                    name: n.name.clone(),
                    full_path: n.full_path.clone(),
                    node_type: n.node_type,
                    location: n.location.clone(),
                    is_entry_point: called_by == 0 && (calls > 0 || n.has_modifier("exported")),
                    is_terminal: calls == 0,
                    depth: None,
                    calls,
                    called_by,
                }
            })
            .collect();

        let position: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let mut queue: VecDeque<usize> = VecDeque::new();
        for (i, node) in nodes.iter_mut().enumerate() {
            if node.is_entry_point {
                node.depth = Some(0);
                queue.push_back(i);
            }
        }
        while let Some(i) = queue.pop_front() {
            let depth = nodes[i].depth.unwrap_or(0);
            let Some(targets) = callees.get(nodes[i].id.as_str()) else {
                continue;
            };
            let targets: Vec<usize> = targets
                .iter()
                .filter_map(|t| position.get(*t).copied())
                .collect();
            for j in targets {
                if nodes[j].depth.is_none() {
                    nodes[j].depth = Some(depth + 1);
                    queue.push_back(j);
                }
            }
        }

        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&CallGraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.iter().filter(|n| n.is_entry_point)
    }

    /// Maximum depth reached from any entry point.
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().filter_map(|n| n.depth).max().unwrap_or(0)
    }
}
