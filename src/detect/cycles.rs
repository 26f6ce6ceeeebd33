//! Detection of circular dependencies between files.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::graph::{CodeGraph, EdgeKind};

use super::{CodeIssue, IssueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Rotate a cycle so it starts at its smallest element.
fn canonicalize<'a>(cycle: &[&'a str]) -> Vec<&'a str> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

/// Find cycles with a depth-first search that colors nodes on the current
/// path gray. Every back edge closes one cycle; each distinct cycle is
/// returned once in canonical rotation.
pub fn find_cycles<'a>(adjacency: &BTreeMap<&'a str, Vec<&'a str>>) -> Vec<Vec<&'a str>> {
    let mut color: HashMap<&str, Color> = HashMap::new();
    let mut seen: BTreeSet<Vec<&str>> = BTreeSet::new();
    let mut cycles = Vec::new();

    for &start in adjacency.keys() {
        if color.get(start).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }

        let mut path: Vec<&str> = vec![start];
        let mut frames: Vec<(&str, usize)> = vec![(start, 0)];
        color.insert(start, Color::Gray);

        while let Some(&(node, idx)) = frames.last() {
            let next_nodes = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if idx >= next_nodes.len() {
                color.insert(node, Color::Black);
                path.pop();
                frames.pop();
                continue;
            }
            if let Some(frame) = frames.last_mut() {
                frame.1 += 1;
            }

            let next = next_nodes[idx];
            match color.get(next).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    if let Some(pos) = path.iter().position(|&n| n == next) {
                        let cycle = canonicalize(&path[pos..]);
                        if seen.insert(cycle.clone()) {
                            cycles.push(cycle);
                        }
                    }
                }
                Color::White => {
                    color.insert(next, Color::Gray);
                    path.push(next);
                    frames.push((next, 0));
                }
                Color::Black => {}
            }
        }
    }

    cycles
}

/// Report each unique cycle in the file-level import graph once.
pub fn detect_circular_dependencies(graph: &CodeGraph) -> Vec<CodeIssue> {
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges_of_kind(EdgeKind::Imports) {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        adjacency.entry(edge.target.as_str()).or_default();
    }
    for targets in adjacency.values_mut() {
        targets.sort_unstable();
        targets.dedup();
    }

    let mut issues = Vec::new();
    for cycle in find_cycles(&adjacency) {
        let Some(first) = cycle.first().and_then(|id| graph.node(id)) else {
            continue;
        };
        let paths: Vec<&str> = cycle
            .iter()
            .map(|id| graph.node(id).map(|n| n.location.file.as_str()).unwrap_or(id))
            .collect();
        let chain = format!("{} -> {}", paths.join(" -> "), paths[0]);

        let mut issue = CodeIssue::new(
            IssueType::CircularDependency,
            first.location.clone(),
            &paths.join(","),
            format!("circular dependency: {}", chain),
        )
        .with_node(&first.id)
        .with_suggestion("Move the shared code into a module both sides can import");
        issue.location.end_line = None;
        issue.involved = cycle.iter().map(|id| id.to_string()).collect();
        issues.push(issue);
    }

    issues
}
