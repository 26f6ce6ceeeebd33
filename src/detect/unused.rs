//! Detection of unreferenced code: dead types, unused functions, variables
//! and imports.
//!
//! References are resolved by name, so a symbol counts as used as soon as
//! any resolved edge points at it or its name appears as a value anywhere
//! in the project (a callback argument, an imported name, a type
//! annotation). Conventional entry points are never reported.

use std::collections::{HashMap, HashSet};

use crate::analysis::{Access, FileInfo, FunctionInfo, Layer, Visibility};
use crate::graph::{CodeGraph, CodeNode, EdgeIndex, EdgeKind, Level, Location, NodeType};

use super::{CodeIssue, IssueType};

/// Decorator/attribute fragments that mark framework-invoked callables.
const ENTRY_DECORATORS: &[&str] = &[
    "route", "get", "post", "put", "delete", "patch", "app.", "router.", "command", "task",
    "handler", "listener", "subscribe", "fixture", "test", "main", "property", "setter",
    "getter", "api_view", "on_event", "bench",
];

/// Names referenced as values anywhere in the project.
struct References<'f> {
    names: HashSet<&'f str>,
    functions: HashMap<(&'f str, usize, &'f str), &'f FunctionInfo>,
    layers: HashMap<&'f str, Layer>,
}

fn identifiers(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
}

impl<'f> References<'f> {
    fn collect(files: &'f [FileInfo]) -> Self {
        let mut names = HashSet::new();
        let mut functions = HashMap::new();
        let mut layers = HashMap::new();

        for file in files {
            layers.insert(file.path.as_str(), file.layer);
            for import in &file.imports {
                for item in &import.items {
                    names.insert(item.name.as_str());
                }
            }
            for variable in &file.variables {
                if let Some(data_type) = &variable.data_type {
                    names.extend(identifiers(data_type));
                }
            }
            for class in &file.classes {
                for attribute in &class.attributes {
                    if let Some(data_type) = &attribute.data_type {
                        names.extend(identifiers(data_type));
                    }
                }
                if let Some(base) = &class.extends {
                    names.extend(identifiers(base));
                }
                for interface in &class.implements {
                    names.extend(identifiers(interface));
                }
            }
            for function in file.callables() {
                functions.insert(
                    (file.path.as_str(), function.line, function.name.as_str()),
                    function,
                );
                for param in &function.parameters {
                    if let Some(data_type) = &param.data_type {
                        names.extend(identifiers(data_type));
                    }
                }
                for call in &function.calls {
                    for argument in &call.arguments {
                        names.extend(identifiers(argument));
                    }
                }
                for usage in &function.variable_usages {
                    if usage.access == Access::Read {
                        names.insert(usage.name.as_str());
                    }
                }
                for handler in &function.handlers {
                    names.insert(handler.handler.as_str());
                }
                for local in &function.locals {
                    if let Some(value) = &local.value {
                        names.extend(identifiers(value));
                    }
                }
            }
            for variable in &file.variables {
                if let Some(value) = &variable.value {
                    names.extend(identifiers(value));
                }
            }
        }

        Self {
            names,
            functions,
            layers,
        }
    }

    fn function_of(&self, node: &CodeNode) -> Option<&'f FunctionInfo> {
        self.functions
            .get(&(node.location.file.as_str(), node.location.line, node.name.as_str()))
            .copied()
    }

    fn is_test_file(&self, path: &str) -> bool {
        self.layers.get(path) == Some(&Layer::Test)
    }
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Whether a callable is invoked by convention rather than by name.
fn is_entry_point(
    graph: &CodeGraph,
    index: &EdgeIndex<'_>,
    refs: &References<'_>,
    node: &CodeNode,
) -> bool {
    if node.has_modifier("exported")
        || node.has_modifier("trait_impl")
        || node.has_modifier("abstract")
        || node.name == "main"
        || node.name.starts_with("test")
        || is_dunder(&node.name)
        || refs.is_test_file(&node.location.file)
    {
        return true;
    }
    if matches!(
        node.node_type,
        NodeType::Constructor | NodeType::Handler | NodeType::Closure
    ) {
        return true;
    }
    if index.has_outgoing(&node.id, &[EdgeKind::Overrides, EdgeKind::Decorates]) {
        return true;
    }

    if let Some(owner) = node.parent.as_deref().and_then(|p| graph.node(p)) {
        if matches!(owner.node_type, NodeType::Interface | NodeType::Trait) {
            return true;
        }
        // Public API of an exported type.
        if owner.node_type.is_type()
            && owner.has_modifier("exported")
            && node.visibility == Visibility::Public
        {
            return true;
        }
    }

    refs.function_of(node)
        .map(|f| {
            f.decorators.iter().any(|d| {
                let d = d.to_lowercase();
                ENTRY_DECORATORS.iter().any(|marker| d.contains(marker))
            })
        })
        .unwrap_or(false)
}

/// Functions and methods that nothing calls.
pub fn detect_unused_functions(graph: &CodeGraph, files: &[FileInfo]) -> Vec<CodeIssue> {
    let refs = References::collect(files);
    let index = EdgeIndex::new(graph);
    let mut issues = Vec::new();

    for node in graph
        .nodes
        .iter()
        .filter(|n| matches!(n.node_type, NodeType::Function | NodeType::Method))
    {
        if index.has_incoming(
            &node.id,
            &[
                EdgeKind::Calls,
                EdgeKind::Awaits,
                EdgeKind::Overrides,
                EdgeKind::Emits,
                EdgeKind::Exports,
            ],
        ) || refs.names.contains(node.name.as_str())
            || is_entry_point(graph, &index, &refs, node)
        {
            continue;
        }

        issues.push(
            CodeIssue::new(
                IssueType::UnusedFunction,
                node.location.clone(),
                &node.name,
                format!("{} '{}' is never called", node.node_type, node.name),
            )
            .with_node(&node.id)
            .with_suggestion("Remove it or export it if it is part of the public API"),
        );
    }

    issues
}

/// Types with no incoming references that are not exported.
pub fn detect_dead_code(graph: &CodeGraph, files: &[FileInfo]) -> Vec<CodeIssue> {
    let refs = References::collect(files);
    let index = EdgeIndex::new(graph);
    let mut issues = Vec::new();

    for node in graph.nodes_at(Level::Type) {
        if node.has_modifier("exported")
            || refs.names.contains(node.name.as_str())
            || refs.is_test_file(&node.location.file)
        {
            continue;
        }
        let referenced = index.incoming(&node.id).iter().any(|e| e.source != node.id);
        if referenced {
            continue;
        }

        // Members reached from outside keep the type alive.
        let member_used = graph.children_of(node).any(|member| {
            index.incoming(&member.id).iter().any(|e| {
                graph
                    .ancestor_at(&e.source, Level::Type)
                    .map(|owner| owner.id != node.id)
                    .unwrap_or(true)
            })
        });
        if member_used {
            continue;
        }

        issues.push(
            CodeIssue::new(
                IssueType::DeadCode,
                node.location.clone(),
                &node.name,
                format!("{} '{}' is never referenced", node.node_type, node.name),
            )
            .with_node(&node.id)
            .with_suggestion("Delete the type if it is no longer needed"),
        );
    }

    issues
}

/// Local and file-level variables that are never read.
pub fn detect_unused_variables(graph: &CodeGraph, files: &[FileInfo]) -> Vec<CodeIssue> {
    let refs = References::collect(files);
    let index = EdgeIndex::new(graph);
    let mut issues = Vec::new();

    for node in graph
        .nodes
        .iter()
        .filter(|n| matches!(n.node_type, NodeType::Variable | NodeType::Constant))
    {
        if node.name.starts_with('_')
            || node.has_modifier("exported")
            || index.has_incoming(&node.id, &[EdgeKind::Reads, EdgeKind::Exports])
        {
            continue;
        }

        let owner = graph.ancestor_at(&node.id, Level::Function);
        let used = match owner {
            // Locals: receivers and argument tokens of the owning function.
            Some(function) => refs
                .function_of(function)
                .map(|f| {
                    f.calls.iter().any(|c| {
                        c.receiver
                            .as_deref()
                            .map(|r| identifiers(r).next() == Some(node.name.as_str()))
                            .unwrap_or(false)
                            || c.arguments
                                .iter()
                                .any(|a| identifiers(a).any(|t| t == node.name))
                    }) || f
                        .attribute_accesses
                        .iter()
                        .any(|a| identifiers(&a.receiver).next() == Some(node.name.as_str()))
                })
                .unwrap_or(true),
            None => refs.names.contains(node.name.as_str()),
        };
        if used {
            continue;
        }

        issues.push(
            CodeIssue::new(
                IssueType::UnusedVariable,
                node.location.clone(),
                &node.name,
                format!("{} '{}' is assigned but never read", node.node_type, node.name),
            )
            .with_node(&node.id)
            .with_suggestion("Remove the variable or prefix it with an underscore"),
        );
    }

    issues
}

/// Imported names never referenced outside import statements.
pub fn detect_unused_imports(files: &[FileInfo]) -> Vec<CodeIssue> {
    let mut issues = Vec::new();

    for file in files {
        // Package initializers import to re-export.
        if file.path.ends_with("__init__.py") {
            continue;
        }
        for import in &file.imports {
            for item in import.items.iter().filter(|i| !i.referenced && i.name != "*") {
                let name = item.local_name();
                issues.push(
                    CodeIssue::new(
                        IssueType::UnusedImport,
                        Location::line(&file.path, import.line),
                        name,
                        format!("'{}' imported from '{}' is never used", name, import.module),
                    )
                    .with_node(&format!("L3:{}", file.path))
                    .with_suggestion("Remove the unused import"),
                );
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::graph::GraphBuilder;

    fn parse(files: &[(&str, &str)]) -> Vec<FileInfo> {
        let registry = ParserRegistry::new();
        files
            .iter()
            .map(|(p, c)| registry.parse(&SourceFile::new(*p, *c)))
            .collect()
    }

    const PY: &str = r#"import os
from typing import List


def used():
    return 1


def orphan():
    value = used()
    scratch = 2
    return value


def main():
    return used()
"#;

    #[test]
    fn test_unused_function() {
        let files = parse(&[("app/tool.py", PY)]);
        let graph = GraphBuilder::new("t", &files).build();

        let issues = detect_unused_functions(&graph, &files);
        let names: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(names, vec!["function 'orphan' is never called"]);
    }

    #[test]
    fn test_unused_variable() {
        let files = parse(&[("app/tool.py", PY)]);
        let graph = GraphBuilder::new("t", &files).build();

        let issues = detect_unused_variables(&graph, &files);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'scratch'"));
        assert_eq!(issues[0].severity, super::super::Severity::Info);
    }

    #[test]
    fn test_unused_imports() {
        let files = parse(&[("app/tool.py", PY)]);
        let issues = detect_unused_imports(&files);
        let names: Vec<_> = issues.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            names,
            vec!["unused_import:app/tool.py:1:os", "unused_import:app/tool.py:2:List"]
        );
    }

    #[test]
    fn test_dead_code() {
        let files = parse(&[(
            "src/shapes.ts",
            r#"class Orphan {
  area() {
    return 0;
  }
}

class Circle {
  area() {
    return 3;
  }
}

export function build() {
  return new Circle();
}
"#,
        )]);
        let graph = GraphBuilder::new("t", &files).build();

        let issues = detect_dead_code(&graph, &files);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "class 'Orphan' is never referenced");
    }

    #[test]
    fn test_entry_points_not_reported() {
        let files = parse(&[(
            "src/lib.rs",
            r#"struct Meters(f64);

impl std::fmt::Display for Meters {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}

#[test]
fn checks_display() {
    let m = Meters(1.0);
    assert_eq!(m.to_string(), "1m");
}
"#,
        )]);
        let graph = GraphBuilder::new("t", &files).build();
        assert!(detect_unused_functions(&graph, &files).is_empty());
    }
}
