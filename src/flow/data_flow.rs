//! Textual data-flow summaries for declared variables.
//!
//! A variable flows to every place its name is read in a recognizable
//! shape: passed as an argument, stored into an attribute, returned, or
//! assigned to another name. Scope is the declaring file for file-level
//! variables and the declaring function for locals; no aliasing is tracked.

use serde::{Deserialize, Serialize};

use crate::analysis::{Access, FileInfo, FunctionInfo, UsageShape, VariableInfo};
use crate::graph::{CodeGraph, Location};

/// How a value leaves its variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Parameter,
    Attribute,
    Return,
    Reassignment,
}

impl FlowKind {
    fn from_shape(shape: UsageShape) -> Option<Self> {
        match shape {
            UsageShape::Argument => Some(FlowKind::Parameter),
            UsageShape::Attribute => Some(FlowKind::Attribute),
            UsageShape::Return => Some(FlowKind::Return),
            UsageShape::Assignment => Some(FlowKind::Reassignment),
            UsageShape::Plain => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTarget {
    pub kind: FlowKind,
    pub location: Location,
    /// Function containing the read.
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFlow {
    pub variable: String,
    /// Graph node of the declaration, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub defined: Location,
    pub flows_to: Vec<FlowTarget>,
    /// Functions passing the variable as a call argument.
    pub transformed_by: Vec<String>,
}

fn shadows(function: &FunctionInfo, name: &str) -> bool {
    function.locals.iter().any(|l| l.name == name)
        || function.parameters.iter().any(|p| p.name == name)
}

fn passes_as_argument(function: &FunctionInfo, name: &str) -> bool {
    function.calls.iter().any(|call| {
        call.arguments.iter().any(|argument| {
            argument
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|token| token == name)
        })
    })
}

fn flows_in(path: &str, function: &FunctionInfo, name: &str, after: usize) -> Vec<FlowTarget> {
    function
        .variable_usages
        .iter()
        .filter(|u| u.name == name && u.access == Access::Read && u.line >= after)
        .filter_map(|u| {
            FlowKind::from_shape(u.shape).map(|kind| FlowTarget {
                kind,
                location: Location::line(path, u.line),
                function: function.name.clone(),
            })
        })
        .collect()
}

fn flow_for<'f>(
    graph: Option<&CodeGraph>,
    path: &str,
    variable: &VariableInfo,
    scope: impl Iterator<Item = &'f FunctionInfo>,
) -> DataFlow {
    let mut flows_to = Vec::new();
    let mut transformed_by: Vec<String> = Vec::new();

    for function in scope {
        flows_to.extend(flows_in(path, function, &variable.name, variable.line));
        if passes_as_argument(function, &variable.name) && !transformed_by.contains(&function.name) {
            transformed_by.push(function.name.clone());
        }
    }

    let id = format!("L7:{}:{}:{}", path, variable.line, variable.name);
    DataFlow {
        variable: variable.name.clone(),
        node: graph.filter(|g| g.contains_node(&id)).map(|_| id),
        defined: Location::line(path, variable.line),
        flows_to,
        transformed_by,
    }
}

/// Data-flow summaries for every file-level and local variable, ordered by
/// file, then declaration line.
pub fn data_flows(graph: Option<&CodeGraph>, files: &[FileInfo]) -> Vec<DataFlow> {
    let mut flows = Vec::new();

    for file in files {
        let path = file.path.as_str();
        for variable in &file.variables {
            let scope = file
                .callables()
                .filter(|f| !shadows(f, &variable.name));
            let mut flow = flow_for(graph, path, variable, scope);
            // File-level values may be read above their declaration.
            if flow.flows_to.is_empty() {
                flow.flows_to = file
                    .callables()
                    .filter(|f| !shadows(f, &variable.name))
                    .flat_map(|f| flows_in(path, f, &variable.name, 0))
                    .collect();
            }
            flows.push(flow);
        }
        for function in file.callables() {
            for local in &function.locals {
                flows.push(flow_for(graph, path, local, std::iter::once(function)));
            }
        }
    }

    flows.sort_by(|a, b| {
        (&a.defined.file, a.defined.line, &a.variable).cmp(&(
            &b.defined.file,
            b.defined.line,
            &b.variable,
        ))
    });
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::graph::GraphBuilder;

    const SOURCE: &str = r#"const LIMIT = 10;

export function clamp(value) {
  const bounded = Math.min(value, LIMIT);
  return bounded;
}

function other(LIMIT) {
  return LIMIT;
}
"#;

    #[test]
    fn test_flows() {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new("src/clamp.js", SOURCE))];
        let graph = GraphBuilder::new("t", &files).build();
        let flows = data_flows(Some(&graph), &files);

        let limit = flows.iter().find(|f| f.variable == "LIMIT").unwrap();
        assert_eq!(limit.node.as_deref(), Some("L7:src/clamp.js:1:LIMIT"));
        assert_eq!(limit.flows_to.len(), 1);
        assert_eq!(limit.flows_to[0].kind, FlowKind::Parameter);
        assert_eq!(limit.flows_to[0].function, "clamp");
        assert_eq!(limit.transformed_by, vec!["clamp"]);

        let bounded = flows.iter().find(|f| f.variable == "bounded").unwrap();
        assert_eq!(bounded.flows_to.len(), 1);
        assert_eq!(bounded.flows_to[0].kind, FlowKind::Return);
        assert_eq!(bounded.flows_to[0].location.line, 5);
        assert!(bounded.transformed_by.is_empty());
    }

    #[test]
    fn test_flows_are_ordered() {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new("src/clamp.js", SOURCE))];
        let flows = data_flows(None, &files);
        let lines: Vec<_> = flows.iter().map(|f| f.defined.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(flows.iter().all(|f| f.node.is_none()));
    }
}
