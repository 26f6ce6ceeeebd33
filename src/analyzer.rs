//! Derived analysis over a finished graph.

use tracing::info;

use crate::analysis::FileInfo;
use crate::detect::{CodeIssue, IssueType, Runner, Thresholds};
use crate::flow::{data_flows, CallGraph, DataFlow};
use crate::graph::CodeGraph;

/// Everything derived from one graph.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub call_graph: CallGraph,
    pub data_flows: Vec<DataFlow>,
    pub issues: Vec<CodeIssue>,
}

/// Derives the call graph, data flows and issues from a graph and the facts
/// it was built from.
#[derive(Debug, Clone, Default)]
pub struct GraphAnalyzer {
    runner: Runner,
}

impl GraphAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            runner: Runner::new(thresholds),
        }
    }

    pub fn disable(mut self, issue_types: &[IssueType]) -> Self {
        self.runner = self.runner.disable(issue_types);
        self
    }

    pub fn call_graph(&self, graph: &CodeGraph) -> CallGraph {
        CallGraph::build(graph)
    }

    pub fn data_flows(&self, graph: &CodeGraph, files: &[FileInfo]) -> Vec<DataFlow> {
        data_flows(Some(graph), files)
    }

    pub fn issues(&self, graph: &CodeGraph, files: &[FileInfo]) -> Vec<CodeIssue> {
        self.runner.run(graph, files)
    }

    pub fn analyze(&self, graph: &CodeGraph, files: &[FileInfo]) -> Analysis {
        let call_graph = self.call_graph(graph);
        let data_flows = self.data_flows(graph, files);
        let issues = self.issues(graph, files);
        info!(
            callables = call_graph.nodes.len(),
            flows = data_flows.len(),
            issues = issues.len(),
            "graph analysis complete"
        );
        Analysis {
            call_graph,
            data_flows,
            issues,
        }
    }
}
