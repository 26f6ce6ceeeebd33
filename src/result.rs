//! The complete output model of one analysis run.
//!
//! Every collection is ordered and every map is a `BTreeMap`, and no
//! timestamps are recorded, so identical input serializes identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{FileInfo, Layer};
use crate::analyzer::Analysis;
use crate::detect::{CodeIssue, Severity};
use crate::flow::{CallGraph, DataFlow};
use crate::graph::{CodeEdge, CodeGraph, CodeNode};
use crate::security::SecurityReport;

/// Run metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub project: String,
    pub version: String,
    pub files: usize,
    /// Parsing stopped before every file was visited.
    pub cancelled: bool,
}

/// Aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_issues: usize,
    pub files_by_language: BTreeMap<String, usize>,
    pub nodes_by_level: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<String, usize>,
    pub issues_by_severity: BTreeMap<String, usize>,
}

impl Stats {
    fn collect(files: &[FileInfo], graph: &CodeGraph, issues: &[CodeIssue]) -> Self {
        let mut stats = Stats {
            total_files: files.len(),
            total_lines: files.iter().map(|f| f.line_count).sum(),
            total_nodes: graph.nodes.len(),
            total_edges: graph.edges.len(),
            total_issues: issues.len(),
            ..Default::default()
        };
        for file in files {
            *stats
                .files_by_language
                .entry(file.language.as_str().to_string())
                .or_default() += 1;
        }
        for node in &graph.nodes {
            *stats
                .nodes_by_level
                .entry(node.level.as_str().to_string())
                .or_default() += 1;
        }
        for edge in &graph.edges {
            *stats
                .edges_by_kind
                .entry(edge.kind.as_str().to_string())
                .or_default() += 1;
        }
        for issue in issues {
            *stats
                .issues_by_severity
                .entry(issue.severity.as_str().to_string())
                .or_default() += 1;
        }
        stats
    }
}

/// Files of one architectural layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerGroup {
    pub layer: Layer,
    pub files: Vec<String>,
}

fn group_layers(files: &[FileInfo]) -> Vec<LayerGroup> {
    let mut by_layer: BTreeMap<Layer, Vec<String>> = BTreeMap::new();
    for file in files {
        by_layer.entry(file.layer).or_default().push(file.path.clone());
    }
    by_layer
        .into_iter()
        .map(|(layer, mut files)| {
            files.sort();
            LayerGroup { layer, files }
        })
        .collect()
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub meta: Meta,
    pub stats: Stats,
    pub nodes: Vec<CodeNode>,
    pub edges: Vec<CodeEdge>,
    pub files: Vec<FileInfo>,
    pub layers: Vec<LayerGroup>,
    pub call_graph: CallGraph,
    pub data_flows: Vec<DataFlow>,
    pub issues: Vec<CodeIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityReport>,
}

impl AnalysisResult {
    pub fn new(
        project: &str,
        files: Vec<FileInfo>,
        graph: CodeGraph,
        analysis: Analysis,
        cancelled: bool,
    ) -> Self {
        let stats = Stats::collect(&files, &graph, &analysis.issues);
        Self {
            meta: Meta {
                project: project.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                files: files.len(),
                cancelled,
            },
            stats,
            layers: group_layers(&files),
            nodes: graph.nodes,
            edges: graph.edges,
            files,
            call_graph: analysis.call_graph,
            data_flows: analysis.data_flows,
            issues: analysis.issues,
            security: None,
        }
    }

    pub fn with_security(mut self, report: SecurityReport) -> Self {
        self.security = Some(report);
        self
    }

    /// Whether any issue is at least as severe as `threshold`.
    pub fn has_issue_at_least(&self, threshold: Severity) -> bool {
        self.issues.iter().any(|i| i.severity <= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::analyzer::GraphAnalyzer;
    use crate::graph::GraphBuilder;

    fn result() -> AnalysisResult {
        let registry = ParserRegistry::new();
        let files: Vec<FileInfo> = [
            SourceFile::new("src/api/routes.ts", "export function list() { return 1; }\n"),
            SourceFile::new("src/utils/format.py", "def fmt(x):\n    return x\n"),
            SourceFile::new("README.md", "# readme\n"),
        ]
        .iter()
        .map(|f| registry.parse(f))
        .collect();
        let graph = GraphBuilder::new("demo", &files).build();
        let analysis = GraphAnalyzer::default().analyze(&graph, &files);
        AnalysisResult::new("demo", files, graph, analysis, false)
    }

    #[test]
    fn test_stats() {
        let r = result();
        assert_eq!(r.meta.files, 3);
        assert_eq!(r.stats.total_files, 3);
        assert_eq!(r.stats.files_by_language.get("typescript"), Some(&1));
        assert_eq!(r.stats.files_by_language.get("python"), Some(&1));
        assert_eq!(r.stats.nodes_by_level.get("L1"), Some(&1));
        assert_eq!(r.stats.nodes_by_level.get("L3"), Some(&3));
        assert_eq!(r.stats.total_nodes, r.nodes.len());
        assert_eq!(r.stats.total_issues, r.issues.len());
    }

    #[test]
    fn test_layers_in_layer_order() {
        let r = result();
        let layers: Vec<Layer> = r.layers.iter().map(|g| g.layer).collect();
        assert_eq!(layers, vec![Layer::Api, Layer::Utility, Layer::Unknown]);
        assert_eq!(r.layers[0].files, vec!["src/api/routes.ts"]);
    }

    #[test]
    fn test_serialization_is_stable() {
        let a = serde_json::to_string(&result()).unwrap();
        let b = serde_json::to_string(&result()).unwrap();
        assert_eq!(a, b);
        let value: serde_json::Value = serde_json::from_str(&a).unwrap();
        for key in ["meta", "stats", "nodes", "edges", "files", "layers", "call_graph", "data_flows", "issues"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert!(value.get("security").is_none());
    }
}
