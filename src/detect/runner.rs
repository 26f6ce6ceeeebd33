//! Detection runner that orchestrates all issue detectors.

use tracing::debug;

use crate::analysis::FileInfo;
use crate::graph::CodeGraph;

use super::{
    detect_circular_dependencies, detect_dead_code, detect_deep_nesting, detect_feature_envy,
    detect_god_classes, detect_high_complexity, detect_long_methods, detect_unused_functions,
    detect_unused_imports, detect_unused_variables, CodeIssue, IssueType, Thresholds,
};

/// Executes every issue detector against a finished graph.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    thresholds: Thresholds,
    disabled: Vec<IssueType>,
}

impl Runner {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            disabled: Vec::new(),
        }
    }

    /// Skip the given issue types.
    pub fn disable(mut self, issue_types: &[IssueType]) -> Self {
        self.disabled.extend_from_slice(issue_types);
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run all enabled detectors.
    ///
    /// Issues are ordered by location, then type, then id, with duplicate
    /// ids removed.
    pub fn run(&self, graph: &CodeGraph, files: &[FileInfo]) -> Vec<CodeIssue> {
        let t = &self.thresholds;
        let mut issues = Vec::new();

        for issue_type in IssueType::ALL {
            if self.disabled.contains(&issue_type) {
                continue;
            }
            let found = match issue_type {
                IssueType::DeadCode => detect_dead_code(graph, files),
                IssueType::UnusedFunction => detect_unused_functions(graph, files),
                IssueType::UnusedVariable => detect_unused_variables(graph, files),
                IssueType::UnusedImport => detect_unused_imports(files),
                IssueType::CircularDependency => detect_circular_dependencies(graph),
                IssueType::GodClass => detect_god_classes(graph, t),
                IssueType::LongMethod => detect_long_methods(graph, t),
                IssueType::HighComplexity => detect_high_complexity(graph, t),
                IssueType::DeepNesting => detect_deep_nesting(graph, t),
                IssueType::FeatureEnvy => detect_feature_envy(graph, t),
            };
            debug!(issue_type = %issue_type, count = found.len(), "detector finished");
            issues.extend(found);
        }

        issues.sort_by(|a, b| {
            (&a.location.file, a.location.line, a.issue_type, &a.id).cmp(&(
                &b.location.file,
                b.location.line,
                b.issue_type,
                &b.id,
            ))
        });
        issues.dedup_by(|a, b| a.id == b.id);
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::graph::GraphBuilder;

    const SOURCE: &str = r#"import os


def helper(flag):
    if flag and os.path.exists("x"):
        return 1
    return 0


def main():
    return helper(True)
"#;

    #[test]
    fn test_runner_orders_issues() {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new("tool.py", SOURCE))];
        let graph = GraphBuilder::new("t", &files).build();

        let thresholds = Thresholds {
            high_complexity: 1,
            ..Default::default()
        };
        let issues = Runner::new(thresholds.clone()).run(&graph, &files);
        let types: Vec<_> = issues.iter().map(|i| i.issue_type).collect();
        assert_eq!(types, vec![IssueType::HighComplexity]);

        let disabled = Runner::new(thresholds)
            .disable(&[IssueType::HighComplexity])
            .run(&graph, &files);
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_runner_is_deterministic() {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new("tool.py", SOURCE))];
        let graph = GraphBuilder::new("t", &files).build();
        let runner = Runner::default();
        assert_eq!(runner.run(&graph, &files), runner.run(&graph, &files));
    }
}
