//! Detection of functions with high cyclomatic complexity or deep nesting.
//!
//! Both values come from the textual proxies recorded on function nodes:
//! complexity starts at 1 and adds one per `if`, `else if`, `for`, `while`,
//! `case`, `catch`, `&&`, `||`, `??` and `?`; nesting is the deepest bracket
//! depth inside the body.

use crate::graph::CodeGraph;

use super::{CodeIssue, IssueType, Thresholds};

pub fn detect_high_complexity(graph: &CodeGraph, thresholds: &Thresholds) -> Vec<CodeIssue> {
    let mut issues = Vec::new();

    for node in graph.nodes.iter().filter(|n| n.node_type.is_callable()) {
        let Some(complexity) = node.metrics.complexity else {
            continue;
        };
        if complexity <= thresholds.high_complexity {
            continue;
        }
        issues.push(
            CodeIssue::new(
                IssueType::HighComplexity,
                node.location.clone(),
                &node.name,
                format!(
                    "{} '{}' has complexity {}, exceeds maximum of {}",
                    node.node_type, node.name, complexity, thresholds.high_complexity
                ),
            )
            .with_node(&node.id)
            .with_suggestion("Replace branching with early returns or lookup tables"),
        );
    }

    issues
}

pub fn detect_deep_nesting(graph: &CodeGraph, thresholds: &Thresholds) -> Vec<CodeIssue> {
    let mut issues = Vec::new();

    for node in graph.nodes.iter().filter(|n| n.node_type.is_callable()) {
        let Some(depth) = node.metrics.max_nesting else {
            continue;
        };
        if depth <= thresholds.deep_nesting {
            continue;
        }
        issues.push(
            CodeIssue::new(
                IssueType::DeepNesting,
                node.location.clone(),
                &node.name,
                format!(
                    "{} '{}' nests {} levels deep, exceeds maximum of {}",
                    node.node_type, node.name, depth, thresholds.deep_nesting
                ),
            )
            .with_node(&node.id)
            .with_suggestion("Flatten with guard clauses or extract inner blocks"),
        );
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::graph::GraphBuilder;

    const BRANCHY: &str = r#"function route(a, b, c) {
  if (a) {
    if (b) {
      if (c) {
        for (const x of a) {
          while (x) {
            return x || b;
          }
        }
      }
    }
  }
  return a && b;
}

function flat() {
  return 1;
}
"#;

    fn graph() -> CodeGraph {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new("route.js", BRANCHY))];
        GraphBuilder::new("test", &files).build()
    }

    #[test]
    fn test_high_complexity() {
        let thresholds = Thresholds {
            high_complexity: 3,
            ..Default::default()
        };
        let issues = detect_high_complexity(&graph(), &thresholds);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'route'"));

        assert!(detect_high_complexity(&graph(), &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_deep_nesting() {
        let thresholds = Thresholds {
            deep_nesting: 3,
            ..Default::default()
        };
        let issues = detect_deep_nesting(&graph(), &thresholds);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::DeepNesting);
        assert!(issues[0].node.as_deref().unwrap().ends_with(":route"));
    }
}
