//! Detection of oversized classes and methods.
//!
//! - God classes: too many lines or too many methods
//! - Long methods: callables spanning too many lines

use crate::graph::{CodeGraph, NodeType};

use super::{CodeIssue, IssueType, Thresholds};

/// Flag classes and structs whose size or method count exceeds the limits.
pub fn detect_god_classes(graph: &CodeGraph, thresholds: &Thresholds) -> Vec<CodeIssue> {
    let mut issues = Vec::new();

    for node in graph
        .nodes
        .iter()
        .filter(|n| matches!(n.node_type, NodeType::Class | NodeType::Struct))
    {
        let methods = graph
            .children_of(node)
            .filter(|c| c.node_type.is_callable())
            .count();
        let loc = node.metrics.loc;

        let mut reasons = Vec::new();
        if loc > thresholds.god_class_loc {
            reasons.push(format!("{} lines (max {})", loc, thresholds.god_class_loc));
        }
        if methods > thresholds.god_class_methods {
            reasons.push(format!(
                "{} methods (max {})",
                methods, thresholds.god_class_methods
            ));
        }
        if reasons.is_empty() {
            continue;
        }

        issues.push(
            CodeIssue::new(
                IssueType::GodClass,
                node.location.clone(),
                &node.name,
                format!("{} '{}' has {}", node.node_type, node.name, reasons.join(" and ")),
            )
            .with_node(&node.id)
            .with_suggestion("Split the type along its responsibilities"),
        );
    }

    issues
}

/// Flag callables longer than `long_method_loc` lines.
pub fn detect_long_methods(graph: &CodeGraph, thresholds: &Thresholds) -> Vec<CodeIssue> {
    graph
        .nodes
        .iter()
        .filter(|n| n.node_type.is_callable() && n.metrics.loc > thresholds.long_method_loc)
        .map(|node| {
            CodeIssue::new(
                IssueType::LongMethod,
                node.location.clone(),
                &node.name,
                format!(
                    "{} '{}' has {} lines, exceeds maximum of {}",
                    node.node_type, node.name, node.metrics.loc, thresholds.long_method_loc
                ),
            )
            .with_node(&node.id)
            .with_suggestion("Extract cohesive parts into helper functions")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::graph::GraphBuilder;

    fn graph_for(path: &str, content: &str) -> CodeGraph {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new(path, content))];
        GraphBuilder::new("test", &files).build()
    }

    fn class_with_methods(count: usize) -> String {
        let mut code = String::from("class Big {\n");
        for i in 0..count {
            code.push_str(&format!("  m{}() {{\n    return {};\n  }}\n", i, i));
        }
        code.push_str("}\n");
        code
    }

    #[test]
    fn test_god_class_by_method_count() {
        let graph = graph_for("big.ts", &class_with_methods(5));
        let thresholds = Thresholds {
            god_class_methods: 4,
            ..Default::default()
        };

        let issues = detect_god_classes(&graph, &thresholds);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("5 methods"));
        assert_eq!(issues[0].issue_type, IssueType::GodClass);
    }

    #[test]
    fn test_small_class_not_flagged() {
        let graph = graph_for("small.ts", &class_with_methods(2));
        assert!(detect_god_classes(&graph, &Thresholds::default()).is_empty());
    }

    #[test]
    fn test_long_method() {
        let mut body = String::from("def long():\n");
        for i in 0..10 {
            body.push_str(&format!("    x{} = {}\n", i, i));
        }
        let graph = graph_for("long.py", &body);

        let thresholds = Thresholds {
            long_method_loc: 5,
            ..Default::default()
        };
        let issues = detect_long_methods(&graph, &thresholds);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'long' has 11 lines"));

        assert!(detect_long_methods(&graph, &Thresholds::default()).is_empty());
    }
}
