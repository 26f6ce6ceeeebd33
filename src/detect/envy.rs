//! Detection of feature envy: methods more interested in another class than
//! in their own.

use std::collections::BTreeMap;

use crate::graph::{CodeGraph, EdgeIndex, EdgeKind, Level, NodeType};

use super::{CodeIssue, IssueType, Thresholds};

/// A method envies class `D` when its calls and attribute reads into `D`
/// reach `feature_envy_min_accesses` and exceed `feature_envy_ratio` times
/// its accesses to its own class.
pub fn detect_feature_envy(graph: &CodeGraph, thresholds: &Thresholds) -> Vec<CodeIssue> {
    let index = EdgeIndex::new(graph);
    let mut issues = Vec::new();

    for method in graph
        .nodes
        .iter()
        .filter(|n| matches!(n.node_type, NodeType::Method | NodeType::Constructor))
    {
        let Some(own) = graph.ancestor_at(&method.id, Level::Type) else {
            continue;
        };

        let mut own_count = 0usize;
        let mut foreign: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in index
            .outgoing(&method.id)
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::Calls | EdgeKind::Reads))
        {
            let Some(owner) = graph.ancestor_at(&edge.target, Level::Type) else {
                continue;
            };
            if owner.id == own.id {
                own_count += 1;
            } else {
                *foreign.entry(owner.id.as_str()).or_default() += 1;
            }
        }

        // Highest count wins; ties go to the smallest id.
        let Some((envied, count)) = foreign
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        else {
            continue;
        };
        if *count < thresholds.feature_envy_min_accesses
            || (*count as f64) <= thresholds.feature_envy_ratio * own_count as f64
        {
            continue;
        }
        let Some(envied) = graph.node(envied) else {
            continue;
        };

        issues.push(
            CodeIssue::new(
                IssueType::FeatureEnvy,
                method.location.clone(),
                &method.name,
                format!(
                    "method '{}' uses '{}' {} times but its own class '{}' only {} times",
                    method.name, envied.name, count, own.name, own_count
                ),
            )
            .with_node(&method.id)
            .with_suggestion(format!("Consider moving '{}' into '{}'", method.name, envied.name)),
        );
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ParserRegistry, SourceFile};
    use crate::graph::GraphBuilder;

    const SOURCE: &str = r#"class Account {
  balance: number;

  deposit(amount: number) {
    this.balance = this.balance + amount;
  }

  withdraw(amount: number) {
    this.balance = this.balance - amount;
  }

  audit() {
    return 1;
  }
}

class Report {
  total: number;

  summarize(account: Account) {
    account.deposit(1);
    account.withdraw(2);
    account.audit();
    return account.balance;
  }

  own() {
    return this.total;
  }
}
"#;

    #[test]
    fn test_feature_envy() {
        let files = vec![ParserRegistry::new().parse(&SourceFile::new("src/bank.ts", SOURCE))];
        let graph = GraphBuilder::new("t", &files).build();

        let issues = detect_feature_envy(&graph, &Thresholds::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("method 'summarize' uses 'Account'"));

        let lenient = Thresholds {
            feature_envy_min_accesses: 10,
            ..Default::default()
        };
        assert!(detect_feature_envy(&graph, &lenient).is_empty());
    }
}
