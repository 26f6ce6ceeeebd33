//! Seven-level code graph.
//!
//! Levels run from the system root (L1) through modules, files, types,
//! callables and control blocks down to variables (L7). Nodes are linked by
//! containment edges plus typed relationship edges resolved by name.

pub mod builder;
pub mod metrics;
pub mod resolve;
pub mod types;

pub use builder::GraphBuilder;
pub use resolve::{module_of, ModuleResolver};
pub use types::{
    CodeEdge, CodeGraph, CodeNode, EdgeGroup, EdgeIndex, EdgeKind, Level, Location, NodeMetrics,
    NodeType,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FileInfo, ParserRegistry, SourceFile};

    fn parse(files: &[(&str, &str)]) -> Vec<FileInfo> {
        let registry = ParserRegistry::new();
        files
            .iter()
            .map(|(path, content)| registry.parse(&SourceFile::new(*path, *content)))
            .collect()
    }

    fn ts_project() -> Vec<FileInfo> {
        parse(&[
            (
                "src/services/user.ts",
                r#"import { formatName } from "../utils/format";

export class UserService {
  greet(name: string): string {
    return formatName(name);
  }
}
"#,
            ),
            (
                "src/utils/format.ts",
                r#"export function formatName(value: string): string {
  return value.trim();
}
"#,
            ),
            (
                "src/main.ts",
                r#"import { UserService } from "./services/user";

export function main() {
  const service = new UserService();
  return service.greet("ada");
}
"#,
            ),
        ])
    }

    fn find<'g>(graph: &'g CodeGraph, node_type: NodeType, name: &str) -> &'g CodeNode {
        graph
            .nodes
            .iter()
            .find(|n| n.node_type == node_type && n.name == name)
            .unwrap_or_else(|| panic!("missing {} {}", node_type, name))
    }

    fn has_edge(graph: &CodeGraph, kind: EdgeKind, source: &str, target: &str) -> bool {
        graph
            .edges
            .iter()
            .any(|e| e.kind == kind && e.source == source && e.target == target)
    }

    #[test]
    fn test_hierarchy() {
        let files = ts_project();
        let graph = GraphBuilder::new("demo", &files).build();

        let root = graph.root().unwrap();
        assert_eq!(root.node_type, NodeType::System);
        assert_eq!(root.name, "demo");
        assert!(root.parent.is_none());

        let modules: Vec<_> = graph.nodes_at(Level::Module).map(|n| n.name.as_str()).collect();
        assert_eq!(modules, vec!["src", "src/services", "src/utils"]);

        let file = graph.node("L3:src/services/user.ts").unwrap();
        assert_eq!(file.parent.as_deref(), Some("L2:src/services"));

        let class = find(&graph, NodeType::Class, "UserService");
        assert_eq!(class.parent.as_deref(), Some("L3:src/services/user.ts"));
        assert_eq!(class.full_path, "src.services.user.UserService");

        let method = find(&graph, NodeType::Method, "greet");
        assert_eq!(method.parent.as_deref(), Some(class.id.as_str()));
        assert_eq!(method.level, Level::Function);
    }

    #[test]
    fn test_structural_invariants() {
        let files = ts_project();
        let graph = GraphBuilder::new("demo", &files).build();

        for node in &graph.nodes {
            if let Some(parent) = &node.parent {
                let parent = graph.node(parent).unwrap();
                assert!(parent.children.contains(&node.id));
                assert!(parent.level < node.level);
            } else {
                assert_eq!(node.level, Level::System);
            }
        }
        for edge in &graph.edges {
            assert!(graph.contains_node(&edge.source), "{}", edge.id);
            assert!(graph.contains_node(&edge.target), "{}", edge.id);
        }

        let contains = graph.edges_of_kind(EdgeKind::Contains).count();
        assert_eq!(contains, graph.nodes.len() - 1);
        assert_eq!(graph.edges_of_kind(EdgeKind::ContainedBy).count(), contains);

        let mut ids: Vec<_> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), graph.edges.len());
    }

    #[test]
    fn test_relationship_edges() {
        let files = ts_project();
        let graph = GraphBuilder::new("demo", &files).build();

        assert!(has_edge(&graph, EdgeKind::Imports, "L3:src/services/user.ts", "L3:src/utils/format.ts"));
        assert!(has_edge(&graph, EdgeKind::Imports, "L3:src/main.ts", "L3:src/services/user.ts"));
        assert!(has_edge(&graph, EdgeKind::DependsOn, "L2:src/services", "L2:src/utils"));
        assert!(has_edge(&graph, EdgeKind::DependsOn, "L2:src", "L2:src/services"));

        let greet = find(&graph, NodeType::Method, "greet");
        let format = find(&graph, NodeType::Function, "formatName");
        let main = find(&graph, NodeType::Function, "main");
        let class = find(&graph, NodeType::Class, "UserService");

        assert!(has_edge(&graph, EdgeKind::Calls, &greet.id, &format.id));
        assert!(has_edge(&graph, EdgeKind::Calls, &main.id, &greet.id));
        assert!(has_edge(&graph, EdgeKind::Instantiates, &main.id, &class.id));
        assert!(has_edge(&graph, EdgeKind::Exports, "L3:src/utils/format.ts", &format.id));
    }

    #[test]
    fn test_metrics() {
        let files = ts_project();
        let graph = GraphBuilder::new("demo", &files).build();

        let file = graph.node("L3:src/utils/format.ts").unwrap();
        assert_eq!(file.metrics.loc, 3);
        assert!(file.metrics.dependents >= 1);

        let total: usize = files.iter().map(|f| f.line_count).sum();
        assert_eq!(graph.root().unwrap().metrics.loc, total);

        let format = find(&graph, NodeType::Function, "formatName");
        assert_eq!(format.metrics.loc, 3);
        assert_eq!(format.metrics.complexity, Some(1));
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut files = ts_project();
        let first = serde_json::to_string(&GraphBuilder::new("demo", &files).build()).unwrap();
        files.reverse();
        let second = serde_json::to_string(&GraphBuilder::new("demo", &files).build()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_python_overrides() {
        let files = parse(&[(
            "app/models.py",
            r#"class Base:
    def run(self):
        return 1


class Child(Base):
    def run(self):
        return self.helper()

    def helper(self):
        return 2
"#,
        )]);
        let graph = GraphBuilder::new("py", &files).build();

        let base = find(&graph, NodeType::Class, "Base");
        let child = find(&graph, NodeType::Class, "Child");
        assert!(has_edge(&graph, EdgeKind::Extends, &child.id, &base.id));

        let runs: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.name == "run")
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(runs.len(), 2);
        assert!(has_edge(&graph, EdgeKind::Overrides, &runs[1], &runs[0]));

        let helper = find(&graph, NodeType::Method, "helper");
        assert!(has_edge(&graph, EdgeKind::Calls, &runs[1], &helper.id));
    }

    #[test]
    fn test_rust_static_call() {
        let files = parse(&[(
            "src/main.rs",
            r#"struct Store {
    items: Vec<String>,
}

impl Store {
    fn new() -> Self {
        Store { items: Vec::new() }
    }
}

fn main() {
    let store = Store::new();
}
"#,
        )]);
        let graph = GraphBuilder::new("rs", &files).build();

        let main = find(&graph, NodeType::Function, "main");
        let store = find(&graph, NodeType::Struct, "Store");
        let new = graph
            .nodes
            .iter()
            .find(|n| n.name == "new")
            .unwrap();
        assert_eq!(new.parent.as_deref(), Some(store.id.as_str()));
        assert_eq!(new.full_path, "src::main::Store::new");
        assert!(has_edge(&graph, EdgeKind::Calls, &main.id, &new.id));

        let local = find(&graph, NodeType::Variable, "store");
        assert_eq!(local.parent.as_deref(), Some(main.id.as_str()));
    }

    #[test]
    fn test_empty_input() {
        let graph = GraphBuilder::new("empty", &[]).build();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
