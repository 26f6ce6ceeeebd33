//! Integration tests for graph construction and derived analysis over the
//! testdata projects.

use std::path::PathBuf;

use codestrata::cli::collect_files;
use codestrata::graph::{CodeGraph, EdgeKind, Level, NodeType};
use codestrata::{Config, Engine, IssueType, Severity};

fn project(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

fn build(name: &str) -> (Engine, CodeGraph, Vec<codestrata::FileInfo>) {
    let engine = Engine::new(Config::default()).unwrap();
    let files = collect_files(&project(name), engine.config(), false).unwrap();
    let outcome = engine.parse(&files);
    let graph = engine.build(name, &outcome.files);
    (engine, graph, outcome.files)
}

fn has_edge(graph: &CodeGraph, kind: EdgeKind, source: &str, target: &str) -> bool {
    graph
        .edges
        .iter()
        .any(|e| e.kind == kind && e.source == source && e.target == target)
}

#[test]
fn test_shop_hierarchy() {
    let (_, graph, files) = build("shop");

    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"src/api/routes.ts"));
    assert!(!paths.iter().any(|p| p.starts_with("node_modules")));

    let root = graph.root().unwrap();
    assert_eq!(root.name, "shop");
    assert_eq!(graph.nodes_at(Level::System).count(), 1);

    let modules: Vec<_> = graph.nodes_at(Level::Module).map(|n| n.name.as_str()).collect();
    assert!(modules.contains(&"app"));
    assert!(modules.contains(&"src/api"));
    assert!(modules.contains(&"src/services"));

    assert_eq!(graph.nodes_at(Level::File).count(), files.len());
    for node in &graph.nodes {
        match &node.parent {
            Some(parent) => assert!(graph.node(parent).unwrap().level < node.level),
            None => assert_eq!(node.node_type, NodeType::System),
        }
    }
}

#[test]
fn test_shop_relationships() {
    let (_, graph, _) = build("shop");

    assert!(has_edge(&graph, EdgeKind::Imports, "L3:src/api/routes.ts", "L3:src/services/orders.ts"));
    assert!(has_edge(&graph, EdgeKind::Imports, "L3:src/api/routes.ts", "L3:src/utils/format.ts"));
    assert!(has_edge(&graph, EdgeKind::Imports, "L3:src/services/orders.ts", "L3:src/services/db.ts"));
    assert!(has_edge(&graph, EdgeKind::DependsOn, "L2:src/api", "L2:src/services"));

    let class = |name: &str| {
        graph
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::Class && n.name == name)
            .unwrap()
            .id
            .clone()
    };
    assert!(has_edge(&graph, EdgeKind::Extends, &class("Customer"), &class("Base")));

    let saves: Vec<_> = graph.nodes.iter().filter(|n| n.name == "save").collect();
    assert_eq!(saves.len(), 2);
    assert!(graph
        .edges_of_kind(EdgeKind::Overrides)
        .any(|e| e.source == saves[1].id && e.target == saves[0].id));
}

#[test]
fn test_import_cycle_is_reported_once() {
    let (engine, graph, files) = build("cycle");
    let analysis = engine.analyze_graph(&graph, &files);

    let cycles: Vec<_> = analysis
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::CircularDependency)
        .collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, Severity::Error);
    assert_eq!(cycles[0].involved, vec!["L3:a.ts", "L3:b.ts", "L3:c.ts"]);
}

#[test]
fn test_call_graph_over_cycle() {
    let (engine, graph, files) = build("cycle");
    let analysis = engine.analyze_graph(&graph, &files);

    let names: Vec<_> = analysis.call_graph.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"a") && names.contains(&"b") && names.contains(&"c"));
    assert_eq!(analysis.call_graph.edges.len(), 3);
    assert!(analysis.call_graph.nodes.iter().all(|n| n.calls == 1 && n.called_by == 1));
}

#[test]
fn test_graph_is_deterministic() {
    let (_, first, _) = build("shop");
    let (_, second, _) = build("shop");
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
