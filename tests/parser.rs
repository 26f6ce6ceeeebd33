//! Integration tests for per-file fact extraction.
//!
//! These tests run the registry against the testdata fixtures and check the
//! "never fails, deterministic" properties over arbitrary input.

use std::fs;
use std::path::PathBuf;

use codestrata::analysis::{ClassKind, Layer, ParserRegistry, SourceFile};
use codestrata::{FileInfo, Language};
use proptest::prelude::*;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn parse_fixture(rel: &str) -> FileInfo {
    let content = fs::read_to_string(testdata_path().join("shop").join(rel))
        .expect("fixture should be readable");
    ParserRegistry::new().parse(&SourceFile::new(rel, content))
}

// =============================================================================
// TypeScript
// =============================================================================

#[test]
fn test_typescript_routes() {
    let info = parse_fixture("src/api/routes.ts");
    assert_eq!(info.language, Language::TypeScript);
    assert_eq!(info.layer, Layer::Api);

    let modules: Vec<_> = info.imports.iter().map(|i| i.module.as_str()).collect();
    assert_eq!(modules, vec!["../services/orders", "../utils/format"]);
    assert!(info.imports.iter().all(|i| i.is_relative));
    assert!(info.imports.iter().flat_map(|i| &i.items).all(|item| item.referenced));

    let names: Vec<_> = info.functions.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"listOrders"));
    assert!(names.contains(&"renderOrder"));
    assert!(info.exports_name("listOrders"));

    let list = info.functions.iter().find(|f| f.name == "listOrders").unwrap();
    assert_eq!(list.parameters.len(), 2);
    assert!(list.calls.iter().any(|c| c.target == "findByCustomer"));
}

#[test]
fn test_typescript_class_methods() {
    let info = parse_fixture("src/services/orders.ts");
    assert_eq!(info.layer, Layer::Service);
    assert_eq!(info.classes.len(), 1);

    let class = &info.classes[0];
    assert_eq!(class.name, "OrderService");
    assert!(class.is_exported);

    let find = class.methods.iter().find(|m| m.name == "findByCustomer").unwrap();
    assert_eq!(find.complexity, 2);
    assert_eq!(find.parent_class.as_deref(), Some("OrderService"));
    let safe = class.methods.iter().find(|m| m.name == "findSafe").unwrap();
    assert_eq!(safe.complexity, 1);
}

// =============================================================================
// Python
// =============================================================================

#[test]
fn test_python_classes() {
    let info = parse_fixture("app/models.py");
    assert_eq!(info.language, Language::Python);

    let modules: Vec<_> = info.imports.iter().map(|i| i.module.as_str()).collect();
    assert_eq!(modules, vec!["hashlib", "os"]);

    let names: Vec<_> = info.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Base", "Customer"]);
    let customer = &info.classes[1];
    assert_eq!(customer.kind, ClassKind::Class);
    assert_eq!(customer.extends.as_deref(), Some("Base"));
    assert_eq!(customer.methods.len(), 2);
    assert_eq!(customer.line, 10);
}

#[test]
fn test_test_layer() {
    let info = parse_fixture("tests/test_orders.py");
    assert_eq!(info.layer, Layer::Test);
    assert!(info.functions.iter().any(|f| f.name == "test_roundtrip"));
}

// =============================================================================
// Rust
// =============================================================================

#[test]
fn test_rust_impl_methods() {
    let source = r#"use std::collections::HashMap;

pub struct Cache {
    entries: HashMap<String, String>,
}

impl Cache {
    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Cache { entries: HashMap::new() }
    }
}
"#;
    let info = ParserRegistry::new().parse(&SourceFile::new("src/cache.rs", source));
    assert_eq!(info.language, Language::Rust);
    let cache = info.classes.iter().find(|c| c.name == "Cache").unwrap();
    assert_eq!(cache.kind, ClassKind::Struct);
    assert!(cache.methods.iter().any(|m| m.name == "get"));
    let default = cache.methods.iter().find(|m| m.name == "default").unwrap();
    assert!(default.has_modifier("trait_impl"));
    assert!(info.exports_name("Cache"));
}

// =============================================================================
// Unparsed languages
// =============================================================================

#[test]
fn test_recognized_language_without_parser() {
    let info = ParserRegistry::new().parse(&SourceFile::new("cmd/main.go", "package main\n\nfunc main() {}\n"));
    assert_eq!(info.language, Language::Go);
    assert_eq!(info.line_count, 3);
    assert!(info.functions.is_empty());
    assert!(info.classes.is_empty());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn parsing_never_panics_and_is_deterministic(
        content in ".{0,400}",
        ext in prop::sample::select(vec!["ts", "js", "py", "rs"]),
    ) {
        let registry = ParserRegistry::new();
        let file = SourceFile::new(format!("src/input.{}", ext), content);
        let first = registry.parse(&file);
        let second = registry.parse(&file);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn unbalanced_braces_never_panic(
        prefix in "[{}()\\[\\]\"'`/*#\n a-z]{0,120}",
    ) {
        let registry = ParserRegistry::new();
        for ext in ["ts", "py", "rs"] {
            let content = format!("{}\nfunction f() {{ return 1; }}\n", prefix);
            let info = registry.parse(&SourceFile::new(format!("a.{}", ext), content));
            prop_assert!(info.line_count >= 2);
        }
    }
}
