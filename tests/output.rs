//! Tests for the JSON, SARIF and pretty output formats.

use std::path::PathBuf;

use codestrata::cli::collect_files;
use codestrata::report;
use codestrata::{AnalysisResult, Config, Engine};

fn shop_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join("shop")
}

fn run_shop() -> AnalysisResult {
    let root = shop_root();
    let (config, path) = Config::load(None, &root).unwrap();
    assert_eq!(path, Some(root.join("codestrata.yaml")));
    let project = config.project.clone().unwrap();
    let files = collect_files(&root, &config, false).unwrap();
    Engine::new(config).unwrap().run(&project, &files)
}

// =============================================================================
// JSON
// =============================================================================

#[test]
fn test_json_structure() {
    let result = run_shop();
    let json = report::render_json(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["meta"]["project"], "shop");
    assert_eq!(value["meta"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(value["meta"]["cancelled"], false);
    assert_eq!(
        value["stats"]["total_files"].as_u64(),
        Some(result.files.len() as u64)
    );
    assert_eq!(value["stats"]["nodes_by_level"]["L1"], 1);
    assert!(value["nodes"].as_array().unwrap().len() > 10);
    assert!(value["call_graph"]["nodes"].is_array());
    assert!(value["security"]["vulnerabilities"].is_array());
    assert!(value["security"]["summary"]["critical"].as_u64().unwrap() >= 1);
}

#[test]
fn test_json_is_byte_identical_across_runs() {
    let first = report::render_json(&run_shop()).unwrap();
    let second = report::render_json(&run_shop()).unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// SARIF
// =============================================================================

#[test]
fn test_sarif_from_scan() {
    let result = run_shop();
    let security = result.security.as_ref().unwrap();
    let sarif = report::render_sarif(security).unwrap();
    let value: serde_json::Value = serde_json::from_str(&sarif).unwrap();

    assert_eq!(value["version"], "2.1.0");
    assert!(value["$schema"].as_str().unwrap().contains("sarif-schema-2.1.0"));

    let run = &value["runs"][0];
    let results = run["results"].as_array().unwrap();
    assert_eq!(results.len(), security.vulnerabilities.len());

    let rule_ids: Vec<_> = run["tool"]["driver"]["rules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    let mut sorted = rule_ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(rule_ids, sorted);

    for r in results {
        assert!(rule_ids.contains(&r["ruleId"].as_str().unwrap().to_string()));
        let uri = r["locations"][0]["physicalLocation"]["artifactLocation"]["uri"]
            .as_str()
            .unwrap();
        assert!(!uri.starts_with('/'));
    }
}

// =============================================================================
// Pretty
// =============================================================================

#[test]
fn test_pretty_output() {
    colored::control::set_override(false);
    let text = report::render_pretty(&run_shop());
    assert!(text.contains("codestrata v"));
    assert!(text.contains("shop"));
    assert!(text.contains("Security:"));
    assert!(text.contains("src/services/orders.ts:8"));
}
