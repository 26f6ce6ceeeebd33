//! The ordered analysis pipeline: parse, build, analyze, scan.
//!
//! Parsing and scanning are per-file and may run in parallel. Graph
//! construction always sees the complete, path-sorted fact set.

use tracing::info;

use crate::analysis::{AnalysisContext, FileInfo, ParseOutcome, ParserRegistry, SourceFile};
use crate::analyzer::{Analysis, GraphAnalyzer};
use crate::cancel::CancellationToken;
use crate::config::{validate, Config};
use crate::graph::{CodeGraph, GraphBuilder};
use crate::result::AnalysisResult;
use crate::security::{SecurityReport, SecurityScanner};
use crate::Result;

/// Runs every stage of an analysis with one configuration.
pub struct Engine {
    config: Config,
    registry: ParserRegistry,
    analyzer: GraphAnalyzer,
    scanner: SecurityScanner,
    cancel: CancellationToken,
}

impl Engine {
    /// Create an engine. Fails only when the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let cancel = CancellationToken::new();
        let analyzer = GraphAnalyzer::new(config.thresholds.clone())
            .disable(&config.disabled_issue_types());
        let scanner = SecurityScanner::new()
            .with_entropy(config.security.entropy)
            .with_downgrade_paths(&config.security.downgrade_paths)?
            .parallel(config.parallel)
            .with_cancellation(cancel.clone());
        Ok(Self {
            config,
            registry: ParserRegistry::new(),
            analyzer,
            scanner,
            cancel,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops parsing and scanning after the current file.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Extract facts from every file, sorted by path.
    pub fn parse(&self, files: &[SourceFile]) -> ParseOutcome {
        let context = AnalysisContext::with_cancellation(&self.registry, self.cancel.clone());
        let outcome = context.parse_files(files, self.config.parallel);
        info!(
            files = outcome.files.len(),
            cancelled = outcome.cancelled,
            "parsing complete"
        );
        outcome
    }

    pub fn build(&self, project: &str, files: &[FileInfo]) -> CodeGraph {
        GraphBuilder::new(project, files).build()
    }

    pub fn analyze_graph(&self, graph: &CodeGraph, files: &[FileInfo]) -> Analysis {
        self.analyzer.analyze(graph, files)
    }

    pub fn scan(&self, files: &[SourceFile]) -> SecurityReport {
        self.scanner.scan_files(files)
    }

    /// Parse, build and analyze, then scan when security is enabled.
    pub fn run(&self, project: &str, files: &[SourceFile]) -> AnalysisResult {
        let outcome = self.parse(files);
        let graph = self.build(project, &outcome.files);
        let analysis = self.analyze_graph(&graph, &outcome.files);
        let result = AnalysisResult::new(project, outcome.files, graph, analysis, outcome.cancelled);
        if self.config.security.enabled {
            result.with_security(self.scan(files))
        } else {
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<SourceFile> {
        vec![
            SourceFile::new(
                "src/db.ts",
                "export function find(req) {\n  return db.query(\"SELECT * FROM t WHERE id=\" + req.params.id);\n}\n",
            ),
            SourceFile::new("src/main.py", "def main():\n    return 0\n"),
        ]
    }

    #[test]
    fn test_run_end_to_end() {
        let engine = Engine::new(Config::default()).unwrap();
        let result = engine.run("demo", &sources());
        assert_eq!(result.meta.project, "demo");
        assert_eq!(result.files.len(), 2);
        assert!(!result.meta.cancelled);
        let security = result.security.unwrap();
        assert_eq!(security.files_scanned, 2);
        assert_eq!(security.summary.critical, 1);
    }

    #[test]
    fn test_security_can_be_disabled() {
        let mut config = Config::default();
        config.security.enabled = false;
        let result = Engine::new(config).unwrap().run("demo", &sources());
        assert!(result.security.is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.security.downgrade_paths = vec!["a/[".to_string()];
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_cancelled_run_is_flagged() {
        let engine = Engine::new(Config::default()).unwrap();
        engine.cancellation().cancel();
        let result = engine.run("demo", &sources());
        assert!(result.meta.cancelled);
        assert!(result.files.is_empty());
        assert!(result.security.unwrap().cancelled);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let engine = Engine::new(Config::default()).unwrap();
        let a = engine.run("demo", &sources());
        let b = engine.run("demo", &sources());
        assert_eq!(a, b);
    }
}
