//! Codestrata - multi-language static analysis engine.
//!
//! Codestrata turns a set of source files into a hierarchical code graph
//! (system, module, file, class, function, block and variable levels),
//! derives a call graph and data flows from it, reports quality issues and
//! runs a pattern-based security scan over the raw text.
//!
//! # Architecture
//!
//! - `analysis`: per-file fact extraction for TypeScript/JavaScript, Python
//!   and Rust
//! - `graph`: the seven-level graph builder and name resolution
//! - `flow`: call graph and data-flow derivation
//! - `detect`: quality issue detectors and their thresholds
//! - `security`: vulnerability rules, secret detection and taint tracking
//! - `pipeline`: the ordered parse, build, analyze, scan run
//! - `config`, `report`, `cli`, `logging`: the outer surface
//!
//! # Example
//!
//! ```rust
//! use codestrata::{Config, Engine, SourceFile};
//!
//! let engine = Engine::new(Config::default()).unwrap();
//! let files = vec![SourceFile::new("src/app.py", "def main():\n    return 0\n")];
//! let result = engine.run("demo", &files);
//! assert_eq!(result.files.len(), 1);
//! ```

pub mod analysis;
pub mod analyzer;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod flow;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod result;
pub mod security;

pub use analysis::{
    AnalysisContext, FileInfo, Language, LanguageParser, Layer, ParserRegistry, SourceFile,
};
pub use analyzer::{Analysis, GraphAnalyzer};
pub use cancel::CancellationToken;
pub use config::Config;
pub use detect::{CodeIssue, IssueType, Severity, Thresholds};
pub use error::{Error, Result};
pub use flow::{CallGraph, DataFlow};
pub use graph::{CodeEdge, CodeGraph, CodeNode, EdgeKind, GraphBuilder, Level, NodeType};
pub use pipeline::Engine;
pub use result::AnalysisResult;
pub use security::{SecurityReport, SecurityScanner, VulnSeverity, Vulnerability};
