//! Per-file fact extraction.
//!
//! This module turns raw source text into structural "facts": imports,
//! exports, classes, functions, variables and the calls, usages and control
//! blocks inside function bodies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ SourceFile      │────▶│ SourceText   │────▶│ LanguageParser│
//! │ (path, content) │     │ (masked copy,│     │ (TS/JS, Py,   │
//! └─────────────────┘     │  regions)    │     │  Rust)        │
//!                         └──────────────┘     └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ GraphBuilder │◀────│ FileInfo      │
//!                         └──────────────┘     └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement the `LanguageParser` trait over a [`SourceText`]
//! 3. Add its extensions to the table and the registry in `languages/mod.rs`

mod context;
mod facts;
mod languages;
pub mod text;
mod traits;

pub use context::{AnalysisContext, ParseOutcome, SymbolKind, SymbolMatch};
pub use facts::{
    count_lines, Access, AttributeAccessInfo, AttributeInfo, BlockInfo, BlockKind, CallInfo,
    ClassInfo, ClassKind, EventHandlerInfo, ExportInfo, ExportKind, FileInfo, FunctionInfo,
    FunctionKind, ImportInfo, ImportItem, Language, Layer, ParameterInfo, SourceFile, UsageShape,
    VariableInfo, VariableKind, VariableUsageInfo, Visibility,
};
pub use languages::{
    detect_language, is_recognized_extension, ParserRegistry, PythonParser, RustParser,
    TypeScriptParser,
};
pub use text::{SourceText, Syntax};
pub use traits::LanguageParser;
