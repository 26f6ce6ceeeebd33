//! Per-run analysis context.
//!
//! The AnalysisContext provides:
//! - Caching of extracted facts for the lifetime of one run
//! - Parallel parsing with a deterministic, path-sorted result
//! - Cross-file symbol lookup
//!
//! A context is created for a run and dropped with it; nothing is kept in
//! process-wide state.

use std::collections::HashMap;
use std::sync::RwLock;

use rayon::prelude::*;
use tracing::debug;

use crate::analysis::{FileInfo, Language, ParserRegistry, SourceFile};
use crate::cancel::CancellationToken;

/// Outcome of parsing a batch of files.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Facts sorted by path.
    pub files: Vec<FileInfo>,
    /// Whether parsing stopped early.
    pub cancelled: bool,
}

/// Analysis context for a set of files.
pub struct AnalysisContext<'r> {
    registry: &'r ParserRegistry,
    cancel: CancellationToken,
    /// Cached facts, keyed by project-relative path.
    facts_cache: RwLock<HashMap<String, FileInfo>>,
}

impl<'r> AnalysisContext<'r> {
    pub fn new(registry: &'r ParserRegistry) -> Self {
        Self::with_cancellation(registry, CancellationToken::new())
    }

    pub fn with_cancellation(registry: &'r ParserRegistry, cancel: CancellationToken) -> Self {
        Self {
            registry,
            cancel,
            facts_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Parse a file and cache the result.
    ///
    /// Returns the cached facts if the path was already parsed in this run.
    pub fn parse_file(&self, file: &SourceFile) -> FileInfo {
        if let Some(info) = self.facts_for_file(&file.path) {
            return info;
        }

        let info = self.registry.parse(file);
        debug!(
            path = %info.path,
            classes = info.classes.len(),
            functions = info.functions.len(),
            "parsed file"
        );

        if let Ok(mut cache) = self.facts_cache.write() {
            cache.insert(info.path.clone(), info.clone());
        }
        info
    }

    /// Parse multiple files.
    ///
    /// With `parallel` set, files are parsed on the rayon pool. Either way
    /// the result is sorted by path. Cancellation is checked before each
    /// file; files already started still finish.
    pub fn parse_files(&self, files: &[SourceFile], parallel: bool) -> ParseOutcome {
        let parse_one = |file: &SourceFile| {
            if self.cancel.is_cancelled() {
                None
            } else {
                Some(self.parse_file(file))
            }
        };

        let results: Vec<Option<FileInfo>> = if parallel {
            files.par_iter().map(parse_one).collect()
        } else {
            files.iter().map(parse_one).collect()
        };

        let cancelled = results.iter().any(Option::is_none);
        let mut parsed: Vec<FileInfo> = results.into_iter().flatten().collect();

        // Sort by path for deterministic ordering
        parsed.sort_by(|a, b| a.path.cmp(&b.path));
        parsed.dedup_by(|a, b| a.path == b.path);

        ParseOutcome {
            files: parsed,
            cancelled,
        }
    }

    /// Get cached facts for a file.
    ///
    /// Returns None if the file hasn't been parsed yet.
    pub fn facts_for_file(&self, path: &str) -> Option<FileInfo> {
        self.facts_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(path).cloned())
    }

    /// Get all cached facts for a given language, sorted by path.
    pub fn facts_by_language(&self, language: Language) -> Vec<FileInfo> {
        let mut files: Vec<FileInfo> = self
            .facts_cache
            .read()
            .map(|cache| {
                cache
                    .values()
                    .filter(|f| f.language == language)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Find classes, functions and methods named `name` across all parsed
    /// files.
    pub fn find_symbol(&self, name: &str) -> Vec<SymbolMatch> {
        let Ok(cache) = self.facts_cache.read() else {
            return Vec::new();
        };
        let mut matches = Vec::new();

        for info in cache.values() {
            for class in info.classes.iter().filter(|c| c.name == name) {
                matches.push(SymbolMatch {
                    file: info.path.clone(),
                    line: class.line,
                    kind: SymbolKind::Class,
                    parent: None,
                });
            }
            for function in info.callables().filter(|f| f.name == name) {
                matches.push(SymbolMatch {
                    file: info.path.clone(),
                    line: function.line,
                    kind: SymbolKind::Function,
                    parent: function.parent_class.clone(),
                });
            }
            for variable in info.variables.iter().filter(|v| v.name == name) {
                matches.push(SymbolMatch {
                    file: info.path.clone(),
                    line: variable.line,
                    kind: SymbolKind::Variable,
                    parent: None,
                });
            }
        }

        // Sort for deterministic output
        matches.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        matches
    }

    /// Get all parsed file paths.
    pub fn analyzed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .facts_cache
            .read()
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.facts_cache.write() {
            cache.clear();
        }
    }
}

/// Kind of a symbol found by [`AnalysisContext::find_symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Function,
    Variable,
}

/// A symbol match result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch {
    pub file: String,
    pub line: usize,
    pub kind: SymbolKind,
    /// Owning class, for methods.
    pub parent: Option<String>,
}
