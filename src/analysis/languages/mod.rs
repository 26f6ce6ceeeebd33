//! Language-specific parser implementations and the registry that maps a
//! detected language to its parser.

mod python;
mod rust_lang;
mod typescript;

pub use python::PythonParser;
pub use rust_lang::RustParser;
pub use typescript::TypeScriptParser;

use std::path::Path;

use once_cell::sync::OnceCell;
use phf::phf_map;
use tracing::debug;

use super::facts::{FileInfo, Language};
use super::{LanguageParser, SourceFile};

/// Extension table, lowercase and without the dot.
static EXTENSIONS: phf::Map<&'static str, Language> = phf_map! {
    "ts" => Language::TypeScript,
    "tsx" => Language::TypeScript,
    "mts" => Language::TypeScript,
    "cts" => Language::TypeScript,
    "js" => Language::JavaScript,
    "jsx" => Language::JavaScript,
    "mjs" => Language::JavaScript,
    "cjs" => Language::JavaScript,
    "py" => Language::Python,
    "pyw" => Language::Python,
    "rs" => Language::Rust,
    "go" => Language::Go,
    "java" => Language::Java,
    "kt" => Language::Kotlin,
    "kts" => Language::Kotlin,
    "cs" => Language::CSharp,
    "c" => Language::C,
    "h" => Language::C,
    "cpp" => Language::Cpp,
    "cc" => Language::Cpp,
    "cxx" => Language::Cpp,
    "hpp" => Language::Cpp,
    "hh" => Language::Cpp,
    "rb" => Language::Ruby,
    "php" => Language::Php,
    "swift" => Language::Swift,
    "json" => Language::Json,
    "yaml" => Language::Yaml,
    "yml" => Language::Yaml,
    "toml" => Language::Toml,
    "md" => Language::Markdown,
    "markdown" => Language::Markdown,
    "html" => Language::Html,
    "htm" => Language::Html,
    "css" => Language::Css,
    "scss" => Language::Css,
};

/// Detect the language of a file from its extension.
pub fn detect_language(path: impl AsRef<Path>) -> Language {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| EXTENSIONS.get(ext.to_ascii_lowercase().as_str()).copied())
        .unwrap_or(Language::Unknown)
}

/// Whether the extension is one the engine recognizes at all.
pub fn is_recognized_extension(ext: &str) -> bool {
    EXTENSIONS.contains_key(ext.to_ascii_lowercase().as_str())
}

/// Maps languages to parser instances.
///
/// Parsers are stateless, so a registry can be shared freely between
/// threads. [`ParserRegistry::global`] returns a lazily built shared one.
pub struct ParserRegistry {
    typescript: TypeScriptParser,
    javascript: TypeScriptParser,
    python: PythonParser,
    rust: RustParser,
}

static GLOBAL: OnceCell<ParserRegistry> = OnceCell::new();

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            typescript: TypeScriptParser::new(),
            javascript: TypeScriptParser::javascript(),
            python: PythonParser::new(),
            rust: RustParser::new(),
        }
    }

    /// Shared registry, built on first use.
    pub fn global() -> &'static ParserRegistry {
        GLOBAL.get_or_init(ParserRegistry::new)
    }

    /// Parser for a language, or None when the language is recognized but
    /// has no structural parser.
    pub fn for_language(&self, language: Language) -> Option<&dyn LanguageParser> {
        match language {
            Language::TypeScript => Some(&self.typescript),
            Language::JavaScript => Some(&self.javascript),
            Language::Python => Some(&self.python),
            Language::Rust => Some(&self.rust),
            _ => None,
        }
    }

    /// Parser for a file extension (without dot).
    pub fn for_extension(&self, ext: &str) -> Option<&dyn LanguageParser> {
        EXTENSIONS
            .get(ext.to_ascii_lowercase().as_str())
            .and_then(|language| self.for_language(*language))
    }

    /// Languages that have a structural parser.
    pub fn parsed_languages(&self) -> [Language; 4] {
        [
            Language::TypeScript,
            Language::JavaScript,
            Language::Python,
            Language::Rust,
        ]
    }

    /// Extract the facts of one file.
    ///
    /// Files without a parser yield a [`FileInfo`] with empty structural
    /// facts.
    pub fn parse(&self, file: &SourceFile) -> FileInfo {
        match self.for_language(file.language) {
            Some(parser) => parser.parse_file(&file.path, file.language, &file.content),
            None => {
                debug!(path = %file.path, language = %file.language, "no parser, empty facts");
                FileInfo::empty(&file.path, file.language, &file.content)
            }
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("src/app.ts"), Language::TypeScript);
        assert_eq!(detect_language("src/App.TSX"), Language::TypeScript);
        assert_eq!(detect_language("lib/index.cjs"), Language::JavaScript);
        assert_eq!(detect_language("tool.pyw"), Language::Python);
        assert_eq!(detect_language("src/main.rs"), Language::Rust);
        assert_eq!(detect_language("go.mod"), Language::Unknown);
        assert_eq!(detect_language("Makefile"), Language::Unknown);
        assert_eq!(detect_language("cmd/main.go"), Language::Go);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ParserRegistry::new();
        assert_eq!(
            registry.for_language(Language::JavaScript).map(|p| p.language_id()),
            Some("javascript")
        );
        assert_eq!(
            registry.for_extension("rs").map(|p| p.language_id()),
            Some("rust")
        );
        assert!(registry.for_language(Language::Go).is_none());
        assert!(registry.for_extension("exe").is_none());
    }

    #[test]
    fn test_unsupported_language_yields_empty_facts() {
        let file = SourceFile::new("cmd/main.go", "package main\n\nfunc main() {}\n");
        let info = ParserRegistry::global().parse(&file);
        assert_eq!(info.language, Language::Go);
        assert_eq!(info.line_count, 3);
        assert!(info.functions.is_empty());
        assert!(info.imports.is_empty());
    }

    #[test]
    fn test_parse_dispatches_by_language() {
        let file = SourceFile::new("pkg/util.py", "def helper():\n    return 1\n");
        let info = ParserRegistry::global().parse(&file);
        assert_eq!(info.functions.len(), 1);
        assert_eq!(info.functions[0].name, "helper");
    }
}
