//! Core trait for language parsers.

use super::facts::{ClassInfo, ExportInfo, FileInfo, FunctionInfo, ImportInfo, VariableInfo};
use super::text::{SourceText, Syntax};
use super::Language;

/// Language-specific fact extractor.
///
/// Every operation is best-effort and never fails: a construct that cannot
/// be recognized is left out of the result, the rest of the file is still
/// extracted. Implementations work over a lexed [`SourceText`] so a file is
/// lexed once per [`parse_file`](LanguageParser::parse_file) call.
///
/// Parsers hold no state, so one instance may serve any number of threads.
pub trait LanguageParser: Send + Sync {
    /// Returns the language identifier (e.g. "typescript", "rust").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this parser handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Lexical family used to build the source text.
    fn syntax(&self) -> Syntax;

    fn imports(&self, src: &SourceText<'_>) -> Vec<ImportInfo>;
    fn exports(&self, src: &SourceText<'_>) -> Vec<ExportInfo>;
    fn classes(&self, src: &SourceText<'_>) -> Vec<ClassInfo>;
    /// Top-level functions, plus methods of types declared elsewhere.
    fn functions(&self, src: &SourceText<'_>) -> Vec<FunctionInfo>;
    /// Module-level variables and constants.
    fn variables(&self, src: &SourceText<'_>) -> Vec<VariableInfo>;

    fn extract_imports(&self, content: &str) -> Vec<ImportInfo> {
        self.imports(&SourceText::new(content, self.syntax()))
    }

    fn extract_exports(&self, content: &str) -> Vec<ExportInfo> {
        self.exports(&SourceText::new(content, self.syntax()))
    }

    fn extract_classes(&self, content: &str) -> Vec<ClassInfo> {
        self.classes(&SourceText::new(content, self.syntax()))
    }

    fn extract_functions(&self, content: &str) -> Vec<FunctionInfo> {
        self.functions(&SourceText::new(content, self.syntax()))
    }

    fn extract_variables(&self, content: &str) -> Vec<VariableInfo> {
        self.variables(&SourceText::new(content, self.syntax()))
    }

    /// Extract every fact of a file.
    ///
    /// Export flags on classes, functions and variables are reconciled with
    /// the export list, so a name exported through a separate `export { }`
    /// or `__all__` statement is marked exported too.
    fn parse_file(&self, path: &str, language: Language, content: &str) -> FileInfo {
        let src = SourceText::new(content, self.syntax());
        let mut file = FileInfo::empty(path, language, content);

        file.imports = self.imports(&src);
        file.exports = self.exports(&src);
        file.classes = self.classes(&src);
        file.functions = self.functions(&src);
        file.variables = self.variables(&src);

        let exports = std::mem::take(&mut file.exports);
        let exported = |name: &str| exports.iter().any(|e| e.name == name);
        for class in &mut file.classes {
            class.is_exported |= exported(&class.name);
        }
        for function in &mut file.functions {
            if function.parent_class.is_none() {
                function.is_exported |= exported(&function.name);
            }
        }
        for variable in &mut file.variables {
            variable.is_exported |= exported(&variable.name);
        }
        file.exports = exports;

        file
    }

    /// Check if this parser handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
