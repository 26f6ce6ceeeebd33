//! Python parser.
//!
//! Structure comes from indentation: a block runs until the first non-blank
//! line indented at or left of its header. Only `def`s at column zero are
//! top-level functions; indented ones belong to their class.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::facts::{
    AttributeInfo, ClassInfo, ClassKind, ExportInfo, ExportKind, FunctionInfo, FunctionKind,
    ImportInfo, ImportItem, VariableInfo, VariableKind, Visibility,
};
use crate::analysis::text::{
    analyze_body, indent_width, parse_parameters, split_top_level, truncate, RegionKind,
    SourceText, Syntax,
};
use crate::analysis::LanguageParser;

lazy_static! {
    static ref IMPORT: Regex = Regex::new(r"^\s*import\s+(.+)$").unwrap();
    static ref FROM_IMPORT: Regex =
        Regex::new(r"^\s*from\s+(\.*[\w.]*)\s+import\s+(.*)$").unwrap();
    static ref CLASS: Regex = Regex::new(r"^(\s*)class\s+([A-Za-z_]\w*)").unwrap();
    static ref DEF: Regex = Regex::new(r"^(\s*)(async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap();
    static ref ASSIGN: Regex =
        Regex::new(r"^([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=\s*(.*)$").unwrap();
    static ref SELF_ATTR: Regex =
        Regex::new(r"\bself\.([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=[^=]").unwrap();
    static ref ALL: Regex = Regex::new(r"^__all__\s*\+?=\s*[\[(]").unwrap();
    static ref LAMBDA: Regex = Regex::new(r"^([A-Za-z_]\w*)\s*=\s*lambda\b([^:]*):").unwrap();
}

/// Parser for Python sources.
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    /// Build a function or method from the `def` on `line`.
    fn build_def(
        &self,
        src: &SourceText<'_>,
        line: usize,
        paren: usize,
        name: &str,
        is_async: bool,
        class_name: Option<&str>,
    ) -> FunctionInfo {
        let kind = if name == "__init__" {
            FunctionKind::Constructor
        } else if name.starts_with("on_") || name.starts_with("handle_") {
            FunctionKind::Handler
        } else if class_name.is_some() {
            FunctionKind::Method
        } else {
            FunctionKind::Function
        };

        let end_line = src.indent_block_end(line);
        let mut function = FunctionInfo::new(name, kind, line, end_line);
        function.is_async = is_async;
        function.parent_class = class_name.map(str::to_string);
        function.visibility = python_visibility(name, class_name.is_some());

        let colon = src.header_colon(line);
        if let Some(close) = src.matching_close(paren) {
            function.parameters = parse_parameters(&src.raw()[paren + 1..close], Syntax::Python);
            if let Some(colon) = colon.filter(|&c| c > close) {
                let between = &src.masked()[close + 1..colon];
                if let Some(arrow) = between.find("->") {
                    let text = src.raw()[close + 1 + arrow + 2..colon].trim();
                    if !text.is_empty() {
                        function.return_type = Some(text.to_string());
                    }
                }
            }
        }

        if let Some(colon) = colon {
            analyze_body(src, colon + 1, src.line_end(end_line)).apply(&mut function);
        }

        let preamble = src.preamble(line);
        for decorator in &preamble.decorators {
            let head = decorator.split('(').next().unwrap_or("");
            match head.rsplit('.').next().unwrap_or(head) {
                "staticmethod" => function.is_static = true,
                "classmethod" => {
                    function.is_static = true;
                    function.modifiers.push("classmethod".to_string());
                }
                "property" => function.modifiers.push("property".to_string()),
                "abstractmethod" => function.modifiers.push("abstract".to_string()),
                "setter" => function.modifiers.push("setter".to_string()),
                _ => {}
            }
        }
        function.decorators = preamble.decorators;
        function.documentation = src
            .python_docstring(src.header_end_line(line))
            .or(preamble.documentation);
        function
    }

    fn import_spans(&self, src: &SourceText<'_>) -> Vec<(usize, usize, usize)> {
        // (line, start offset, end offset) of every import statement.
        let mut spans = Vec::new();
        for l in 1..=src.line_count() {
            let text = src.masked_line(l);
            let trimmed = text.trim_start();
            if !(trimmed.starts_with("import ") || trimmed.starts_with("from ")) {
                continue;
            }
            let start = src.line_start(l);
            let mut end = src.line_end(l);
            if let Some(open) = text.find('(') {
                if let Some(close) = src.matching_close(start + open) {
                    end = end.max(close + 1);
                }
            }
            spans.push((l, start, end));
        }
        spans
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

fn python_visibility(name: &str, is_member: bool) -> Visibility {
    if name.starts_with("__") && name.ends_with("__") {
        Visibility::Public
    } else if name.starts_with("__") {
        Visibility::Private
    } else if name.starts_with('_') {
        if is_member {
            Visibility::Protected
        } else {
            Visibility::Private
        }
    } else {
        Visibility::Public
    }
}

/// Block keywords that the assignment pattern would read as annotated names.
fn is_block_word(name: &str) -> bool {
    matches!(name, "else" | "try" | "finally" | "except" | "match" | "case")
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn strip_subscript(s: &str) -> String {
    s.split('[').next().unwrap_or("").trim().to_string()
}

fn constant_like(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

impl LanguageParser for PythonParser {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyw"]
    }

    fn syntax(&self) -> Syntax {
        Syntax::Python
    }

    fn imports(&self, src: &SourceText<'_>) -> Vec<ImportInfo> {
        let statements = self.import_spans(src);
        let skip: Vec<(usize, usize)> = statements.iter().map(|&(_, s, e)| (s, e)).collect();
        let mut imports = Vec::new();

        for &(line, start, end) in &statements {
            let text = &src.masked()[start..end];
            let flat = text.replace(['\n', '\\'], " ");

            if let Some(caps) = FROM_IMPORT.captures(&flat) {
                let (Some(module), Some(names)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let names = names.as_str().trim().trim_start_matches('(');
                let names = names.split(')').next().unwrap_or("");
                let items = split_top_level(names, b',')
                    .into_iter()
                    .map(|part| {
                        let (name, alias) = match part.split_once(" as ") {
                            Some((name, alias)) => (name.trim(), Some(alias.trim().to_string())),
                            None => (part.trim(), None),
                        };
                        let local = alias.as_deref().unwrap_or(name).to_string();
                        ImportItem {
                            name: name.to_string(),
                            alias,
                            referenced: name == "*" || src.referenced_outside(&local, &skip),
                        }
                    })
                    .collect();
                let module = module.as_str();
                imports.push(ImportInfo {
                    module: module.to_string(),
                    items,
                    line,
                    is_relative: module.starts_with('.'),
                    is_type_only: false,
                });
                continue;
            }

            if let Some(list) = IMPORT.captures(&flat).and_then(|c| c.get(1)) {
                for part in split_top_level(list.as_str(), b',') {
                    let (module, alias) = match part.split_once(" as ") {
                        Some((module, alias)) => (module.trim(), Some(alias.trim().to_string())),
                        None => (part.trim(), None),
                    };
                    if module.is_empty() {
                        continue;
                    }
                    let local = alias
                        .clone()
                        .unwrap_or_else(|| module.split('.').next().unwrap_or(module).to_string());
                    imports.push(ImportInfo {
                        module: module.to_string(),
                        items: vec![ImportItem {
                            name: module.to_string(),
                            alias,
                            referenced: src.referenced_outside(&local, &skip),
                        }],
                        line,
                        is_relative: false,
                        is_type_only: false,
                    });
                }
            }
        }

        imports
    }

    fn exports(&self, src: &SourceText<'_>) -> Vec<ExportInfo> {
        let masked = src.masked();
        let mut exports = Vec::new();

        for l in 1..=src.line_count() {
            let text = src.masked_line(l);
            let Some(m) = ALL.find(text) else { continue };
            let open = src.line_start(l) + m.end() - 1;
            let close = src.matching_close(open).unwrap_or(src.len());
            for region in src.regions() {
                if region.kind != RegionKind::Str || region.start < open || region.end > close {
                    continue;
                }
                let name = &src.raw()[region.inner_start..region.inner_end];
                if name.is_empty() || exports.iter().any(|e: &ExportInfo| e.name == name) {
                    continue;
                }
                let kind = if masked.contains(&format!("def {}(", name)) {
                    ExportKind::Function
                } else if masked.contains(&format!("class {}", name)) {
                    ExportKind::Class
                } else {
                    ExportKind::Variable
                };
                exports.push(ExportInfo {
                    name: name.to_string(),
                    kind,
                    line: src.line_of(region.start),
                    source: None,
                });
            }
        }

        exports
    }

    fn classes(&self, src: &SourceText<'_>) -> Vec<ClassInfo> {
        let mut classes = Vec::new();

        for l in 1..=src.line_count() {
            let text = src.masked_line(l);
            let Some(caps) = CLASS.captures(text) else { continue };
            let (Some(name), Some(indent)) = (caps.get(2), caps.get(1)) else {
                continue;
            };
            let Some(colon) = src.header_colon(l) else { continue };
            let name_end = src.line_start(l) + name.end();
            let base_indent = indent_width(indent.as_str());

            let mut bases = Vec::new();
            let after_name = &src.masked()[name_end..colon];
            if after_name.trim_start().starts_with('(') {
                let open = name_end + after_name.find('(').unwrap_or(0);
                if let Some(close) = src.matching_close(open) {
                    bases = split_top_level(&src.raw()[open + 1..close], b',')
                        .into_iter()
                        .filter(|b| !b.contains('='))
                        .map(strip_subscript)
                        .filter(|b| !b.is_empty() && b != "object")
                        .collect();
                }
            }

            let end_line = src.indent_block_end(l);
            let header_end = src.line_of(colon);
            let class_name = name.as_str();

            let member_indent = (header_end + 1..=end_line)
                .map(|ml| src.masked_line(ml))
                .find(|t| !t.trim().is_empty())
                .map(indent_width)
                .filter(|&w| w > base_indent);

            let mut methods = Vec::new();
            let mut attributes: Vec<AttributeInfo> = Vec::new();

            if let Some(member_indent) = member_indent {
                for ml in header_end + 1..=end_line {
                    let line_text = src.masked_line(ml);
                    if line_text.trim().is_empty() || indent_width(line_text) != member_indent {
                        continue;
                    }
                    if let Some(def) = DEF.captures(line_text) {
                        let (Some(whole), Some(fname)) = (def.get(0), def.get(3)) else {
                            continue;
                        };
                        let paren = src.line_start(ml) + whole.end() - 1;
                        methods.push(self.build_def(
                            src,
                            ml,
                            paren,
                            fname.as_str(),
                            def.get(2).is_some(),
                            Some(class_name),
                        ));
                        continue;
                    }
                    if let Some(assign) = ASSIGN.captures(line_text.trim_start()) {
                        let (Some(attr), value) = (assign.get(1), assign.get(3)) else {
                            continue;
                        };
                        if value.map(|v| v.as_str().starts_with('=')).unwrap_or(false)
                            || is_block_word(attr.as_str())
                        {
                            continue;
                        }
                        if attributes.iter().any(|a| a.name == attr.as_str()) {
                            continue;
                        }
                        attributes.push(AttributeInfo {
                            name: attr.as_str().to_string(),
                            line: ml,
                            data_type: assign.get(2).map(|t| t.as_str().trim().to_string()),
                            visibility: python_visibility(attr.as_str(), true),
                            is_static: true,
                        });
                    }
                }

                for ml in header_end + 1..=end_line {
                    let line_text = src.masked_line(ml);
                    for caps in SELF_ATTR.captures_iter(line_text) {
                        let Some(attr) = caps.get(1) else { continue };
                        if attributes.iter().any(|a| a.name == attr.as_str())
                            || methods.iter().any(|m: &FunctionInfo| m.name == attr.as_str())
                        {
                            continue;
                        }
                        attributes.push(AttributeInfo {
                            name: attr.as_str().to_string(),
                            line: ml,
                            data_type: caps.get(2).map(|t| t.as_str().trim().to_string()),
                            visibility: python_visibility(attr.as_str(), true),
                            is_static: false,
                        });
                    }
                }
            }

            let kind = if bases.iter().any(|b| b.ends_with("Protocol")) {
                ClassKind::Interface
            } else if bases
                .iter()
                .any(|b| matches!(b.rsplit('.').next(), Some("Enum" | "IntEnum" | "StrEnum" | "Flag")))
            {
                ClassKind::Enum
            } else {
                ClassKind::Class
            };
            let is_abstract = bases.iter().any(|b| b == "ABC" || b.ends_with(".ABC"))
                || methods.iter().any(|m| m.has_modifier("abstract"));

            let mut bases = bases.into_iter();
            let extends = bases.next();
            let implements: Vec<String> = bases.collect();
            let preamble = src.preamble(l);

            classes.push(ClassInfo {
                name: class_name.to_string(),
                kind,
                line: l,
                end_line,
                visibility: python_visibility(class_name, false),
                is_exported: false,
                is_abstract,
                extends,
                implements,
                decorators: preamble.decorators,
                documentation: src.python_docstring(header_end).or(preamble.documentation),
                methods,
                attributes,
            });
        }

        classes
    }

    fn functions(&self, src: &SourceText<'_>) -> Vec<FunctionInfo> {
        let mut functions = Vec::new();

        for l in 1..=src.line_count() {
            let text = src.masked_line(l);
            if let Some(def) = DEF.captures(text) {
                let (Some(whole), Some(indent), Some(name)) = (def.get(0), def.get(1), def.get(3))
                else {
                    continue;
                };
                // Indented defs are methods or nested helpers.
                if !indent.as_str().is_empty() {
                    continue;
                }
                let paren = src.line_start(l) + whole.end() - 1;
                functions.push(self.build_def(
                    src,
                    l,
                    paren,
                    name.as_str(),
                    def.get(2).is_some(),
                    None,
                ));
                continue;
            }

            if let Some(lambda) = LAMBDA.captures(text) {
                let (Some(whole), Some(name), Some(params)) = (lambda.get(0), lambda.get(1), lambda.get(2))
                else {
                    continue;
                };
                let mut function = FunctionInfo::new(name.as_str(), FunctionKind::Closure, l, l);
                function.parameters = parse_parameters(params.as_str(), Syntax::Python);
                function.visibility = python_visibility(name.as_str(), false);
                let body_start = src.line_start(l) + whole.end();
                analyze_body(src, body_start, src.line_end(l)).apply(&mut function);
                functions.push(function);
            }
        }

        functions
    }

    fn variables(&self, src: &SourceText<'_>) -> Vec<VariableInfo> {
        let mut variables: Vec<VariableInfo> = Vec::new();

        for l in 1..=src.line_count() {
            let text = src.masked_line(l);
            if text.starts_with(char::is_whitespace) || text.trim().is_empty() {
                continue;
            }
            if LAMBDA.is_match(text) {
                continue;
            }
            let Some(caps) = ASSIGN.captures(text) else { continue };
            let (Some(name), Some(value)) = (caps.get(1), caps.get(3)) else {
                continue;
            };
            let name = name.as_str();
            if value.as_str().starts_with('=') || is_dunder(name) || is_block_word(name) {
                continue;
            }
            if variables.iter().any(|v| v.name == name) {
                continue;
            }
            let raw_value = src.raw_line(l).get(value.start()..).unwrap_or("").trim();

            variables.push(VariableInfo {
                name: name.to_string(),
                kind: if constant_like(name) {
                    VariableKind::Constant
                } else {
                    VariableKind::Variable
                },
                line: l,
                data_type: caps.get(2).map(|t| t.as_str().trim().to_string()),
                visibility: python_visibility(name, false),
                is_exported: false,
                value: (!raw_value.is_empty()).then(|| truncate(raw_value, 120)),
                documentation: None,
            });
        }

        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_functions_by_indentation() {
        let source = "def f():\n    x=1\n    y=2\ndef g():\n    pass";
        let functions = PythonParser::new().extract_functions(source);
        assert_eq!(functions.len(), 2);
        assert_eq!((functions[0].name.as_str(), functions[0].line, functions[0].end_line), ("f", 1, 3));
        assert_eq!((functions[1].name.as_str(), functions[1].line, functions[1].end_line), ("g", 4, 5));
    }

    #[test]
    fn test_methods_are_not_top_level_functions() {
        let source = "class A:\n    def f():\n        x=1\n        y=2\n    def g():\n        pass";
        let parser = PythonParser::new();
        assert!(parser.extract_functions(source).is_empty());

        let classes = parser.extract_classes(source);
        assert_eq!(classes.len(), 1);
        let names: Vec<_> = classes[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["f", "g"]);
        assert_eq!(classes[0].methods[0].end_line, 4);
        assert_eq!(classes[0].end_line, 6);
    }

    #[test]
    fn test_imports_with_aliases() {
        let source = r#"import os
import numpy as np, sys
from .models import (
    User,
    Order as PurchaseOrder,
)
from typing import *

def run():
    return np.array(os.listdir(".")), User
"#;
        let imports = PythonParser::new().extract_imports(source);
        let modules: Vec<_> = imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "numpy", "sys", ".models", "typing"]);

        assert!(imports[0].items[0].referenced);
        assert_eq!(imports[1].items[0].alias.as_deref(), Some("np"));
        assert!(imports[1].items[0].referenced);
        assert!(!imports[2].items[0].referenced);

        let models = &imports[3];
        assert!(models.is_relative);
        assert_eq!(models.line, 3);
        assert_eq!(models.items.len(), 2);
        assert!(models.items[0].referenced);
        assert_eq!(models.items[1].local_name(), "PurchaseOrder");
        assert!(!models.items[1].referenced);
        assert!(imports[4].items[0].referenced);
    }

    #[test]
    fn test_class_details() {
        let source = r#"
@dataclass
class UserService(BaseService, LoggingMixin):
    """Manages users."""

    MAX_USERS = 100

    def __init__(self, repo: Repo):
        self.repo = repo
        self._cache = {}

    @staticmethod
    def validate(name: str) -> bool:
        if not name or len(name) > 10:
            return False
        return True

    async def load(self, user_id):
        return await self.repo.get(user_id)


def helper():
    pass
"#;
        let classes = PythonParser::new().extract_classes(source);
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.line, 3);
        assert_eq!(class.end_line, 19);
        assert_eq!(class.extends.as_deref(), Some("BaseService"));
        assert_eq!(class.implements, vec!["LoggingMixin"]);
        assert_eq!(class.decorators, vec!["dataclass"]);
        assert_eq!(class.documentation.as_deref(), Some("Manages users."));

        let attrs: Vec<_> = class.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attrs, vec!["MAX_USERS", "repo", "_cache"]);
        assert_eq!(class.attributes[2].visibility, Visibility::Protected);

        let init = &class.methods[0];
        assert_eq!(init.kind, FunctionKind::Constructor);
        assert_eq!(init.parameters.len(), 1);
        assert_eq!(init.parameters[0].data_type.as_deref(), Some("Repo"));

        let validate = &class.methods[1];
        assert!(validate.is_static);
        assert_eq!(validate.return_type.as_deref(), Some("bool"));
        assert_eq!(validate.complexity, 3);

        let load = &class.methods[2];
        assert!(load.is_async);
        assert!(load.calls.iter().any(|c| c.target == "get" && c.is_awaited));
    }

    #[test]
    fn test_exports_from_all() {
        let source = "__all__ = ['run', \"Config\", 'VERSION']\n\nVERSION = '1'\n\nclass Config:\n    pass\n\ndef run():\n    pass\n";
        let parser = PythonParser::new();
        let exports = parser.extract_exports(source);
        let kinds: Vec<_> = exports.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("run", ExportKind::Function),
                ("Config", ExportKind::Class),
                ("VERSION", ExportKind::Variable)
            ]
        );

        let file = parser.parse_file("pkg/mod.py", crate::analysis::Language::Python, source);
        assert!(file.functions[0].is_exported);
        assert!(file.classes[0].is_exported);
        assert!(file.variables[0].is_exported);
    }

    #[test]
    fn test_module_variables_and_lambdas() {
        let source = "DEBUG = True\ntimeout: int = 30\nsquare = lambda x: x * x\n\ndef f():\n    local = 1\nif DEBUG:\n    nested = 2\n";
        let parser = PythonParser::new();
        let variables = parser.extract_variables(source);
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["DEBUG", "timeout"]);
        assert_eq!(variables[0].kind, VariableKind::Constant);
        assert_eq!(variables[1].data_type.as_deref(), Some("int"));
        assert_eq!(variables[1].value.as_deref(), Some("30"));

        let functions = parser.extract_functions(source);
        assert_eq!(functions[0].name, "square");
        assert_eq!(functions[0].kind, FunctionKind::Closure);
    }
}
