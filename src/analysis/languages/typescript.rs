//! TypeScript and JavaScript parser.
//!
//! One implementation serves both dialects; JavaScript simply never carries
//! type annotations, so the optional type groups stay empty.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::facts::{
    AttributeInfo, ClassInfo, ClassKind, ExportInfo, ExportKind, FunctionInfo, FunctionKind,
    ImportInfo, ImportItem, VariableInfo, VariableKind, Visibility,
};
use crate::analysis::text::{
    analyze_body, head, is_keyword, parse_parameters, split_top_level, truncate, SourceText,
    Syntax,
};
use crate::analysis::LanguageParser;

lazy_static! {
    static ref IMPORT_FROM: Regex =
        Regex::new(r#"\bimport\s+(type\s+)?([^;'"`]*?)\s*\bfrom\s*['"`]"#).unwrap();
    static ref IMPORT_BARE: Regex = Regex::new(r#"\bimport\s*\(?\s*['"`]"#).unwrap();
    static ref REQUIRE: Regex = Regex::new(
        r#"(?:\b(?:const|let|var)\s+([^=;]+?)\s*=\s*)?\brequire\s*\(\s*['"`]"#
    )
    .unwrap();
    static ref EXPORT_FROM: Regex = Regex::new(
        r#"\bexport\s+(type\s+)?(\*(?:\s+as\s+[A-Za-z_$][\w$]*)?|\{[^}]*\})\s*from\s*['"`]"#
    )
    .unwrap();
    static ref EXPORT_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*export\s+(default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(function\*?|class|interface|type|enum|const|let|var|namespace)\s+([A-Za-z_$][\w$]*)"
    )
    .unwrap();
    static ref EXPORT_DEFAULT: Regex =
        Regex::new(r"(?m)^[ \t]*export\s+default\s+([A-Za-z_$][\w$]*)?").unwrap();
    static ref EXPORT_LIST: Regex =
        Regex::new(r"(?m)^[ \t]*export\s+(?:type\s+)?\{([^}]*)\}\s*(from)?").unwrap();
    static ref CJS_OBJECT: Regex =
        Regex::new(r"\bmodule\.exports\s*=\s*\{([^}]*)\}").unwrap();
    static ref CJS_SINGLE: Regex =
        Regex::new(r"\bmodule\.exports\s*=\s*([A-Za-z_$][\w$]*)\s*;?\s*$").unwrap();
    static ref CJS_NAMED: Regex =
        Regex::new(r"\b(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*=[^=]").unwrap();
    static ref CLASS_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*((?:(?:export|default|declare|abstract|const)\s+)*)(class|interface|enum)\s+([A-Za-z_$][\w$]*)"
    )
    .unwrap();
    static ref TYPE_ALIAS: Regex = Regex::new(
        r"(?m)^[ \t]*((?:(?:export|declare)\s+)*)type\s+([A-Za-z_$][\w$]*)\s*(?:<[^=]*?>)?\s*="
    )
    .unwrap();
    static ref EXTENDS: Regex =
        Regex::new(r"\bextends\s+([\s\S]+?)(?:\bimplements\b|$)").unwrap();
    static ref IMPLEMENTS: Regex = Regex::new(r"\bimplements\s+([\s\S]+)$").unwrap();
    static ref METHOD: Regex = Regex::new(
        r"^\s*((?:(?:public|private|protected|static|async|abstract|override|readonly|declare|get|set)\s+)*)(\*\s*)?(#?[A-Za-z_$][\w$]*)\s*\??\s*(?:<[^(]*>)?\s*\("
    )
    .unwrap();
    static ref ARROW_PROPERTY: Regex = Regex::new(
        r"^\s*((?:(?:public|private|protected|static|readonly|override)\s+)*)(#?[A-Za-z_$][\w$]*)\s*(?::[^=]*)?=\s*(async\s+)?(\(|[A-Za-z_$][\w$]*\s*=>)"
    )
    .unwrap();
    static ref PROPERTY: Regex = Regex::new(
        r"^\s*((?:(?:public|private|protected|static|readonly|declare|override)\s+)*)(#?[A-Za-z_$][\w$]*)\s*[?!]?\s*(?::\s*([^=;]+?))?\s*(?:=|;|$)"
    )
    .unwrap();
    static ref ENUM_MEMBER: Regex =
        Regex::new(r"^\s*([A-Za-z_$][\w$]*)\s*(?:=|,|$)").unwrap();
    static ref FUNCTION_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*((?:export\s+)?(?:default\s+)?(?:declare\s+)?)(async\s+)?function\s*(\*)?\s*([A-Za-z_$][\w$]*)?\s*(?:<[^(]*?>)?\s*\("
    )
    .unwrap();
    static ref ARROW_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]*)?=\s*(async\s+)?(function\b[^(]*)?(\(|[A-Za-z_$][\w$]*\s*=>)"
    )
    .unwrap();
    static ref VARIABLE_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(export\s+)?(?:declare\s+)?(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*([^=;\n]+))?\s*(?:=\s*([^;\n]*))?"
    )
    .unwrap();
    static ref HANDLER_NAME: Regex = Regex::new(r"^(?:handle|on)[A-Z]").unwrap();
}

/// Parser for TypeScript and JavaScript sources.
pub struct TypeScriptParser {
    javascript: bool,
}

impl TypeScriptParser {
    pub fn new() -> Self {
        Self { javascript: false }
    }

    /// The same parser registered for JavaScript extensions.
    pub fn javascript() -> Self {
        Self { javascript: true }
    }

    /// Byte spans of closed class bodies, used to keep members out of
    /// top-level function extraction.
    fn class_spans(&self, src: &SourceText<'_>) -> Vec<(usize, usize)> {
        CLASS_DECL
            .captures_iter(src.masked())
            .filter_map(|caps| {
                let name = caps.get(3)?;
                let span = src.brace_body(name.end());
                span.open
                    .filter(|_| span.terminated)
                    .map(|open| (open, span.end))
            })
            .collect()
    }

    fn members(
        &self,
        src: &SourceText<'_>,
        class_name: &str,
        kind: ClassKind,
        open: usize,
        close: usize,
    ) -> (Vec<FunctionInfo>, Vec<AttributeInfo>) {
        let mut methods = Vec::new();
        let mut attributes = Vec::new();
        let open_line = src.line_of(open);
        let close_line = src.line_of(close);
        let member_depth = src.depth_at_line(open_line) + 1;

        for l in open_line + 1..=close_line {
            if src.depth_at_line(l) != member_depth {
                continue;
            }
            let text = src.masked_line(l);
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('}') || trimmed.starts_with('@') {
                continue;
            }
            let line_start = src.line_start(l);

            if kind == ClassKind::Enum {
                if let Some(name) = ENUM_MEMBER.captures(text).and_then(|c| c.get(1)) {
                    attributes.push(AttributeInfo {
                        name: name.as_str().to_string(),
                        line: l,
                        data_type: None,
                        visibility: Visibility::Public,
                        is_static: true,
                    });
                }
                continue;
            }

            if let Some(caps) = METHOD.captures(text) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(3)) else {
                    continue;
                };
                if is_keyword(name.as_str()) && !matches!(name.as_str(), "get" | "set" | "delete") {
                    continue;
                }
                let modifiers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let paren = line_start + whole.end() - 1;
                let mut method =
                    self.callable(src, name.as_str(), l, paren, true, modifiers.contains("async"));
                apply_member_modifiers(&mut method, modifiers, name.as_str());
                if caps.get(2).is_some() {
                    method.modifiers.push("generator".to_string());
                }
                if kind == ClassKind::Interface && !method.has_modifier("abstract") {
                    method.modifiers.push("abstract".to_string());
                }
                method.parent_class = Some(class_name.to_string());
                methods.push(method);
                continue;
            }

            if let Some(caps) = ARROW_PROPERTY.captures(text) {
                let (Some(whole), Some(name), Some(head)) = (caps.get(0), caps.get(2), caps.get(4))
                else {
                    continue;
                };
                let modifiers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let head_at = line_start + head.start();
                if let Some(mut method) = self.arrow(
                    src,
                    name.as_str(),
                    l,
                    head_at,
                    line_start + whole.end(),
                    caps.get(3).is_some(),
                    true,
                ) {
                    apply_member_modifiers(&mut method, modifiers, name.as_str());
                    method.parent_class = Some(class_name.to_string());
                    methods.push(method);
                    continue;
                }
            }

            if let Some(caps) = PROPERTY.captures(text) {
                let Some(name) = caps.get(2) else { continue };
                if is_keyword(name.as_str()) {
                    continue;
                }
                let modifiers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let data_type = caps
                    .get(3)
                    .map(|t| src.raw()[line_start + t.start()..line_start + t.end()].trim().to_string())
                    .filter(|t| !t.is_empty());
                attributes.push(AttributeInfo {
                    name: name.as_str().trim_start_matches('#').to_string(),
                    line: l,
                    data_type,
                    visibility: member_visibility(modifiers, name.as_str()),
                    is_static: modifiers.contains("static"),
                });
            }
        }

        (methods, attributes)
    }

    /// Build a function or method whose parameter list opens at `paren`.
    fn callable(
        &self,
        src: &SourceText<'_>,
        name: &str,
        line: usize,
        paren: usize,
        is_method: bool,
        is_async: bool,
    ) -> FunctionInfo {
        let mut function = FunctionInfo::new(name, function_kind(name, is_method), line, line);
        function.is_async = is_async;

        let Some(close) = src.matching_close(paren) else {
            function.end_line = src.line_count().max(line);
            return function;
        };
        function.parameters = parse_parameters(&src.raw()[paren + 1..close], Syntax::TypeScript);
        function.return_type = return_type(src, close + 1);

        let span = src.brace_body(close + 1);
        function.end_line = src.line_of(span.end).max(line);
        if let Some(open) = span.open {
            fill_body(&mut function, src, open + 1, span.end);
        }

        let preamble = src.preamble(line);
        function.decorators = preamble.decorators;
        function.documentation = preamble.documentation;
        function
    }

    /// Build an arrow function or function expression.
    ///
    /// `params_at` is the offset of the parameter list (or single parameter)
    /// and `after_params` the end of the matched declaration text. Returns None
    /// when the initializer turns out not to be a function.
    #[allow(clippy::too_many_arguments)]
    fn arrow(
        &self,
        src: &SourceText<'_>,
        name: &str,
        line: usize,
        params_at: usize,
        after_params: usize,
        is_async: bool,
        is_method: bool,
    ) -> Option<FunctionInfo> {
        let masked = src.masked();
        let mut function = FunctionInfo::new(name, function_kind(name, is_method), line, line);
        function.is_async = is_async;

        let arrow_at = if masked.as_bytes().get(params_at) == Some(&b'(') {
            let close = src.matching_close(params_at)?;
            function.parameters = parse_parameters(&src.raw()[params_at + 1..close], Syntax::TypeScript);
            let window = head(&masked[close + 1..], 200);
            let arrow = window.find("=>")?;
            let between = window[..arrow].trim();
            if !(between.is_empty() || between.starts_with(':')) {
                return None;
            }
            if between.starts_with(':') {
                function.return_type = Some(
                    src.raw()[close + 1..close + 1 + arrow]
                        .trim()
                        .trim_start_matches(':')
                        .trim()
                        .to_string(),
                );
            }
            close + 1 + arrow
        } else {
            let arrow = masked[params_at..after_params].find("=>")? + params_at;
            let param = masked[params_at..arrow].trim();
            function.parameters = parse_parameters(param, Syntax::TypeScript);
            arrow
        };

        let body_from = arrow_at + 2;
        let end = src.expression_end(body_from);
        let open = masked[body_from..]
            .find(|c: char| !c.is_whitespace())
            .map(|p| body_from + p)
            .filter(|&p| masked.as_bytes()[p] == b'{');
        match open {
            Some(open) => fill_body(&mut function, src, open + 1, end),
            None => fill_body(&mut function, src, body_from, (end + 1).min(src.len())),
        }
        function.end_line = src.line_of(end).max(line);

        let preamble = src.preamble(line);
        function.decorators = preamble.decorators;
        function.documentation = preamble.documentation;
        Some(function)
    }

    /// Function expression `const f = function (...) {}`.
    fn function_expression(
        &self,
        src: &SourceText<'_>,
        name: &str,
        line: usize,
        paren: usize,
        is_async: bool,
    ) -> FunctionInfo {
        self.callable(src, name, line, paren, false, is_async)
    }
}

impl Default for TypeScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_body(function: &mut FunctionInfo, src: &SourceText<'_>, start: usize, end: usize) {
    analyze_body(src, start, end).apply(function);
}

fn function_kind(name: &str, is_method: bool) -> FunctionKind {
    if name == "constructor" {
        FunctionKind::Constructor
    } else if HANDLER_NAME.is_match(name) {
        FunctionKind::Handler
    } else if is_method {
        FunctionKind::Method
    } else {
        FunctionKind::Function
    }
}

fn member_visibility(modifiers: &str, name: &str) -> Visibility {
    if modifiers.contains("private") || name.starts_with('#') {
        Visibility::Private
    } else if modifiers.contains("protected") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn apply_member_modifiers(method: &mut FunctionInfo, modifiers: &str, name: &str) {
    method.visibility = member_visibility(modifiers, name);
    method.is_static = modifiers.contains("static");
    method.name = name.trim_start_matches('#').to_string();
    for word in modifiers.split_whitespace() {
        match word {
            "abstract" | "override" | "readonly" => method.modifiers.push(word.to_string()),
            "get" => method.modifiers.push("getter".to_string()),
            "set" => method.modifiers.push("setter".to_string()),
            _ => {}
        }
    }
}

/// Return type annotation following a parameter list closing at `after - 1`.
fn return_type(src: &SourceText<'_>, after: usize) -> Option<String> {
    let masked = &src.masked()[after..];
    let trimmed = masked.trim_start();
    if !trimmed.starts_with(':') {
        return None;
    }
    let start = after + (masked.len() - trimmed.len()) + 1;
    let end = src.masked()[start..]
        .find(['{', ';', '\n'])
        .map(|p| start + p)
        .unwrap_or(src.len());
    let end = src.masked()[start..end].find("=>").map(|p| start + p).unwrap_or(end);
    let text = src.raw()[start..end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Remove generic arguments (`Base<T>` -> `Base`).
fn strip_generics(s: &str) -> String {
    let mut out = String::new();
    let mut depth = 0;
    for c in s.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn heritage_list(text: &str) -> Vec<String> {
    split_top_level(text, b',')
        .into_iter()
        .map(strip_generics)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_import_clause(clause: &str) -> Vec<ImportItem> {
    let clause = clause.trim();
    let mut items = Vec::new();
    let (head, braces) = match clause.find('{') {
        Some(i) => (&clause[..i], Some(&clause[i + 1..])),
        None => (clause, None),
    };

    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(ns) = part.strip_prefix('*') {
            let alias = ns.trim().strip_prefix("as").map(|a| a.trim().to_string());
            items.push(ImportItem {
                name: "*".to_string(),
                alias,
                referenced: false,
            });
        } else {
            items.push(ImportItem {
                name: "default".to_string(),
                alias: Some(part.to_string()),
                referenced: false,
            });
        }
    }

    if let Some(braces) = braces {
        let inner = braces.split('}').next().unwrap_or("");
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let part = part.strip_prefix("type ").unwrap_or(part).trim();
            let item = match part.split_once(" as ") {
                Some((name, alias)) => ImportItem {
                    name: name.trim().to_string(),
                    alias: Some(alias.trim().to_string()),
                    referenced: false,
                },
                None => ImportItem {
                    name: part.to_string(),
                    alias: None,
                    referenced: false,
                },
            };
            items.push(item);
        }
    }

    items
}

fn is_relative_module(module: &str) -> bool {
    module.starts_with('.') || module.starts_with('/')
}

/// Guess the kind of a name exported through an export list.
fn guess_export_kind(masked: &str, name: &str) -> ExportKind {
    if masked.contains(&format!("function {}", name))
        || masked.contains(&format!("function* {}", name))
    {
        ExportKind::Function
    } else if masked.contains(&format!("class {}", name)) {
        ExportKind::Class
    } else if masked.contains(&format!("interface {}", name))
        || masked.contains(&format!("type {} ", name))
        || masked.contains(&format!("enum {}", name))
    {
        ExportKind::Type
    } else {
        ExportKind::Variable
    }
}

/// Whether an initializer (masked text after `=`) is a function value.
fn is_function_value(src: &SourceText<'_>, value_start: usize) -> bool {
    let masked = src.masked();
    let rest = masked[value_start..].trim_start();
    let rest = rest.strip_prefix("async").map(str::trim_start).unwrap_or(rest);
    if rest.starts_with("function") || rest.starts_with("class") {
        return true;
    }
    if rest.starts_with('(') {
        let paren = masked.len() - rest.len();
        return src
            .matching_close(paren)
            .map(|close| {
                let after = masked[close + 1..].trim_start();
                after.starts_with("=>") || after.starts_with(':') && head(after, 200).contains("=>")
            })
            .unwrap_or(false);
    }
    let ident_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$')
        .count();
    ident_len > 0 && rest[ident_len..].trim_start().starts_with("=>")
}

impl LanguageParser for TypeScriptParser {
    fn language_id(&self) -> &'static str {
        if self.javascript {
            "javascript"
        } else {
            "typescript"
        }
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        if self.javascript {
            &["js", "jsx", "mjs", "cjs"]
        } else {
            &["ts", "tsx", "mts", "cts"]
        }
    }

    fn syntax(&self) -> Syntax {
        Syntax::TypeScript
    }

    fn imports(&self, src: &SourceText<'_>) -> Vec<ImportInfo> {
        let masked = src.masked();
        let mut imports: Vec<(usize, ImportInfo)> = Vec::new();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut push = |start: usize, quote: usize, items: Vec<ImportItem>, type_only: bool| {
            let Some(module) = src.literal_at(quote) else {
                return;
            };
            if module.is_empty() {
                return;
            }
            let end = src.region_at(quote).map(|r| r.end).unwrap_or(quote + 1);
            spans.push((start, end));
            imports.push((
                start,
                ImportInfo {
                    module: module.to_string(),
                    items,
                    line: src.line_of(start),
                    is_relative: is_relative_module(module),
                    is_type_only: type_only,
                },
            ));
        };

        for caps in IMPORT_FROM.captures_iter(masked) {
            let Some(whole) = caps.get(0) else { continue };
            let clause = caps.get(2).map(|c| c.as_str()).unwrap_or("");
            push(
                whole.start(),
                whole.end() - 1,
                parse_import_clause(clause),
                caps.get(1).is_some(),
            );
        }
        for m in IMPORT_BARE.find_iter(masked) {
            push(m.start(), m.end() - 1, Vec::new(), false);
        }
        for caps in REQUIRE.captures_iter(masked) {
            let Some(whole) = caps.get(0) else { continue };
            let items = match caps.get(1).map(|b| b.as_str().trim()) {
                Some(binding) if binding.starts_with('{') => {
                    parse_import_clause(&binding.replace(':', " as "))
                }
                Some(binding) if !binding.is_empty() => vec![ImportItem {
                    name: "default".to_string(),
                    alias: Some(binding.to_string()),
                    referenced: false,
                }],
                _ => Vec::new(),
            };
            push(whole.start(), whole.end() - 1, items, false);
        }
        for caps in EXPORT_FROM.captures_iter(masked) {
            let Some(whole) = caps.get(0) else { continue };
            let clause = caps.get(2).map(|c| c.as_str()).unwrap_or("");
            push(
                whole.start(),
                whole.end() - 1,
                parse_import_clause(clause),
                caps.get(1).is_some(),
            );
        }

        imports.sort_by_key(|(start, _)| *start);
        imports.dedup_by_key(|(start, _)| *start);
        imports
            .into_iter()
            .map(|(_, mut import)| {
                for item in &mut import.items {
                    let local = item.local_name().to_string();
                    item.referenced = src.referenced_outside(&local, &spans);
                }
                import
            })
            .collect()
    }

    fn exports(&self, src: &SourceText<'_>) -> Vec<ExportInfo> {
        let masked = src.masked();
        let mut exports: Vec<ExportInfo> = Vec::new();
        let mut default_lines = Vec::new();
        let push = |exports: &mut Vec<ExportInfo>, export: ExportInfo| {
            if !exports
                .iter()
                .any(|e| e.name == export.name && e.kind == export.kind && e.line == export.line)
            {
                exports.push(export);
            }
        };

        for caps in EXPORT_DECL.captures_iter(masked) {
            let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let kind = match keyword.as_str().trim_end_matches('*') {
                "function" => ExportKind::Function,
                "class" => ExportKind::Class,
                "interface" | "type" | "enum" | "namespace" => ExportKind::Type,
                _ => ExportKind::Variable,
            };
            let line = src.line_of(whole.end() - 1);
            if caps.get(1).is_some() {
                default_lines.push(line);
            }
            push(
                &mut exports,
                ExportInfo {
                    name: name.as_str().to_string(),
                    kind,
                    line,
                    source: None,
                },
            );
        }

        for caps in EXPORT_DEFAULT.captures_iter(masked) {
            let Some(whole) = caps.get(0) else { continue };
            let line = src.line_of(whole.end().saturating_sub(1).max(whole.start()));
            if default_lines.contains(&line) {
                // Named default declaration, already recorded.
                continue;
            }
            let name = caps.get(1).map(|n| n.as_str()).unwrap_or("");
            let name = if name.is_empty() || is_keyword(name) {
                "default"
            } else {
                name
            };
            push(
                &mut exports,
                ExportInfo {
                    name: name.to_string(),
                    kind: ExportKind::Default,
                    line,
                    source: None,
                },
            );
        }

        for caps in EXPORT_LIST.captures_iter(masked) {
            let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let source = if caps.get(2).is_some() {
                masked[whole.end()..]
                    .find(['\'', '"', '`'])
                    .and_then(|p| src.literal_at(whole.end() + p))
                    .map(str::to_string)
            } else {
                None
            };
            for part in list.as_str().split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let part = part.strip_prefix("type ").unwrap_or(part);
                let (local, exported) = match part.split_once(" as ") {
                    Some((local, exported)) => (local.trim(), exported.trim()),
                    None => (part, part),
                };
                let kind = if source.is_some() {
                    ExportKind::ReExport
                } else if exported == "default" {
                    ExportKind::Default
                } else {
                    guess_export_kind(masked, local)
                };
                push(
                    &mut exports,
                    ExportInfo {
                        name: if kind == ExportKind::Default {
                            local.to_string()
                        } else {
                            exported.to_string()
                        },
                        kind,
                        line: src.line_of(whole.start()),
                        source: source.clone(),
                    },
                );
            }
        }

        for caps in EXPORT_FROM.captures_iter(masked) {
            let (Some(whole), Some(clause)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if !clause.as_str().starts_with('*') {
                continue;
            }
            let name = clause
                .as_str()
                .split_once(" as ")
                .map(|(_, alias)| alias.trim())
                .unwrap_or("*");
            push(
                &mut exports,
                ExportInfo {
                    name: name.to_string(),
                    kind: ExportKind::ReExport,
                    line: src.line_of(whole.start()),
                    source: src.literal_at(whole.end() - 1).map(str::to_string),
                },
            );
        }

        for caps in CJS_OBJECT.captures_iter(masked) {
            let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            for part in list.as_str().split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let name = part.split(':').next().unwrap_or("").trim();
                if name.is_empty() || name.starts_with("...") {
                    continue;
                }
                push(
                    &mut exports,
                    ExportInfo {
                        name: name.to_string(),
                        kind: guess_export_kind(masked, name),
                        line: src.line_of(whole.start()),
                        source: None,
                    },
                );
            }
        }
        for l in 1..=src.line_count() {
            let text = src.masked_line(l);
            if let Some(name) = CJS_SINGLE.captures(text).and_then(|c| c.get(1)) {
                push(
                    &mut exports,
                    ExportInfo {
                        name: name.as_str().to_string(),
                        kind: ExportKind::Default,
                        line: l,
                        source: None,
                    },
                );
            }
            if let Some(name) = CJS_NAMED.captures(text).and_then(|c| c.get(1)) {
                push(
                    &mut exports,
                    ExportInfo {
                        name: name.as_str().to_string(),
                        kind: guess_export_kind(masked, name.as_str()),
                        line: l,
                        source: None,
                    },
                );
            }
        }

        exports.sort_by_key(|e| e.line);
        exports
    }

    fn classes(&self, src: &SourceText<'_>) -> Vec<ClassInfo> {
        let masked = src.masked();
        let mut classes = Vec::new();

        for caps in CLASS_DECL.captures_iter(masked) {
            let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let span = src.brace_body(name.end());
            let Some(open) = span.open else { continue };
            let modifiers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let line = src.line_of(whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len()));
            let kind = match keyword.as_str() {
                "interface" => ClassKind::Interface,
                "enum" => ClassKind::Enum,
                _ => ClassKind::Class,
            };

            let header = &masked[name.end()..open];
            let extends_list = EXTENDS
                .captures(header)
                .and_then(|c| c.get(1))
                .map(|m| heritage_list(m.as_str()))
                .unwrap_or_default();
            let mut implements = IMPLEMENTS
                .captures(header)
                .and_then(|c| c.get(1))
                .map(|m| heritage_list(m.as_str()))
                .unwrap_or_default();
            let mut extends_iter = extends_list.into_iter();
            let extends = extends_iter.next();
            implements.extend(extends_iter);

            let (methods, attributes) = self.members(src, name.as_str(), kind, open, span.end);
            let preamble = src.preamble(line);
            let is_exported = modifiers.contains("export");

            classes.push(ClassInfo {
                name: name.as_str().to_string(),
                kind,
                line,
                end_line: src.line_of(span.end).max(line),
                visibility: if is_exported {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
                is_exported,
                is_abstract: modifiers.contains("abstract") || kind == ClassKind::Interface,
                extends,
                implements,
                decorators: preamble.decorators,
                documentation: preamble.documentation,
                methods,
                attributes,
            });
        }

        for caps in TYPE_ALIAS.captures_iter(masked) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let line = src.line_of(whole.end() - 1);
            if src.depth_at_line(line) > 0 {
                continue;
            }
            let end = src.expression_end(whole.end());
            let modifiers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let preamble = src.preamble(line);
            classes.push(ClassInfo {
                name: name.as_str().to_string(),
                kind: ClassKind::TypeAlias,
                line,
                end_line: src.line_of(end).max(line),
                visibility: Visibility::Public,
                is_exported: modifiers.contains("export"),
                is_abstract: false,
                extends: None,
                implements: Vec::new(),
                decorators: Vec::new(),
                documentation: preamble.documentation,
                methods: Vec::new(),
                attributes: Vec::new(),
            });
        }

        classes.sort_by_key(|c| c.line);
        classes
    }

    fn functions(&self, src: &SourceText<'_>) -> Vec<FunctionInfo> {
        let masked = src.masked();
        let excluded = self.class_spans(src);
        let mut candidates: Vec<(usize, FunctionInfo)> = Vec::new();

        for caps in FUNCTION_DECL.captures_iter(masked) {
            let Some(whole) = caps.get(0) else { continue };
            let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let name = match caps.get(4) {
                Some(name) => name.as_str(),
                None if prefix.contains("default") => "default",
                None => continue,
            };
            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            let line = src.line_of(start);
            let mut function =
                self.callable(src, name, line, whole.end() - 1, false, caps.get(2).is_some());
            function.is_exported = prefix.contains("export");
            if caps.get(3).is_some() {
                function.modifiers.push("generator".to_string());
            }
            candidates.push((start, function));
        }

        for caps in ARROW_DECL.captures_iter(masked) {
            let (Some(whole), Some(name), Some(head)) = (caps.get(0), caps.get(2), caps.get(5)) else {
                continue;
            };
            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            let line = src.line_of(start);
            let is_async = caps.get(3).is_some();
            let function = if caps.get(4).is_some() {
                Some(self.function_expression(src, name.as_str(), line, head.start(), is_async))
            } else {
                self.arrow(src, name.as_str(), line, head.start(), whole.end(), is_async, false)
            };
            if let Some(mut function) = function {
                function.is_exported = caps.get(1).is_some();
                candidates.push((start, function));
            }
        }

        candidates.sort_by_key(|(start, _)| *start);
        let mut accepted: Vec<(usize, usize)> = Vec::new();
        let mut functions = Vec::new();
        for (start, mut function) in candidates {
            let inside = |spans: &[(usize, usize)]| spans.iter().any(|&(a, b)| start > a && start < b);
            if inside(&excluded) || inside(&accepted) {
                continue;
            }
            let end = src.line_end(function.end_line);
            // A body that never closes runs to the end of the file and must
            // not swallow the declarations after it.
            if !src.has_unclosed(start, end) {
                accepted.push((start, end));
            }
            function.visibility = if function.is_exported {
                Visibility::Public
            } else {
                Visibility::Private
            };
            functions.push(function);
        }
        functions
    }

    fn variables(&self, src: &SourceText<'_>) -> Vec<VariableInfo> {
        let masked = src.masked();
        let mut variables = Vec::new();

        for caps in VARIABLE_DECL.captures_iter(masked) {
            let (Some(keyword), Some(name)) = (caps.get(2), caps.get(3)) else {
                continue;
            };
            let line = src.line_of(keyword.start());
            if src.depth_at_line(line) > 0 {
                continue;
            }
            if let Some(value) = caps.get(5) {
                if is_function_value(src, value.start())
                    || masked[value.start()..].trim_start().starts_with("require")
                {
                    continue;
                }
            }
            let is_exported = caps.get(1).is_some();
            let data_type = caps
                .get(4)
                .map(|t| src.raw()[t.start()..t.end()].trim().to_string())
                .filter(|t| !t.is_empty());
            let value = caps.get(5).map(|v| {
                let end = src.line_end(src.line_of(v.start()));
                truncate(src.raw()[v.start()..end].trim().trim_end_matches(';'), 120)
            });
            let preamble = src.preamble(line);
            variables.push(VariableInfo {
                name: name.as_str().to_string(),
                kind: if keyword.as_str() == "const" {
                    VariableKind::Constant
                } else {
                    VariableKind::Variable
                },
                line,
                data_type,
                visibility: if is_exported {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
                is_exported,
                value: value.filter(|v| !v.is_empty()),
                documentation: preamble.documentation,
            });
        }

        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TypeScriptParser {
        TypeScriptParser::new()
    }

    #[test]
    fn test_imports() {
        let source = r#"
import React, { useState as useLocalState, type FC } from 'react';
import * as path from "path";
import './styles.css';
import { helper } from '../utils/helper';
const fs = require('fs');

export function App(): FC {
    const [x] = useLocalState(path.join('a'));
    return fs;
}
"#;
        let imports = parser().extract_imports(source);
        let modules: Vec<_> = imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["react", "path", "./styles.css", "../utils/helper", "fs"]);

        let react = &imports[0];
        assert_eq!(react.items.len(), 3);
        assert_eq!(react.items[0].local_name(), "React");
        assert!(!react.items[0].referenced);
        assert_eq!(react.items[1].name, "useState");
        assert!(react.items[1].referenced);
        assert!(react.items[2].referenced);

        assert!(imports[1].items[0].referenced);
        assert!(imports[3].is_relative);
        assert!(!imports[3].items[0].referenced);
        assert!(imports[4].items[0].referenced);
    }

    #[test]
    fn test_exports() {
        let source = r#"
export const API_URL = "x";
export default class Store {}
export async function load() {}
export interface Props { a: string }
function local() {}
export { local, local as renamed };
export * from './types';
"#;
        let exports = parser().extract_exports(source);
        let names: Vec<_> = exports.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert!(names.contains(&("API_URL", ExportKind::Variable)));
        assert!(names.contains(&("Store", ExportKind::Class)));
        assert!(names.contains(&("load", ExportKind::Function)));
        assert!(names.contains(&("Props", ExportKind::Type)));
        assert!(names.contains(&("local", ExportKind::Function)));
        assert!(names.contains(&("renamed", ExportKind::Function)));
        let star = exports.iter().find(|e| e.kind == ExportKind::ReExport).unwrap();
        assert_eq!(star.source.as_deref(), Some("./types"));
    }

    #[test]
    fn test_class_with_members() {
        let source = r#"
/** User service. */
@Injectable()
export class UserService extends BaseService<User> implements OnInit, Disposable {
    private readonly cache: Map<string, User> = new Map();
    static count = 0;

    constructor(private repo: UserRepository) {
        super();
    }

    async findUser(id: string): Promise<User> {
        if (this.cache.has(id)) {
            return this.cache.get(id);
        }
        return await this.repo.find(id);
    }

    handleClick = (event: Event) => {
        this.findUser(event.id);
    };

    get size(): number {
        return this.cache.size;
    }
}
"#;
        let classes = parser().extract_classes(source);
        assert_eq!(classes.len(), 1);
        let class = &classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.line, 4);
        assert_eq!(class.end_line, 26);
        assert_eq!(class.extends.as_deref(), Some("BaseService"));
        assert_eq!(class.implements, vec!["OnInit", "Disposable"]);
        assert_eq!(class.decorators, vec!["Injectable()"]);
        assert_eq!(class.documentation.as_deref(), Some("User service."));
        assert!(class.is_exported);

        let names: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["constructor", "findUser", "handleClick", "size"]);
        assert_eq!(class.methods[0].kind, FunctionKind::Constructor);
        assert_eq!(class.methods[0].parameters[0].name, "repo");

        let find = &class.methods[1];
        assert!(find.is_async);
        assert_eq!(find.return_type.as_deref(), Some("Promise<User>"));
        assert_eq!(find.line, 12);
        assert_eq!(find.end_line, 17);
        assert_eq!(find.complexity, 2);
        assert!(find.calls.iter().any(|c| c.target == "find" && c.is_awaited));

        assert_eq!(class.methods[2].kind, FunctionKind::Handler);
        assert!(class.methods[3].has_modifier("getter"));

        let attrs: Vec<_> = class.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attrs, vec!["cache", "count"]);
        assert_eq!(class.attributes[0].visibility, Visibility::Private);
        assert!(class.attributes[1].is_static);
    }

    #[test]
    fn test_top_level_functions_skip_members_and_nested() {
        let source = r#"
export function outer(a: number) {
    function inner() { return a; }
    return inner();
}

const double = (x: number): number => x * 2;
export const fetchAll = async () => {
    await Promise.all([]);
};
const notAFunction = (1 + 2) * 3;

class A {
    method() {}
}
"#;
        let functions = parser().extract_functions(source);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "double", "fetchAll"]);
        assert!(functions[0].is_exported);
        assert_eq!(functions[0].end_line, 5);
        assert_eq!(functions[1].return_type.as_deref(), Some("number"));
        assert_eq!(functions[1].line, 7);
        assert_eq!(functions[1].end_line, 7);
        assert!(functions[2].is_async);
        assert_eq!(functions[2].end_line, 10);
    }

    #[test]
    fn test_variables_exclude_functions_and_nested() {
        let source = r#"
export const MAX_RETRIES: number = 3;
let counter = 0;
const handler = () => {};
const fs = require('fs');
function f() {
    const local = 1;
}
"#;
        let variables = parser().extract_variables(source);
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["MAX_RETRIES", "counter"]);
        assert_eq!(variables[0].kind, VariableKind::Constant);
        assert_eq!(variables[0].data_type.as_deref(), Some("number"));
        assert_eq!(variables[0].value.as_deref(), Some("3"));
        assert!(variables[0].is_exported);
        assert_eq!(variables[1].kind, VariableKind::Variable);
    }

    #[test]
    fn test_braces_in_strings_do_not_break_blocks() {
        let source = "function f() {\n  const s = \"}}}\";\n  // {\n  return s;\n}\nfunction g() {}\n";
        let functions = parser().extract_functions(source);
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].end_line, 5);
    }

    #[test]
    fn test_unterminated_function_runs_to_eof() {
        let source = "function broken() {\n  if (x) {\n    y();\n";
        let functions = parser().extract_functions(source);
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].end_line, 3);
    }

    #[test]
    fn test_unterminated_function_keeps_later_declarations() {
        let source = "function f() {\n  x();\n\nfunction g() { return 1; }\nconst k = 2;\nclass C { m() {} }\n";
        let functions = parser().extract_functions(source);
        let names: Vec<_> = functions.iter().map(|f| (f.name.as_str(), f.line)).collect();
        assert_eq!(names, vec![("f", 1), ("g", 4)]);
        assert_eq!(functions[0].end_line, 6);
        assert_eq!(functions[1].end_line, 4);

        let variables = parser().extract_variables(source);
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["k"]);

        let classes = parser().extract_classes(source);
        assert!(classes.iter().any(|c| c.name == "C"));
    }

    #[test]
    fn test_unterminated_class_keeps_later_declarations() {
        let source = "class A {\n  m() {\n\nfunction g() { return 1; }\nconst k = 2;\n";
        let functions = parser().extract_functions(source);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["g"]);

        let variables = parser().extract_variables(source);
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["k"]);
    }

    #[test]
    fn test_regex_literal_braces_do_not_break_blocks() {
        let source = "function f(s) {\n  return s.replace(/[{]/g, '');\n}\nfunction g() { return 1; }\nconst RE = /\\{/;\nconst k = 2;\n";
        let functions = parser().extract_functions(source);
        let names: Vec<_> = functions.iter().map(|f| (f.name.as_str(), f.end_line)).collect();
        assert_eq!(names, vec![("f", 3), ("g", 4)]);

        let variables = parser().extract_variables(source);
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["RE", "k"]);
    }
}
