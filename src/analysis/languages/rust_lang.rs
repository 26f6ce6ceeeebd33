//! Rust parser.
//!
//! Extracts:
//! - `use` trees, flattened and grouped by parent path
//! - `mod foo;` declarations as relative imports
//! - Struct, enum, union and trait definitions with fields and variants
//! - Impl methods, attached to a type declared in the same file
//! - Free functions, constants and statics

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::facts::{
    AttributeInfo, ClassInfo, ClassKind, ExportInfo, ExportKind, FunctionInfo, FunctionKind,
    ImportInfo, ImportItem, VariableInfo, VariableKind, Visibility,
};
use crate::analysis::text::{
    analyze_body, parse_parameters, split_top_level, truncate, word_offsets, BodySpan, SourceText,
    Syntax,
};
use crate::analysis::LanguageParser;

lazy_static! {
    static ref USE: Regex =
        Regex::new(r"(?m)^[ \t]*(pub(?:\s*\([^)]*\))?\s+)?use\s+").unwrap();
    static ref MOD_DECL: Regex =
        Regex::new(r"(?m)^[ \t]*(?:pub(?:\s*\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)\s*;").unwrap();
    static ref FN: Regex = Regex::new(
        r#"(?m)^[ \t]*(pub(?:\s*\([^)]*\))?\s+)?((?:(?:default|const|async|unsafe|extern(?:\s+"[^"]*")?)\s+)*)fn\s+([A-Za-z_]\w*)"#
    )
    .unwrap();
    static ref TYPE_DECL: Regex = Regex::new(
        r"(?m)^[ \t]*(pub(?:\s*\([^)]*\))?\s+)?(?:(?:unsafe|auto)\s+)*(struct|enum|union|trait|type)\s+([A-Za-z_]\w*)"
    )
    .unwrap();
    static ref IMPL: Regex = Regex::new(r"(?m)^[ \t]*(?:unsafe\s+)?impl\b").unwrap();
    static ref CONST_STATIC: Regex = Regex::new(
        r"(?m)^[ \t]*(pub(?:\s*\([^)]*\))?\s+)?(const|static)\s+(mut\s+)?([A-Za-z_]\w*)\s*:\s*([^=;]+?)\s*(?:=\s*([^;]*))?;"
    )
    .unwrap();
    static ref FIELD: Regex = Regex::new(
        r"(?s)^(?:#\[.*?\]\s*)*(pub(?:\s*\([^)]*\))?\s+)?([A-Za-z_]\w*)\s*:\s*(.+)$"
    )
    .unwrap();
    static ref VARIANT: Regex =
        Regex::new(r"(?s)^(?:#\[.*?\]\s*)*([A-Za-z_]\w*)\s*(.*)$").unwrap();
}

/// A `fn` declaration found anywhere in the file.
struct FnDecl {
    start: usize,
    line: usize,
    name: String,
    visibility: Visibility,
    qualifiers: String,
    paren: Option<usize>,
    body: BodySpan,
}

impl FnDecl {
    fn body_range(&self) -> Option<(usize, usize)> {
        self.body.open.map(|open| (open, self.body.end))
    }
}

/// An `impl` block and the type it implements for.
struct ImplBlock {
    open: usize,
    end: usize,
    self_type: String,
    trait_name: Option<String>,
}

/// A `trait` definition body.
struct TraitBlock {
    open: usize,
    end: usize,
}

/// Everything the per-kind operations need, scanned once per call.
struct Items {
    fns: Vec<FnDecl>,
    impls: Vec<ImplBlock>,
    traits: Vec<TraitBlock>,
}

impl Items {
    fn scan(src: &SourceText<'_>) -> Self {
        Self {
            fns: scan_fns(src),
            impls: scan_impls(src),
            traits: scan_traits(src),
        }
    }

    /// Whether `offset` lies inside the body of some function. Bodies that
    /// never close do not contain anything.
    fn in_fn_body(&self, offset: usize) -> bool {
        self.fns
            .iter()
            .filter(|decl| decl.body.terminated)
            .filter_map(FnDecl::body_range)
            .any(|(open, end)| open < offset && offset < end)
    }

    fn impl_at(&self, offset: usize) -> Option<&ImplBlock> {
        self.impls
            .iter()
            .find(|i| i.open < offset && offset < i.end)
    }

    fn trait_at(&self, offset: usize) -> Option<&TraitBlock> {
        self.traits
            .iter()
            .find(|t| t.open < offset && offset < t.end)
    }

    /// Whether `offset` sits at item level, outside bodies, impls and traits.
    fn is_item_level(&self, offset: usize) -> bool {
        !self.in_fn_body(offset) && self.impl_at(offset).is_none() && self.trait_at(offset).is_none()
    }
}

/// Parser for Rust sources.
pub struct RustParser;

impl RustParser {
    pub fn new() -> Self {
        Self
    }

    fn build_fn(
        &self,
        src: &SourceText<'_>,
        decl: &FnDecl,
        parent: Option<&str>,
        trait_impl: bool,
        in_trait: bool,
    ) -> FunctionInfo {
        let kind = if parent.is_some() {
            if decl.name == "new" {
                FunctionKind::Constructor
            } else {
                FunctionKind::Method
            }
        } else if decl.name.starts_with("handle_") || decl.name.starts_with("on_") {
            FunctionKind::Handler
        } else {
            FunctionKind::Function
        };

        let end_line = src.line_of(decl.body.end).max(decl.line);
        let mut function = FunctionInfo::new(&decl.name, kind, decl.line, end_line);
        function.parent_class = parent.map(str::to_string);
        function.visibility = if in_trait || trait_impl {
            Visibility::Public
        } else {
            decl.visibility
        };
        function.is_exported = parent.is_none() && decl.visibility == Visibility::Public;

        for qualifier in decl.qualifiers.split_whitespace() {
            match qualifier {
                "async" => function.is_async = true,
                "const" | "unsafe" | "default" | "extern" => {
                    function.modifiers.push(qualifier.to_string())
                }
                _ => {}
            }
        }
        if trait_impl {
            function.modifiers.push("trait_impl".to_string());
        }
        if in_trait && decl.body.open.is_none() {
            function.modifiers.push("abstract".to_string());
        }

        if let Some(paren) = decl.paren {
            if let Some(close) = src.matching_close(paren) {
                let params = &src.raw()[paren + 1..close];
                function.parameters = parse_parameters(params, Syntax::Rust);
                if parent.is_some() && !takes_self(params) {
                    function.is_static = true;
                }
                let limit = decl.body.open.unwrap_or(decl.body.end).min(src.len());
                if limit > close {
                    function.return_type = return_type(src, close + 1, limit);
                }
            }
        }

        if let Some((open, end)) = decl.body_range() {
            analyze_body(src, open + 1, end).apply(&mut function);
        }

        let preamble = src.preamble(decl.line);
        function.decorators = preamble.decorators;
        function.documentation = preamble.documentation;
        function
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

fn rust_visibility(marker: Option<&str>) -> Visibility {
    match marker.map(str::trim) {
        None => Visibility::Private,
        Some("pub") => Visibility::Public,
        Some(_) => Visibility::Internal,
    }
}

fn takes_self(params: &str) -> bool {
    split_top_level(params, b',')
        .first()
        .map(|first| {
            let mut bare = first.trim_start_matches('&').trim_start();
            if bare.starts_with('\'') {
                // Skip the lifetime in `&'a self`.
                bare = bare
                    .split_once(char::is_whitespace)
                    .map(|(_, rest)| rest.trim_start())
                    .unwrap_or("");
            }
            let bare = bare.strip_prefix("mut ").unwrap_or(bare).trim_start();
            bare == "self" || bare.starts_with("self:") || bare.starts_with("self ")
        })
        .unwrap_or(false)
}

fn return_type(src: &SourceText<'_>, from: usize, to: usize) -> Option<String> {
    let masked = &src.masked()[from..to];
    let arrow = masked.find("->")?;
    let rest_start = from + arrow + 2;
    let rest = &src.raw()[rest_start..to];
    let rest = match word_offsets(&src.masked()[rest_start..to], "where").next() {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    let text = collapse(rest.trim().trim_end_matches(';'));
    (!text.is_empty()).then_some(text)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Skip a generic parameter list starting at `pos`, if there is one.
fn skip_generics(masked: &str, pos: usize) -> usize {
    let bytes = masked.as_bytes();
    let mut i = pos;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'<') {
        return pos;
    }
    let mut depth = 0i32;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if i > 0 && (bytes[i - 1] == b'-' || bytes[i - 1] == b'=') => {}
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            b'{' | b';' => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Bare type name: references, `dyn`, paths and generic arguments removed.
fn type_name(text: &str) -> String {
    let text = text.trim().trim_start_matches('!').trim_start_matches('&').trim_start();
    let text = text.strip_prefix("mut ").unwrap_or(text);
    let text = text.strip_prefix("dyn ").unwrap_or(text).trim();
    let base = text.split('<').next().unwrap_or(text);
    base.rsplit("::").next().unwrap_or(base).trim().to_string()
}

fn scan_fns(src: &SourceText<'_>) -> Vec<FnDecl> {
    let masked = src.masked();
    FN.captures_iter(masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(3)?;
            let after_generics = skip_generics(masked, name.end());
            let paren = masked[after_generics..]
                .find(|c: char| !c.is_whitespace())
                .map(|idx| after_generics + idx)
                .filter(|&idx| masked.as_bytes()[idx] == b'(');
            let body = match paren.and_then(|p| src.matching_close(p)) {
                Some(close) => src.brace_body(close + 1),
                None => BodySpan {
                    open: None,
                    end: src.len(),
                    terminated: false,
                },
            };
            let start = whole.start() + whole.as_str().len() - whole.as_str().trim_start().len();
            Some(FnDecl {
                start,
                line: src.line_of(start),
                name: name.as_str().to_string(),
                visibility: rust_visibility(caps.get(1).map(|m| m.as_str())),
                qualifiers: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                paren,
                body,
            })
        })
        .collect()
}

fn scan_impls(src: &SourceText<'_>) -> Vec<ImplBlock> {
    let masked = src.masked();
    IMPL.find_iter(masked)
        .filter_map(|m| {
            let header_start = skip_generics(masked, m.end());
            let span = src.brace_body(header_start);
            if !span.terminated {
                return None;
            }
            let open = span.open?;
            let mut header = collapse(&masked[header_start..open]);
            let where_at = word_offsets(&header, "where").next();
            if let Some(idx) = where_at {
                header.truncate(idx);
            }
            let (trait_name, self_type) = match header.find(" for ") {
                Some(idx) => (Some(type_name(&header[..idx])), type_name(&header[idx + 5..])),
                None => (None, type_name(&header)),
            };
            if self_type.is_empty() {
                return None;
            }
            Some(ImplBlock {
                open,
                end: span.end,
                self_type,
                trait_name: trait_name.filter(|t| !t.is_empty()),
            })
        })
        .collect()
}

fn scan_traits(src: &SourceText<'_>) -> Vec<TraitBlock> {
    let masked = src.masked();
    TYPE_DECL
        .captures_iter(masked)
        .filter(|caps| caps.get(2).map(|k| k.as_str()) == Some("trait"))
        .filter_map(|caps| {
            let name = caps.get(3)?;
            let span = src.brace_body(name.end());
            if !span.terminated {
                return None;
            }
            Some(TraitBlock {
                open: span.open?,
                end: span.end,
            })
        })
        .collect()
}

/// Iterate over the top-level comma-separated parts of `masked[from..to]`,
/// yielding each part with its absolute start offset.
fn body_parts(masked: &str, from: usize, to: usize) -> Vec<(usize, &str)> {
    let body = &masked[from..to];
    let mut cursor = 0;
    let mut parts = Vec::new();
    for part in split_top_level(body, b',') {
        if let Some(idx) = body[cursor..].find(part) {
            let offset = cursor + idx;
            parts.push((from + offset, part));
            cursor = offset + part.len();
        }
    }
    parts
}

/// Expand a `use` tree into `(path segments, alias)` leaves.
fn expand_use_tree(prefix: &[String], tree: &str, out: &mut Vec<(Vec<String>, Option<String>)>) {
    let tree = tree.trim().trim_start_matches("::");
    if tree.is_empty() {
        return;
    }
    if let Some(open) = tree.find('{') {
        let mut base = prefix.to_vec();
        base.extend(
            tree[..open]
                .split("::")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        let inner = tree[open + 1..].trim_end();
        let inner = inner.strip_suffix('}').unwrap_or(inner);
        for part in split_top_level(inner, b',') {
            expand_use_tree(&base, part, out);
        }
        return;
    }

    let (path, alias) = match tree.split_once(" as ") {
        Some((path, alias)) => (path.trim(), Some(alias.trim().to_string())),
        None => (tree, None),
    };
    let mut segments = prefix.to_vec();
    segments.extend(
        path.split("::")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );
    // `a::b::{self}` names the module `b` itself.
    if segments.len() > 1 && segments.last().map(String::as_str) == Some("self") {
        segments.pop();
    }
    out.push((segments, alias));
}

fn is_relative_path(module: &str) -> bool {
    let first = module.split("::").next().unwrap_or("");
    matches!(first, "crate" | "self" | "super")
}

/// `use` statements: (start, end, is_pub, grouped imports).
fn use_statements(src: &SourceText<'_>) -> Vec<(usize, usize, bool, Vec<ImportInfo>)> {
    let masked = src.masked();
    let mut statements = Vec::new();

    for caps in USE.captures_iter(masked) {
        let Some(whole) = caps.get(0) else { continue };
        let end = masked[whole.end()..]
            .find(';')
            .map(|idx| whole.end() + idx)
            .unwrap_or(masked.len());
        let tree = collapse(&masked[whole.end()..end]);
        let line = src.line_of(whole.end());

        let mut leaves = Vec::new();
        expand_use_tree(&[], &tree, &mut leaves);

        let mut imports: Vec<ImportInfo> = Vec::new();
        for (segments, alias) in leaves {
            let Some((leaf, parent)) = segments.split_last() else {
                continue;
            };
            let module = if parent.is_empty() {
                leaf.clone()
            } else {
                parent.join("::")
            };
            let item = ImportItem {
                name: leaf.clone(),
                alias,
                referenced: false,
            };
            match imports.iter_mut().find(|i| i.module == module) {
                Some(existing) => existing.items.push(item),
                None => imports.push(ImportInfo {
                    is_relative: is_relative_path(&module),
                    module,
                    items: vec![item],
                    line,
                    is_type_only: false,
                }),
            }
        }
        statements.push((whole.start(), end + 1, caps.get(1).is_some(), imports));
    }

    statements
}

impl LanguageParser for RustParser {
    fn language_id(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn syntax(&self) -> Syntax {
        Syntax::Rust
    }

    fn imports(&self, src: &SourceText<'_>) -> Vec<ImportInfo> {
        let statements = use_statements(src);
        let skip: Vec<(usize, usize)> = statements.iter().map(|s| (s.0, s.1)).collect();
        let mut imports = Vec::new();

        for (_, _, is_pub, group) in statements {
            for mut import in group {
                for item in &mut import.items {
                    let local = item.local_name().to_string();
                    // Re-exports and `as _` trait imports count as used.
                    item.referenced = is_pub
                        || local == "_"
                        || local == "*"
                        || src.referenced_outside(&local, &skip);
                }
                imports.push(import);
            }
        }

        for caps in MOD_DECL.captures_iter(src.masked()) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            imports.push(ImportInfo {
                module: format!("self::{}", name.as_str()),
                items: Vec::new(),
                line: src.line_of(whole.end()),
                is_relative: true,
                is_type_only: false,
            });
        }

        imports.sort_by_key(|i| i.line);
        imports
    }

    fn exports(&self, src: &SourceText<'_>) -> Vec<ExportInfo> {
        let masked = src.masked();
        let items = Items::scan(src);
        let mut exports = Vec::new();

        for decl in &items.fns {
            if decl.visibility == Visibility::Public && items.is_item_level(decl.start) {
                exports.push(ExportInfo {
                    name: decl.name.clone(),
                    kind: ExportKind::Function,
                    line: decl.line,
                    source: None,
                });
            }
        }

        for caps in TYPE_DECL.captures_iter(masked) {
            let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(2), caps.get(3))
            else {
                continue;
            };
            if rust_visibility(caps.get(1).map(|m| m.as_str())) != Visibility::Public
                || !items.is_item_level(whole.end())
            {
                continue;
            }
            exports.push(ExportInfo {
                name: name.as_str().to_string(),
                kind: if kind.as_str() == "type" {
                    ExportKind::Type
                } else {
                    ExportKind::Class
                },
                line: src.line_of(name.start()),
                source: None,
            });
        }

        for caps in CONST_STATIC.captures_iter(masked) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(4)) else {
                continue;
            };
            if rust_visibility(caps.get(1).map(|m| m.as_str())) != Visibility::Public
                || !items.is_item_level(whole.end())
            {
                continue;
            }
            exports.push(ExportInfo {
                name: name.as_str().to_string(),
                kind: ExportKind::Variable,
                line: src.line_of(name.start()),
                source: None,
            });
        }

        for (_, _, is_pub, group) in use_statements(src) {
            if !is_pub {
                continue;
            }
            for import in group {
                for item in &import.items {
                    if item.name == "*" {
                        continue;
                    }
                    exports.push(ExportInfo {
                        name: item.local_name().to_string(),
                        kind: ExportKind::ReExport,
                        line: import.line,
                        source: Some(import.module.clone()),
                    });
                }
            }
        }

        exports.sort_by_key(|e| e.line);
        exports
    }

    fn classes(&self, src: &SourceText<'_>) -> Vec<ClassInfo> {
        let masked = src.masked();
        let items = Items::scan(src);
        let mut classes: Vec<ClassInfo> = Vec::new();

        for caps in TYPE_DECL.captures_iter(masked) {
            let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(2), caps.get(3))
            else {
                continue;
            };
            if items.in_fn_body(whole.end()) {
                continue;
            }
            let kind = match kind.as_str() {
                "struct" | "union" => ClassKind::Struct,
                "enum" => ClassKind::Enum,
                "trait" => ClassKind::Trait,
                _ => {
                    // Associated types live inside traits and impls.
                    if !items.is_item_level(whole.end()) {
                        continue;
                    }
                    ClassKind::TypeAlias
                }
            };

            let line = src.line_of(name.start());
            let visibility = rust_visibility(caps.get(1).map(|m| m.as_str()));
            let after_name = skip_generics(masked, name.end());
            let span = if kind == ClassKind::TypeAlias {
                BodySpan {
                    open: None,
                    end: masked[after_name..]
                        .find(';')
                        .map(|i| after_name + i)
                        .unwrap_or(masked.len()),
                    terminated: true,
                }
            } else {
                src.brace_body(after_name)
            };

            let mut class = ClassInfo {
                name: name.as_str().to_string(),
                kind,
                line,
                end_line: src.line_of(span.end).max(line),
                visibility,
                is_exported: visibility == Visibility::Public,
                is_abstract: kind == ClassKind::Trait,
                extends: None,
                implements: Vec::new(),
                decorators: Vec::new(),
                documentation: None,
                methods: Vec::new(),
                attributes: Vec::new(),
            };

            match (kind, span.open) {
                (ClassKind::Struct, Some(open)) => {
                    class.attributes = named_fields(src, open + 1, span.end);
                }
                (ClassKind::Struct, None) => {
                    // Tuple struct: fields are named by position.
                    let paren = masked[after_name..span.end.min(masked.len())]
                        .find('(')
                        .map(|i| after_name + i);
                    if let Some(paren) = paren {
                        if let Some(close) = src.matching_close(paren) {
                            class.attributes = tuple_fields(src, paren + 1, close);
                        }
                    }
                }
                (ClassKind::Enum, Some(open)) => {
                    class.attributes = variants(src, open + 1, span.end);
                }
                (ClassKind::Trait, Some(open)) => {
                    let bounds = &masked[after_name..open];
                    if let Some(colon) = bounds.find(':') {
                        let bounds = match word_offsets(bounds, "where").next() {
                            Some(w) if w > colon => &bounds[colon + 1..w],
                            _ => &bounds[colon + 1..],
                        };
                        let mut supertraits = split_top_level(bounds, b'+')
                            .into_iter()
                            .map(type_name)
                            .filter(|s| !s.is_empty() && !s.starts_with('\''));
                        class.extends = supertraits.next();
                        class.implements = supertraits.collect();
                    }
                    for decl in &items.fns {
                        if decl.start > open && decl.start < span.end && !items.in_fn_body(decl.start) {
                            class
                                .methods
                                .push(self.build_fn(src, decl, Some(class.name.as_str()), false, true));
                        }
                    }
                }
                _ => {}
            }

            let preamble = src.preamble(line);
            class.decorators = preamble.decorators;
            class.documentation = preamble.documentation;
            classes.push(class);
        }

        for block in &items.impls {
            let Some(class) = classes.iter_mut().find(|c| c.name == block.self_type) else {
                continue;
            };
            if let Some(trait_name) = &block.trait_name {
                if !class.implements.contains(trait_name) {
                    class.implements.push(trait_name.clone());
                }
            }
            for decl in &items.fns {
                if decl.start > block.open && decl.start < block.end && !items.in_fn_body(decl.start) {
                    let method = self.build_fn(
                        src,
                        decl,
                        Some(block.self_type.as_str()),
                        block.trait_name.is_some(),
                        false,
                    );
                    class.methods.push(method);
                }
            }
        }

        for class in &mut classes {
            class.methods.sort_by_key(|m| m.line);
        }
        classes
    }

    fn functions(&self, src: &SourceText<'_>) -> Vec<FunctionInfo> {
        let items = Items::scan(src);
        let local_types: Vec<String> = TYPE_DECL
            .captures_iter(src.masked())
            .filter_map(|caps| {
                let name = caps.get(3)?;
                (!items.in_fn_body(name.start())).then(|| name.as_str().to_string())
            })
            .collect();

        let mut functions = Vec::new();
        for decl in &items.fns {
            if items.in_fn_body(decl.start) || items.trait_at(decl.start).is_some() {
                continue;
            }
            match items.impl_at(decl.start) {
                Some(block) if local_types.contains(&block.self_type) => {}
                Some(block) => functions.push(self.build_fn(
                    src,
                    decl,
                    Some(block.self_type.as_str()),
                    block.trait_name.is_some(),
                    false,
                )),
                None => functions.push(self.build_fn(src, decl, None, false, false)),
            }
        }
        functions
    }

    fn variables(&self, src: &SourceText<'_>) -> Vec<VariableInfo> {
        let items = Items::scan(src);
        let mut variables = Vec::new();

        for caps in CONST_STATIC.captures_iter(src.masked()) {
            let (Some(whole), Some(keyword), Some(name), Some(ty)) =
                (caps.get(0), caps.get(2), caps.get(4), caps.get(5))
            else {
                continue;
            };
            if !items.is_item_level(whole.end()) {
                continue;
            }
            let visibility = rust_visibility(caps.get(1).map(|m| m.as_str()));
            let is_mut = caps.get(3).is_some();
            let value = caps
                .get(6)
                .map(|v| collapse(&src.raw()[v.start()..v.end()]))
                .filter(|v| !v.is_empty())
                .map(|v| truncate(&v, 120));
            let line = src.line_of(name.start());

            variables.push(VariableInfo {
                name: name.as_str().to_string(),
                kind: if keyword.as_str() == "static" && is_mut {
                    VariableKind::Variable
                } else {
                    VariableKind::Constant
                },
                line,
                data_type: Some(collapse(&src.raw()[ty.start()..ty.end()])),
                visibility,
                is_exported: visibility == Visibility::Public,
                value,
                documentation: src.preamble(line).documentation,
            });
        }

        variables
    }
}

fn named_fields(src: &SourceText<'_>, from: usize, to: usize) -> Vec<AttributeInfo> {
    body_parts(src.masked(), from, to)
        .into_iter()
        .filter_map(|(offset, part)| {
            let caps = FIELD.captures(part)?;
            let name = caps.get(2)?;
            let ty = caps.get(3)?;
            let ty_start = offset + ty.start();
            Some(AttributeInfo {
                name: name.as_str().to_string(),
                line: src.line_of(offset + name.start()),
                data_type: Some(collapse(&src.raw()[ty_start..offset + ty.end()])),
                visibility: rust_visibility(caps.get(1).map(|m| m.as_str())),
                is_static: false,
            })
        })
        .collect()
}

fn tuple_fields(src: &SourceText<'_>, from: usize, to: usize) -> Vec<AttributeInfo> {
    body_parts(src.masked(), from, to)
        .into_iter()
        .enumerate()
        .map(|(idx, (offset, part))| {
            let (visibility, ty) = if let Some(rest) = part.strip_prefix("pub(") {
                let ty = rest.split_once(')').map(|(_, ty)| ty).unwrap_or(rest);
                (Visibility::Internal, ty)
            } else if let Some(rest) = part.strip_prefix("pub ") {
                (Visibility::Public, rest)
            } else {
                (Visibility::Private, part)
            };
            AttributeInfo {
                name: idx.to_string(),
                line: src.line_of(offset),
                data_type: Some(collapse(ty)),
                visibility,
                is_static: false,
            }
        })
        .collect()
}

fn variants(src: &SourceText<'_>, from: usize, to: usize) -> Vec<AttributeInfo> {
    body_parts(src.masked(), from, to)
        .into_iter()
        .filter_map(|(offset, part)| {
            let caps = VARIANT.captures(part)?;
            let name = caps.get(1)?;
            let payload = caps
                .get(2)
                .map(|p| collapse(&src.raw()[offset + p.start()..offset + p.end()]))
                .filter(|p| !p.is_empty());
            Some(AttributeInfo {
                name: name.as_str().to_string(),
                line: src.line_of(offset + name.start()),
                data_type: payload,
                visibility: Visibility::Public,
                is_static: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"use std::collections::{HashMap, HashSet};
use std::fmt;
use crate::store::{self, Store as Backend};
pub use crate::model::User;

mod helpers;

/// Maximum cached entries.
pub const MAX_ENTRIES: usize = 1_000;
static mut COUNTER: u32 = 0;

/// A cache in front of the store.
#[derive(Debug, Clone)]
pub struct Cache<K> {
    pub entries: HashMap<K, String>,
    pub(crate) backend: Backend,
    hits: u64,
}

pub enum Event {
    Hit,
    Miss(String),
    Evicted { key: String },
}

pub trait Lookup: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl<K> Cache<K> {
    pub fn new(backend: Backend) -> Self {
        Cache { entries: HashMap::new(), backend, hits: 0 }
    }

    fn record(&mut self, hit: bool) {
        if hit && self.hits < 10 {
            self.hits += 1;
        }
    }
}

impl<K> Lookup for Cache<K> {
    fn get(&self, key: &str) -> Option<String> {
        store::fetch(key)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event")
    }
}

impl Remote {
    pub async fn sync(&self) -> Result<(), String> {
        Ok(())
    }
}

pub fn run() {
    fn inner() {}
    let seen: HashSet<u32> = HashSet::new();
    inner();
}
"#;

    #[test]
    fn test_imports() {
        let imports = RustParser::new().extract_imports(SAMPLE);
        let modules: Vec<_> = imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(
            modules,
            vec!["std::collections", "std", "crate", "crate::store", "crate::model", "self::helpers"]
        );

        let collections = &imports[0];
        assert_eq!(collections.items.len(), 2);
        assert!(collections.items.iter().all(|i| i.referenced));
        assert!(!collections.is_relative);

        let store = &imports[2];
        assert_eq!(store.items[0].name, "store");
        assert!(store.is_relative);
        let backend = &imports[3].items[0];
        assert_eq!(backend.name, "Store");
        assert_eq!(backend.local_name(), "Backend");
        assert!(backend.referenced);

        // Re-exports are always used.
        assert!(imports[4].items[0].referenced);
        assert!(imports[5].items.is_empty());
        assert!(imports[5].is_relative);
    }

    #[test]
    fn test_exports() {
        let exports = RustParser::new().extract_exports(SAMPLE);
        let names: Vec<_> = exports.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("User", ExportKind::ReExport),
                ("MAX_ENTRIES", ExportKind::Variable),
                ("Cache", ExportKind::Class),
                ("Event", ExportKind::Class),
                ("Lookup", ExportKind::Class),
                ("run", ExportKind::Function),
            ]
        );
        assert_eq!(exports[0].source.as_deref(), Some("crate::model"));
    }

    #[test]
    fn test_struct_with_impls() {
        let classes = RustParser::new().extract_classes(SAMPLE);
        let cache = classes.iter().find(|c| c.name == "Cache").unwrap();
        assert_eq!(cache.kind, ClassKind::Struct);
        assert_eq!(cache.decorators, vec!["derive(Debug, Clone)"]);
        assert_eq!(cache.documentation.as_deref(), Some("A cache in front of the store."));

        let fields: Vec<_> = cache
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.visibility))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("entries", Visibility::Public),
                ("backend", Visibility::Internal),
                ("hits", Visibility::Private)
            ]
        );
        assert_eq!(cache.attributes[0].data_type.as_deref(), Some("HashMap<K, String>"));

        let methods: Vec<_> = cache.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["new", "record", "get"]);
        assert_eq!(cache.methods[0].kind, FunctionKind::Constructor);
        assert!(cache.methods[0].is_static);
        assert!(!cache.methods[1].is_static);
        assert_eq!(cache.methods[1].complexity, 3);
        assert!(cache.methods[2].has_modifier("trait_impl"));
        assert_eq!(cache.implements, vec!["Lookup"]);
    }

    #[test]
    fn test_enum_and_trait() {
        let classes = RustParser::new().extract_classes(SAMPLE);

        let event = classes.iter().find(|c| c.name == "Event").unwrap();
        assert_eq!(event.kind, ClassKind::Enum);
        let variants: Vec<_> = event.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(variants, vec!["Hit", "Miss", "Evicted"]);
        assert_eq!(event.attributes[1].data_type.as_deref(), Some("(String)"));
        assert_eq!(event.implements, vec!["Display"]);

        let lookup = classes.iter().find(|c| c.name == "Lookup").unwrap();
        assert_eq!(lookup.kind, ClassKind::Trait);
        assert_eq!(lookup.extends.as_deref(), Some("Send"));
        assert_eq!(lookup.implements, vec!["Sync"]);
        assert!(lookup.methods[0].has_modifier("abstract"));
        assert!(!lookup.methods[1].has_modifier("abstract"));
    }

    #[test]
    fn test_functions() {
        let functions = RustParser::new().extract_functions(SAMPLE);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["sync", "run"]);

        let sync = &functions[0];
        assert_eq!(sync.parent_class.as_deref(), Some("Remote"));
        assert!(sync.is_async);
        assert_eq!(sync.return_type.as_deref(), Some("Result<(), String>"));

        let run = &functions[1];
        assert!(run.is_exported);
        assert!(run.calls.iter().any(|c| c.target == "inner"));
    }

    #[test]
    fn test_variables() {
        let variables = RustParser::new().extract_variables(SAMPLE);
        assert_eq!(variables.len(), 2);
        assert_eq!(variables[0].name, "MAX_ENTRIES");
        assert_eq!(variables[0].kind, VariableKind::Constant);
        assert_eq!(variables[0].value.as_deref(), Some("1_000"));
        assert_eq!(variables[0].documentation.as_deref(), Some("Maximum cached entries."));
        assert!(variables[0].is_exported);
        assert_eq!(variables[1].name, "COUNTER");
        assert_eq!(variables[1].kind, VariableKind::Variable);
    }

    #[test]
    fn test_generic_bounds_do_not_hide_parameters() {
        let source = "fn apply<F: Fn(u32) -> u32>(f: F, x: u32) -> u32 {\n    f(x)\n}\n";
        let functions = RustParser::new().extract_functions(source);
        assert_eq!(functions.len(), 1);
        let params: Vec<_> = functions[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(params, vec!["f", "x"]);
        assert_eq!(functions[0].end_line, 3);
    }

    #[test]
    fn test_unterminated_fn_keeps_later_items() {
        let source = "fn f() {\n    x();\n\nfn g() -> u32 { 1 }\nconst K: u32 = 2;\n";
        let functions = RustParser::new().extract_functions(source);
        let names: Vec<_> = functions.iter().map(|f| (f.name.as_str(), f.line)).collect();
        assert_eq!(names, vec![("f", 1), ("g", 4)]);
        assert_eq!(functions[0].end_line, 5);
        assert_eq!(functions[1].end_line, 4);

        let variables = RustParser::new().extract_variables(source);
        let names: Vec<_> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["K"]);
    }

    #[test]
    fn test_unterminated_impl_keeps_later_items() {
        let source = "struct S;\nimpl S {\n    fn m(&self) {\n\nfn g() {}\n";
        let functions = RustParser::new().extract_functions(source);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"g"));
    }
}
