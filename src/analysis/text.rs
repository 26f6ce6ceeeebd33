//! Text heuristics shared by every language parser.
//!
//! Parsing here is line, brace and indentation driven. `SourceText` lexes a
//! file once into comment and string regions and keeps a masked copy of the
//! content with the same byte length, where comment bytes and string
//! contents are blanked out. All structural scanning runs over the masked
//! copy so braces, parentheses and keywords inside literals never affect the
//! result; literal text is read back from the raw content at the same
//! offsets.

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::facts::{
    Access, AttributeAccessInfo, BlockInfo, BlockKind, CallInfo, EventHandlerInfo, FunctionInfo,
    ParameterInfo, UsageShape, VariableInfo, VariableKind, VariableUsageInfo, Visibility,
};
use super::Language;

/// Lexical family used for comment and string recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `//`, `/* */`, `'`, `"` and template literals.
    TypeScript,
    /// `//`, nested `/* */`, `"`, raw strings and char literals.
    Rust,
    /// `#`, `'`, `"` and triple-quoted strings.
    Python,
    /// `//`, `/* */`, `'`, `"` (Go, Java, C family, Swift, PHP, CSS).
    CStyle,
    /// `#` comments with quoted strings (Ruby, YAML, TOML).
    Hash,
    /// `<!-- -->` comments (HTML, Markdown).
    Markup,
    /// Strings only (JSON).
    Plain,
}

impl Syntax {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::TypeScript | Language::JavaScript => Syntax::TypeScript,
            Language::Rust => Syntax::Rust,
            Language::Python => Syntax::Python,
            Language::Go
            | Language::Java
            | Language::Kotlin
            | Language::CSharp
            | Language::C
            | Language::Cpp
            | Language::Php
            | Language::Swift
            | Language::Css => Syntax::CStyle,
            Language::Ruby | Language::Yaml | Language::Toml => Syntax::Hash,
            Language::Html | Language::Markdown => Syntax::Markup,
            Language::Json | Language::Unknown => Syntax::Plain,
        }
    }

    fn uses_braces(&self) -> bool {
        !matches!(self, Syntax::Python)
    }
}

/// Kind of lexical region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Comment,
    /// Triple-quoted string in statement position.
    DocString,
    Str,
}

/// A comment or string literal, as byte offsets into the raw content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    /// Start of the whole region, delimiters included.
    pub start: usize,
    /// End of the whole region (exclusive).
    pub end: usize,
    /// Start of the literal contents.
    pub inner_start: usize,
    /// End of the literal contents (exclusive).
    pub inner_end: usize,
}

impl Region {
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, RegionKind::Comment | RegionKind::DocString)
    }
}

/// Extent of a brace-delimited body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySpan {
    /// Offset of the opening `{`, if any was found.
    pub open: Option<usize>,
    /// Offset of the matching `}`, of the terminating `;`, or the content
    /// length when the body never closes.
    pub end: usize,
    /// False when the opening `{` has no matching `}`.
    pub terminated: bool,
}

/// Decorators and documentation found above a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preamble {
    pub decorators: Vec<String>,
    pub documentation: Option<String>,
}

/// Identifiers excluded from usage and call scanning, across all languages.
pub static KEYWORDS: phf::Set<&'static str> = phf_set! {
    // shared
    "if", "else", "for", "while", "do", "return", "break", "continue", "in",
    "true", "false", "null", "undefined", "new", "this", "self", "super",
    "class", "import", "export", "from", "as", "try", "catch", "finally",
    "throw", "async", "await", "yield", "static", "const", "let", "var",
    "function", "typeof", "instanceof", "void", "delete", "switch", "case",
    "default", "extends", "implements", "interface", "type", "enum",
    "public", "private", "protected", "readonly", "abstract", "declare",
    "namespace", "module", "keyof", "of", "get", "set",
    // rust
    "fn", "pub", "mut", "impl", "trait", "struct", "use", "mod", "crate",
    "Self", "match", "loop", "where", "ref", "move", "unsafe", "dyn",
    "extern", "Some", "None", "Ok", "Err",
    // python
    "def", "elif", "pass", "lambda", "with", "is", "not", "and", "or",
    "raise", "except", "global", "nonlocal", "assert", "del", "True",
    "False", "cls", "print",
};

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

lazy_static! {
    static ref TS_BRANCH: Regex = Regex::new(r"\b(?:if|while|for|case|catch)\b").unwrap();
    static ref RUST_BRANCH: Regex = Regex::new(r"\b(?:if|while|for)\b").unwrap();
    static ref RUST_MATCH: Regex = Regex::new(r"\bmatch\b").unwrap();
    static ref PY_BRANCH: Regex =
        Regex::new(r"\b(?:if|elif|while|for|except|case|and|or)\b").unwrap();
    static ref CALL: Regex = Regex::new(
        r"(\bnew\s+)?([A-Za-z_$][\w$]*(?:\s*(?:\?\.|\.|::)\s*[A-Za-z_$][\w$]*)*)\s*(::\s*<[^()]*?>)?\s*(!)?\s*\("
    )
    .unwrap();
    static ref BRACE_BLOCK_KEYWORD: Regex =
        Regex::new(r"\b(if|for|while|switch|try|match|loop|do)\b").unwrap();
    static ref TS_LOCAL: Regex =
        Regex::new(r"\b(const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*([^=;\n]+?))?\s*(?:=|;|\n|$)")
            .unwrap();
    static ref TS_DESTRUCTURE: Regex =
        Regex::new(r"\b(const|let|var)\s*[\{\[]([^\}\]]*)[\}\]]\s*=").unwrap();
    static ref RUST_LOCAL: Regex =
        Regex::new(r"\blet\s+(mut\s+)?([a-z_][A-Za-z0-9_]*)\s*(?::\s*([^=;\n]+))?").unwrap();
    static ref PY_LOCAL: Regex =
        Regex::new(r"^\s*([A-Za-z_]\w*)\s*(?::\s*([^=\n]+?))?\s*=[^=]").unwrap();
    static ref TS_THROW: Regex = Regex::new(r"\bthrow\s+new\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref TS_CATCH: Regex =
        Regex::new(r"\bcatch\s*\(\s*[A-Za-z_$][\w$]*\s*:\s*([A-Za-z_$][\w$]*)").unwrap();
    static ref TS_INSTANCEOF: Regex = Regex::new(r"\binstanceof\s+([A-Z][\w$]*)").unwrap();
    static ref PY_RAISE: Regex = Regex::new(r"\braise\s+([A-Za-z_][\w.]*)").unwrap();
    static ref PY_EXCEPT: Regex = Regex::new(r"\bexcept\s*\(?\s*([A-Za-z_][\w., ]*)").unwrap();
    static ref RUST_ERR: Regex = Regex::new(r"\bErr\s*\(\s*([A-Z][A-Za-z0-9_]*)").unwrap();
    static ref EMIT: Regex = Regex::new(r"\.\s*emit\s*\(\s*[\x22'`]").unwrap();
    static ref HANDLER: Regex =
        Regex::new(r"\.\s*(?:on|once|addListener|addEventListener|subscribe)\s*\(\s*[\x22'`]")
            .unwrap();
    static ref HANDLER_TARGET: Regex =
        Regex::new(r"^\s*,\s*(?:this\.|self\.)?([A-Za-z_$][\w$]*)\s*[,)]").unwrap();
}

/// Source text with lexical regions, a masked copy and line offsets.
pub struct SourceText<'a> {
    raw: &'a str,
    masked: String,
    syntax: Syntax,
    regions: Vec<Region>,
    line_starts: Vec<usize>,
    line_depths: Vec<u32>,
    unclosed: Vec<usize>,
}

impl<'a> SourceText<'a> {
    pub fn new(raw: &'a str, syntax: Syntax) -> Self {
        let regions = lex(raw, syntax);

        let mut bytes = raw.as_bytes().to_vec();
        for region in &regions {
            let (from, to) = match region.kind {
                RegionKind::Comment => (region.start, region.end),
                RegionKind::DocString | RegionKind::Str => (region.inner_start, region.inner_end),
            };
            for b in &mut bytes[from..to] {
                if *b != b'\n' {
                    *b = b' ';
                }
            }
        }
        // Whole multi-byte sequences are blanked together, so this only
        // fails if lexing split a character, which the ASCII-delimited
        // regions never do.
        let masked = String::from_utf8(bytes).unwrap_or_else(|_| raw.to_string());

        // Opens left on the stack never close and do not count toward depth.
        let mut unclosed = Vec::new();
        for (i, b) in masked.bytes().enumerate() {
            match b {
                b'{' => unclosed.push(i),
                b'}' => {
                    unclosed.pop();
                }
                _ => {}
            }
        }

        let mut line_starts = vec![0];
        let mut line_depths = vec![0];
        let mut depth = 0u32;
        for (i, b) in masked.bytes().enumerate() {
            match b {
                b'{' if unclosed.binary_search(&i).is_err() => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'\n' => {
                    line_starts.push(i + 1);
                    line_depths.push(depth);
                }
                _ => {}
            }
        }

        Self {
            raw,
            masked,
            syntax,
            regions,
            line_starts,
            line_depths,
            unclosed,
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn masked(&self) -> &str {
        &self.masked
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Number of lines, a trailing newline does not start a new line.
    pub fn line_count(&self) -> usize {
        if self.raw.is_empty() {
            0
        } else if self.raw.ends_with('\n') {
            self.line_starts.len() - 1
        } else {
            self.line_starts.len()
        }
    }

    /// 1-based line containing a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
        .max(1)
        .min(self.line_count().max(1))
    }

    /// Byte offset where a 1-based line starts.
    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(self.raw.len())
    }

    /// Byte offset of the newline ending a line, or the content length.
    pub fn line_end(&self, line: usize) -> usize {
        self.line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.raw.len())
    }

    pub fn raw_line(&self, line: usize) -> &'a str {
        if line == 0 || line > self.line_count() {
            return "";
        }
        let text = &self.raw[self.line_start(line)..self.line_end(line)];
        text.strip_suffix('\r').unwrap_or(text)
    }

    pub fn masked_line(&self, line: usize) -> &str {
        if line == 0 || line > self.line_count() {
            return "";
        }
        let text = &self.masked[self.line_start(line)..self.line_end(line)];
        text.strip_suffix('\r').unwrap_or(text)
    }

    /// Whether an unclosed `{` lies in `from..to`.
    pub fn has_unclosed(&self, from: usize, to: usize) -> bool {
        let idx = self.unclosed.partition_point(|&open| open < from);
        self.unclosed.get(idx).map(|&open| open < to).unwrap_or(false)
    }

    /// Brace depth at the start of a line, counting only braces that close.
    pub fn depth_at_line(&self, line: usize) -> u32 {
        self.line_depths
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or(0)
    }

    /// Region containing `offset`, if any.
    pub fn region_at(&self, offset: usize) -> Option<&Region> {
        let idx = self.regions.partition_point(|r| r.end <= offset);
        self.regions
            .get(idx)
            .filter(|r| r.start <= offset && offset < r.end)
    }

    /// Whether a byte offset lies inside a comment or docstring.
    pub fn in_comment(&self, offset: usize) -> bool {
        self.region_at(offset).map(|r| r.is_comment()).unwrap_or(false)
    }

    /// Whether a line holds only comment text.
    pub fn is_comment_line(&self, line: usize) -> bool {
        !self.raw_line(line).trim().is_empty() && self.masked_line(line).trim().is_empty()
    }

    /// Find the body that follows a declaration starting at `from`.
    ///
    /// Balanced parentheses and brackets are skipped. A `;` or an unmatched
    /// `}` before any `{` marks a bodiless declaration. A body whose braces
    /// never balance, or a declaration with nothing after it, runs to the end
    /// of the content.
    pub fn brace_body(&self, from: usize) -> BodySpan {
        let bytes = self.masked.as_bytes();
        let mut depth = 0usize;
        let mut i = from.min(bytes.len());

        while i < bytes.len() {
            match bytes[i] {
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'{' if depth == 0 => {
                    let close = self.matching_close(i);
                    return BodySpan {
                        open: Some(i),
                        end: close.unwrap_or(bytes.len()),
                        terminated: close.is_some(),
                    };
                }
                b';' | b'}' if depth == 0 => {
                    return BodySpan {
                        open: None,
                        end: i,
                        terminated: true,
                    };
                }
                _ => {}
            }
            i += 1;
        }

        BodySpan {
            open: None,
            end: bytes.len(),
            terminated: true,
        }
    }

    /// Offset of the bracket closing the one at `open`.
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let bytes = self.masked.as_bytes();
        let (opener, closer) = match bytes.get(open)? {
            b'{' => (b'{', b'}'),
            b'(' => (b'(', b')'),
            b'[' => (b'[', b']'),
            _ => return None,
        };
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(open) {
            if b == opener {
                depth += 1;
            } else if b == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// End of an arrow or lambda body starting right after `=>`.
    ///
    /// A braced body ends at its matching `}`. An expression body ends at the
    /// first `;`, `,` or line break outside nested brackets, or just before a
    /// bracket that closes an enclosing expression.
    pub fn expression_end(&self, from: usize) -> usize {
        let bytes = self.masked.as_bytes();
        let mut i = from;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return bytes.len();
        }
        if bytes[i] == b'{' {
            return self.matching_close(i).unwrap_or(bytes.len());
        }

        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    if depth == 0 {
                        return i.saturating_sub(1);
                    }
                    depth -= 1;
                }
                b';' | b',' | b'\n' if depth == 0 => return i,
                _ => {}
            }
            i += 1;
        }
        bytes.len()
    }

    /// Offset of the `:` closing a Python `def`/`class`/block header that
    /// starts on `line`.
    pub fn header_colon(&self, line: usize) -> Option<usize> {
        let bytes = self.masked.as_bytes();
        let mut depth = 0usize;
        let limit = self.line_end((line + 50).min(self.line_count()));
        let mut i = self.line_start(line);
        while i < limit.min(bytes.len()) {
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b':' if depth == 0 => return Some(i),
                _ => {}
            }
            i += 1;
        }
        None
    }

    /// Line holding the `:` that closes the header starting on `line`.
    pub fn header_end_line(&self, line: usize) -> usize {
        self.header_colon(line)
            .map(|offset| self.line_of(offset))
            .unwrap_or(line)
    }

    /// Whether `name` occurs as an identifier outside the given byte spans.
    pub fn referenced_outside(&self, name: &str, skip: &[(usize, usize)]) -> bool {
        word_offsets(&self.masked, name).any(|offset| {
            !skip.iter().any(|&(from, to)| offset >= from && offset < to)
                && !(offset > 0 && self.masked.as_bytes()[offset - 1] == b'.')
        })
    }

    /// Last line of an indentation-delimited block whose header starts on
    /// `line`.
    ///
    /// The block continues while lines are blank or indented deeper than the
    /// header; it ends at the last non-blank line before the first line
    /// indented at or left of the header.
    pub fn indent_block_end(&self, line: usize) -> usize {
        let base = indent_width(self.raw_line(line));
        let header_end = self.header_end_line(line);
        let mut last = header_end;

        for l in header_end + 1..=self.line_count() {
            let text = self.masked_line(l);
            if text.trim().is_empty() {
                continue;
            }
            if indent_width(text) <= base {
                break;
            }
            last = l;
        }
        last
    }

    /// Collect decorators, attributes and doc comments directly above `line`.
    ///
    /// Walks upward over blank lines, comments and decorator-shaped lines and
    /// stops at the first line that is none of those.
    pub fn preamble(&self, line: usize) -> Preamble {
        let mut decorators = Vec::new();
        let mut doc_lines: Vec<String> = Vec::new();
        let mut doc_done = false;
        let mut l = line.saturating_sub(1);

        while l >= 1 {
            let raw = self.raw_line(l).trim();

            if raw.is_empty() {
                l -= 1;
                continue;
            }

            if let Some(decorator) = self.decorator_text(raw) {
                decorators.push(decorator);
                l -= 1;
                continue;
            }

            if self.is_comment_line(l) {
                if raw.ends_with("*/") {
                    let mut top = l;
                    while top > 1 && !self.raw_line(top).trim_start().starts_with("/*") {
                        top -= 1;
                    }
                    if !doc_done && self.raw_line(top).trim_start().starts_with("/**") {
                        doc_lines = (top..=l)
                            .map(|d| clean_block_doc(self.raw_line(d)))
                            .filter(|s| !s.is_empty())
                            .collect();
                        doc_done = true;
                    }
                    l = top.saturating_sub(1);
                    continue;
                }
                if let Some(rest) = raw.strip_prefix("///") {
                    if !doc_done {
                        doc_lines.insert(0, rest.trim().to_string());
                    }
                } else if !doc_lines.is_empty() {
                    doc_done = true;
                }
                l -= 1;
                continue;
            }

            // Closing line of a decorator whose arguments span several lines.
            if raw.starts_with(')') || raw.starts_with('}') || raw.starts_with(']') {
                if let Some(open_line) = self.bracket_open_line(l) {
                    if let Some(decorator) = self.decorator_text(self.raw_line(open_line).trim()) {
                        decorators.push(decorator);
                        l = open_line - 1;
                        continue;
                    }
                }
            }
            break;
        }

        decorators.reverse();
        let documentation = if doc_lines.is_empty() {
            None
        } else {
            Some(truncate(&doc_lines.join(" "), 300))
        };
        Preamble {
            decorators,
            documentation,
        }
    }

    fn decorator_text(&self, trimmed: &str) -> Option<String> {
        match self.syntax {
            Syntax::Rust => trimmed
                .strip_prefix("#[")
                .map(|rest| rest.trim_end_matches(']').trim().to_string()),
            _ => trimmed
                .strip_prefix('@')
                .filter(|rest| rest.starts_with(|c: char| c.is_alphabetic() || c == '_'))
                .map(|rest| rest.trim_end_matches(['{', '(']).trim().to_string()),
        }
    }

    /// Line holding the bracket that the first closer on `line` matches.
    fn bracket_open_line(&self, line: usize) -> Option<usize> {
        let bytes = self.masked.as_bytes();
        let start = self.line_start(line);
        let mut depth = 0i64;
        let end = self.line_end(line);
        // Net closers on this line.
        for &b in &bytes[start..end] {
            match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                _ => {}
            }
        }
        if depth >= 0 {
            return None;
        }
        let mut i = start;
        while i > 0 {
            i -= 1;
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                return Some(self.line_of(i));
            }
        }
        None
    }

    /// Docstring of a Python body whose header ends on `header_end`.
    pub fn python_docstring(&self, header_end: usize) -> Option<String> {
        let mut l = header_end + 1;
        while l <= self.line_count() && self.raw_line(l).trim().is_empty() {
            l += 1;
        }
        let offset = self.line_start(l) + indent_bytes(self.raw_line(l));
        let region = self.region_at(offset)?;
        if region.kind != RegionKind::DocString {
            return None;
        }
        let text = self.raw[region.inner_start..region.inner_end]
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            None
        } else {
            Some(truncate(&text, 300))
        }
    }

    /// Raw text of the string literal whose opening quote is at `quote`.
    pub fn literal_at(&self, quote: usize) -> Option<&'a str> {
        let region = self.region_at(quote)?;
        if region.start != quote || region.is_comment() {
            return None;
        }
        Some(&self.raw[region.inner_start..region.inner_end])
    }
}

fn clean_block_doc(line: &str) -> String {
    line.trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .trim_start_matches('*')
        .trim()
        .to_string()
}

/// Leading whitespace width, tabs counted as four columns.
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn indent_bytes(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Truncate to at most `max` bytes on a character boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Longest prefix of at most `max` bytes ending on a character boundary.
pub fn head(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

/// Whether `word` occurs in `haystack` as a whole identifier.
pub fn contains_word(haystack: &str, word: &str) -> bool {
    word_offsets(haystack, word).next().is_some()
}

/// Offsets of whole-identifier occurrences of `word`.
pub fn word_offsets<'h>(haystack: &'h str, word: &'h str) -> impl Iterator<Item = usize> + 'h {
    let bytes = haystack.as_bytes();
    haystack.match_indices(word).filter_map(move |(i, _)| {
        if word.is_empty() {
            return None;
        }
        let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
        let after = i + word.len();
        let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
        (before_ok && after_ok).then_some(i)
    })
}

/// Split at top-level occurrences of `sep`, ignoring nested brackets.
pub fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut quote: Option<u8> = None;

    for i in 0..bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q && (i == 0 || bytes[i - 1] != b'\\') {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'>' if i == 0 || (bytes[i - 1] != b'=' && bytes[i - 1] != b'-') => depth -= 1,
            _ if b == sep && depth <= 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn lex(raw: &str, syntax: Syntax) -> Vec<Region> {
    let b = raw.as_bytes();
    let n = b.len();
    let mut regions = Vec::new();
    let mut i = 0;

    while i < n {
        let c = b[i];
        let next = b.get(i + 1).copied();

        let slash_comments = matches!(
            syntax,
            Syntax::TypeScript | Syntax::Rust | Syntax::CStyle
        );
        let hash_comments = matches!(syntax, Syntax::Python | Syntax::Hash);

        if slash_comments && c == b'/' && next == Some(b'/') {
            let end = raw[i..].find('\n').map(|p| i + p).unwrap_or(n);
            regions.push(comment(i, end));
            i = end;
            continue;
        }
        if slash_comments && c == b'/' && next == Some(b'*') {
            let end = block_comment_end(b, i, syntax == Syntax::Rust);
            regions.push(comment(i, end));
            i = end;
            continue;
        }
        if hash_comments && c == b'#' {
            let end = raw[i..].find('\n').map(|p| i + p).unwrap_or(n);
            regions.push(comment(i, end));
            i = end;
            continue;
        }
        if syntax == Syntax::Markup && raw[i..].starts_with("<!--") {
            let end = raw[i + 4..].find("-->").map(|p| i + 4 + p + 3).unwrap_or(n);
            regions.push(comment(i, end));
            i = end;
            continue;
        }

        match (syntax, c) {
            (Syntax::Python, b'"' | b'\'') if raw[i..].starts_with(if c == b'"' { "\"\"\"" } else { "'''" }) => {
                let delim = &raw[i..i + 3];
                let close = raw[i + 3..].find(delim).map(|p| i + 3 + p);
                let (inner_end, end) = match close {
                    Some(p) => (p, p + 3),
                    None => (n, n),
                };
                let line_start = raw[..i].rfind('\n').map(|p| p + 1).unwrap_or(0);
                let statement = raw[line_start..i]
                    .trim()
                    .trim_end_matches(|ch: char| "rRbBuUfF".contains(ch))
                    .is_empty();
                regions.push(Region {
                    kind: if statement { RegionKind::DocString } else { RegionKind::Str },
                    start: i,
                    end,
                    inner_start: i + 3,
                    inner_end,
                });
                i = end;
            }
            (Syntax::Rust, b'r') if raw_string_start(b, i) => {
                let mut j = i + 1;
                while j < n && b[j] == b'#' {
                    j += 1;
                }
                let hashes = j - i - 1;
                let mut closing = String::from("\"");
                closing.push_str(&"#".repeat(hashes));
                let inner_start = j + 1;
                let (inner_end, end) = match raw[inner_start.min(n)..].find(&closing) {
                    Some(p) => (inner_start + p, inner_start + p + closing.len()),
                    None => (n, n),
                };
                regions.push(Region {
                    kind: RegionKind::Str,
                    start: i,
                    end,
                    inner_start: inner_start.min(n),
                    inner_end,
                });
                i = end;
            }
            (Syntax::Rust, b'\'') => match char_literal_end(raw, i) {
                Some(end) => {
                    regions.push(Region {
                        kind: RegionKind::Str,
                        start: i,
                        end,
                        inner_start: i + 1,
                        inner_end: end - 1,
                    });
                    i = end;
                }
                // Lifetime or label.
                None => i += 1,
            },
            (Syntax::Rust, b'"') => {
                let (inner_end, end) = quoted_end(b, i, b'"', true);
                regions.push(string(i, inner_end, end));
                i = end;
            }
            (Syntax::TypeScript, b'/') if regex_allowed(b, i) => match regex_literal_end(b, i) {
                Some((close, end)) => {
                    regions.push(string(i, close, end));
                    i = end;
                }
                // Division after all.
                None => i += 1,
            },
            (Syntax::TypeScript, b'`') => {
                let (inner_end, end) = quoted_end(b, i, b'`', true);
                regions.push(string(i, inner_end, end));
                i = end;
            }
            (Syntax::Plain | Syntax::Markup, b'"')
            | (Syntax::TypeScript | Syntax::CStyle | Syntax::Python | Syntax::Hash, b'"' | b'\'') => {
                let (inner_end, end) = quoted_end(b, i, c, false);
                regions.push(string(i, inner_end, end));
                i = end;
            }
            _ => i += 1,
        }
    }

    regions
}

fn comment(start: usize, end: usize) -> Region {
    Region {
        kind: RegionKind::Comment,
        start,
        end,
        inner_start: start,
        inner_end: end,
    }
}

fn string(start: usize, inner_end: usize, end: usize) -> Region {
    Region {
        kind: RegionKind::Str,
        start,
        end,
        inner_start: (start + 1).min(inner_end),
        inner_end,
    }
}

fn block_comment_end(b: &[u8], start: usize, nested: bool) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < b.len() {
        if b[i] == b'/' && b[i + 1] == b'*' && (nested || depth == 0) {
            depth += 1;
            i += 2;
            continue;
        }
        if b[i] == b'*' && b[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
            continue;
        }
        i += 1;
    }
    b.len()
}

/// Returns (end of contents, end of literal) for a quoted string at `start`.
fn quoted_end(b: &[u8], start: usize, quote: u8, multiline: bool) -> (usize, usize) {
    let mut j = start + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            c if c == quote => return (j, j + 1),
            b'\n' if !multiline => return (j, j),
            _ => j += 1,
        }
    }
    (b.len(), b.len())
}

fn raw_string_start(b: &[u8], i: usize) -> bool {
    let prev_ok = i == 0
        || !is_ident_byte(b[i - 1])
        || (b[i - 1] == b'b' && (i < 2 || !is_ident_byte(b[i - 2])));
    if !prev_ok {
        return false;
    }
    let mut j = i + 1;
    while j < b.len() && b[j] == b'#' {
        j += 1;
    }
    j < b.len() && b[j] == b'"'
}

/// End of a Rust char literal at `start`, or None for a lifetime.
/// Words after which a `/` starts a regex literal rather than a division.
const REGEX_PREFIX_WORDS: &[&str] = &[
    "return", "typeof", "case", "in", "of", "delete", "void", "throw", "yield", "await",
    "instanceof", "else", "do", "new",
];

/// Whether a `/` at `i` can open a regex literal, judged by the previous
/// significant byte. `<` is left out so JSX closing tags stay code.
fn regex_allowed(b: &[u8], i: usize) -> bool {
    let mut p = i;
    while p > 0 && matches!(b[p - 1], b' ' | b'\t' | b'\r') {
        p -= 1;
    }
    let Some(&prev) = p.checked_sub(1).and_then(|q| b.get(q)) else {
        return true;
    };
    match prev {
        b'\n' | b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}'
        | b';' | b'+' | b'-' | b'*' | b'%' | b'>' | b'~' | b'^' => true,
        c if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' => {
            let mut start = p - 1;
            while start > 0 && (b[start - 1].is_ascii_alphanumeric() || matches!(b[start - 1], b'_' | b'$')) {
                start -= 1;
            }
            let word = &b[start..p];
            REGEX_PREFIX_WORDS.iter().any(|w| w.as_bytes() == word)
        }
        _ => false,
    }
}

/// Close and end offsets of a regex literal opening at `start`. Character
/// classes may hold an unescaped `/`. Literals never span lines.
fn regex_literal_end(b: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut j = start + 1;
    let mut in_class = false;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 1,
            b'\n' => return None,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                let close = j;
                j += 1;
                while j < b.len() && b[j].is_ascii_alphabetic() {
                    j += 1;
                }
                return Some((close, j));
            }
            _ => {}
        }
        j += 1;
    }
    None
}

fn char_literal_end(raw: &str, start: usize) -> Option<usize> {
    let rest = &raw[start + 1..];
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if first == '\\' {
        let escaped = rest[1..].chars().next()?;
        let from = 1 + escaped.len_utf8();
        let close = rest[from..].find('\'')?;
        return (close <= 10).then_some(start + 1 + from + close + 1);
    }
    let (idx, second) = chars.next()?;
    (second == '\'').then_some(start + 1 + idx + 1)
}

/// Body facts shared by every callable.
#[derive(Debug, Default, Clone)]
pub struct BodyFacts {
    pub complexity: u32,
    pub max_nesting: u32,
    pub calls: Vec<CallInfo>,
    pub usages: Vec<VariableUsageInfo>,
    pub attribute_accesses: Vec<AttributeAccessInfo>,
    pub locals: Vec<VariableInfo>,
    pub blocks: Vec<BlockInfo>,
    pub throws: Vec<String>,
    pub catches: Vec<String>,
    pub emits: Vec<String>,
    pub handlers: Vec<EventHandlerInfo>,
}

impl BodyFacts {
    /// Move the body facts onto a function.
    pub fn apply(self, function: &mut FunctionInfo) {
        function.complexity = self.complexity;
        function.max_nesting = self.max_nesting;
        function.calls = self.calls;
        function.variable_usages = self.usages;
        function.attribute_accesses = self.attribute_accesses;
        function.locals = self.locals;
        function.blocks = self.blocks;
        function.throws = self.throws;
        function.catches = self.catches;
        function.emits = self.emits;
        function.handlers = self.handlers;
    }
}

/// Analyze the body in the byte range `start..end`.
pub fn analyze_body(src: &SourceText<'_>, start: usize, end: usize) -> BodyFacts {
    let end = end.min(src.len());
    let start = start.min(end);
    let body = &src.masked()[start..end];

    let (usages, attribute_accesses) = scan_usages(src, start, end);
    let mut throws = Vec::new();
    let mut catches = Vec::new();
    collect_exceptions(src.syntax(), body, &mut throws, &mut catches);
    let (emits, handlers) = scan_events(src, start, end);

    BodyFacts {
        complexity: complexity(body, src.syntax()),
        max_nesting: max_nesting(src, start, end),
        calls: extract_calls(src, start, end),
        usages,
        attribute_accesses,
        locals: extract_locals(src, start, end),
        blocks: extract_blocks(src, start, end),
        throws,
        catches,
        emits,
        handlers,
    }
}

/// Cyclomatic complexity proxy over masked text: one plus the number of
/// branch keywords and short-circuit or conditional operators.
pub fn complexity(masked: &str, syntax: Syntax) -> u32 {
    let mut count = 1u32;
    match syntax {
        Syntax::Python => {
            count += PY_BRANCH.find_iter(masked).count() as u32;
        }
        Syntax::Rust => {
            count += RUST_BRANCH.find_iter(masked).count() as u32;
            let arms = masked.matches("=>").count() as u32;
            let matches = RUST_MATCH.find_iter(masked).count() as u32;
            count += arms.saturating_sub(matches);
            count += count_logical(masked.as_bytes(), false);
        }
        _ => {
            count += TS_BRANCH.find_iter(masked).count() as u32;
            count += count_logical(masked.as_bytes(), true);
        }
    }
    count
}

fn count_logical(b: &[u8], ternary: bool) -> u32 {
    let mut count = 0;
    let mut i = 0;
    while i < b.len() {
        let next = b.get(i + 1).copied();
        match (b[i], next) {
            (b'&', Some(b'&')) | (b'|', Some(b'|')) => {
                count += 1;
                i += 2;
                continue;
            }
            (b'?', Some(b'?')) if ternary => {
                count += 1;
                i += 2;
                continue;
            }
            (b'?', next) if ternary => {
                let optional = matches!(
                    next,
                    Some(b'.') | Some(b':') | Some(b',') | Some(b')') | Some(b'=')
                );
                if !optional {
                    count += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    count
}

/// Maximum bracket depth (braces) or indentation depth (Python) of a body.
fn max_nesting(src: &SourceText<'_>, start: usize, end: usize) -> u32 {
    if src.syntax().uses_braces() {
        let mut depth = 0u32;
        let mut max = 0u32;
        for &b in &src.masked().as_bytes()[start..end] {
            match b {
                b'{' => {
                    depth += 1;
                    max = max.max(depth);
                }
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        return max;
    }

    let first = src.line_of(start);
    let last = src.line_of(end.saturating_sub(1).max(start));
    let indents: Vec<usize> = (first..=last)
        .map(|l| src.masked_line(l))
        .filter(|l| !l.trim().is_empty())
        .map(indent_width)
        .collect();
    let Some(&base) = indents.first() else {
        return 0;
    };
    let unit = indents
        .iter()
        .filter(|&&w| w > base)
        .map(|&w| w - base)
        .min()
        .unwrap_or(4)
        .max(1);
    indents
        .iter()
        .map(|&w| (w.saturating_sub(base) / unit) as u32)
        .max()
        .unwrap_or(0)
}

/// Call sites in the byte range `start..end`.
pub fn extract_calls(src: &SourceText<'_>, start: usize, end: usize) -> Vec<CallInfo> {
    let masked = src.masked();
    let body = &masked[start..end];
    let mut calls = Vec::new();

    for caps in CALL.captures_iter(body) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        if caps.get(4).is_some() {
            // Macro invocation.
            continue;
        }

        let path_text: String = path.as_str().chars().filter(|c| !c.is_whitespace()).collect();
        let (receiver, target) = split_call_path(&path_text);
        if is_keyword(target) {
            continue;
        }

        let abs_path = start + path.start();
        let before = masked[..abs_path].trim_end();
        if ["function", "fn", "def", "class"]
            .iter()
            .any(|kw| before.ends_with(kw) && word_ends_at(before, kw))
        {
            continue;
        }

        let open = start + whole.end() - 1;
        let close = src.matching_close(open);
        let close_at = close.unwrap_or(end).min(end);

        // Method shorthand and function declarations in object literals.
        if src.syntax() == Syntax::TypeScript {
            let after = masked[(close_at + 1).min(masked.len())..].trim_start();
            if after.starts_with('{') && receiver.is_none() {
                continue;
            }
        }

        let arguments = split_arguments(src, open + 1, close_at);

        let is_awaited = match src.syntax() {
            Syntax::Rust => masked[(close_at + 1).min(masked.len())..]
                .trim_start()
                .starts_with(".await"),
            _ => before.ends_with("await") && word_ends_at(before, "await"),
        };

        calls.push(CallInfo {
            target: target.to_string(),
            receiver: receiver.map(str::to_string),
            line: src.line_of(abs_path),
            arguments,
            is_awaited,
            is_constructor: caps.get(1).is_some(),
        });
    }

    calls
}

fn word_ends_at(text: &str, word: &str) -> bool {
    let bytes = text.as_bytes();
    let start = text.len() - word.len();
    start == 0 || !is_ident_byte(bytes[start - 1])
}

fn split_call_path(path: &str) -> (Option<&str>, &str) {
    let cut = [path.rfind("?."), path.rfind('.'), path.rfind("::")]
        .into_iter()
        .flatten()
        .max();
    match cut {
        Some(idx) => {
            let target = path[idx..].trim_start_matches(['?', '.', ':']);
            let receiver = path[..idx].trim_end_matches('?');
            (Some(receiver), target)
        }
        None => (None, path),
    }
}

/// Raw argument texts between `from` and `to`, split at top-level commas.
fn split_arguments(src: &SourceText<'_>, from: usize, to: usize) -> Vec<String> {
    if from >= to {
        return Vec::new();
    }
    let masked = &src.masked().as_bytes()[from..to];
    let raw = &src.raw()[from..to];
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut seg_start = 0;
    for (i, &b) in masked.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                push_arg(&mut args, &raw[seg_start..i]);
                seg_start = i + 1;
            }
            _ => {}
        }
    }
    push_arg(&mut args, &raw[seg_start..]);
    args
}

fn push_arg(args: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        args.push(truncate(text, 120));
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Token {
    Ident,
    Keyword,
    Declare,
    Close,
    Other,
}

/// Identifier reads/writes and attribute accesses in `start..end`.
fn scan_usages(
    src: &SourceText<'_>,
    start: usize,
    end: usize,
) -> (Vec<VariableUsageInfo>, Vec<AttributeAccessInfo>) {
    let masked = src.masked();
    let b = masked.as_bytes();
    let mut usages = Vec::new();
    let mut accesses = Vec::new();
    let mut stack: Vec<bool> = Vec::new();
    let mut last = Token::Other;
    let mut i = start;

    while i < end {
        let c = b[i];
        if c.is_ascii_digit() {
            while i < end && (is_ident_byte(b[i]) || b[i] == b'.') {
                i += 1;
            }
            last = Token::Other;
            continue;
        }
        if is_ident_start(c) {
            let word_start = i;
            while i < end && is_ident_byte(b[i]) {
                i += 1;
            }
            let word = &masked[word_start..i];
            let prev = prev_non_space(b, start, word_start);
            let next_at = next_non_space(b, i, end);
            let next = next_at.map(|p| b[p]);
            let next2 = next_at.and_then(|p| b.get(p + 1).copied());

            if is_keyword(word) {
                last = if matches!(word, "let" | "const" | "var" | "mut") {
                    Token::Declare
                } else {
                    Token::Keyword
                };
                continue;
            }
            let declared = last == Token::Declare;
            last = Token::Ident;

            let after_dot = prev == Some(b'.') && !(word_start >= 2 && b[word_start - 2] == b'.');
            let path_segment = prev == Some(b':') && word_start >= 2 && b[word_start - 2] == b':'
                || (next == Some(b':') && next2 == Some(b':'));
            if next == Some(b'(') || next == Some(b'!') && next2 == Some(b'(') || path_segment {
                continue;
            }

            let assigns = next == Some(b'=') && !matches!(next2, Some(b'=') | Some(b'>'));
            let access = if assigns || declared {
                Access::Write
            } else {
                Access::Read
            };

            if after_dot {
                if let Some(receiver) = receiver_before(masked, start, word_start) {
                    accesses.push(AttributeAccessInfo {
                        receiver,
                        name: word.to_string(),
                        line: src.line_of(word_start),
                        access,
                    });
                }
                continue;
            }

            let in_call = stack.last().copied().unwrap_or(false);
            if in_call && assigns {
                // Keyword argument name.
                continue;
            }
            if next == Some(b':')
                && src.syntax() != Syntax::Python
                && matches!(prev, Some(b'{') | Some(b',') | Some(b'(') | None)
                && !declared
            {
                // Object key or parameter annotation.
                continue;
            }

            let shape = if access == Access::Write {
                UsageShape::Plain
            } else {
                usage_shape(src, word_start, in_call)
            };
            usages.push(VariableUsageInfo {
                name: word.to_string(),
                line: src.line_of(word_start),
                access,
                shape,
            });
            continue;
        }

        match c {
            b'(' => stack.push(matches!(last, Token::Ident | Token::Close)),
            b'[' => stack.push(stack.last().copied().unwrap_or(false)),
            b'{' => stack.push(false),
            b')' | b']' | b'}' => {
                stack.pop();
                last = Token::Close;
                i += 1;
                continue;
            }
            _ => {}
        }
        if !c.is_ascii_whitespace() {
            last = Token::Other;
        }
        i += 1;
    }

    (usages, accesses)
}

fn prev_non_space(b: &[u8], floor: usize, at: usize) -> Option<u8> {
    let mut i = at;
    while i > floor {
        i -= 1;
        if !b[i].is_ascii_whitespace() {
            return Some(b[i]);
        }
    }
    None
}

fn next_non_space(b: &[u8], from: usize, end: usize) -> Option<usize> {
    (from..end.min(b.len())).find(|&i| !b[i].is_ascii_whitespace())
}

fn receiver_before(masked: &str, floor: usize, word_start: usize) -> Option<String> {
    let b = masked.as_bytes();
    let mut i = word_start;
    while i > floor && (b[i - 1].is_ascii_whitespace() || b[i - 1] == b'.' || b[i - 1] == b'?') {
        i -= 1;
    }
    let end = i;
    while i > floor && is_ident_byte(b[i - 1]) {
        i -= 1;
    }
    (i < end).then(|| masked[i..end].to_string())
}

fn usage_shape(src: &SourceText<'_>, offset: usize, in_call: bool) -> UsageShape {
    if in_call {
        return UsageShape::Argument;
    }
    let line = src.line_of(offset);
    let line_start = src.line_start(line);
    let before = &src.masked()[line_start..offset];
    let trimmed = before.trim_start();

    if let Some(eq) = plain_assignment(before) {
        let lhs = before[..eq].trim();
        if lhs.starts_with("self.") || lhs.starts_with("this.") {
            return UsageShape::Attribute;
        }
        return UsageShape::Assignment;
    }
    if trimmed.starts_with("return")
        && trimmed.as_bytes().get(6).map_or(true, |b| !is_ident_byte(*b))
    {
        return UsageShape::Return;
    }
    UsageShape::Plain
}

/// Offset of a plain `=` (not part of a comparison or arrow).
fn plain_assignment(text: &str) -> Option<usize> {
    let b = text.as_bytes();
    (0..b.len()).find(|&i| {
        b[i] == b'='
            && b.get(i + 1).map_or(true, |n| *n != b'=' && *n != b'>')
            && (i == 0 || !matches!(b[i - 1], b'=' | b'!' | b'<' | b'>'))
    })
}

/// Local variable declarations in `start..end`, first occurrence per name.
pub fn extract_locals(src: &SourceText<'_>, start: usize, end: usize) -> Vec<VariableInfo> {
    let masked = &src.masked()[start..end];
    let mut locals: Vec<VariableInfo> = Vec::new();
    let mut push = |name: &str, kind: VariableKind, line: usize, data_type: Option<String>| {
        if name.is_empty() || is_keyword(name) || locals.iter().any(|l| l.name == name) {
            return;
        }
        locals.push(VariableInfo {
            name: name.to_string(),
            kind,
            line,
            data_type,
            visibility: Visibility::Private,
            is_exported: false,
            value: None,
            documentation: None,
        });
    };

    match src.syntax() {
        Syntax::Rust => {
            for caps in RUST_LOCAL.captures_iter(masked) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                    continue;
                };
                let data_type = caps.get(3).map(|m| m.as_str().trim().to_string());
                push(name.as_str(), VariableKind::Variable, src.line_of(start + whole.start()), data_type);
            }
        }
        Syntax::Python => {
            let first = src.line_of(start);
            let last = src.line_of(end.saturating_sub(1).max(start));
            for l in first..=last {
                let text = src.masked_line(l);
                if let Some(caps) = PY_LOCAL.captures(text) {
                    if let Some(name) = caps.get(1) {
                        let data_type = caps.get(2).map(|m| m.as_str().trim().to_string());
                        let kind = if name.as_str().chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()) {
                            VariableKind::Constant
                        } else {
                            VariableKind::Variable
                        };
                        push(name.as_str(), kind, l, data_type);
                    }
                }
            }
        }
        _ => {
            for caps in TS_LOCAL.captures_iter(masked) {
                let (Some(whole), Some(kw), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                    continue;
                };
                let kind = if kw.as_str() == "const" {
                    VariableKind::Constant
                } else {
                    VariableKind::Variable
                };
                let data_type = caps.get(3).map(|m| m.as_str().trim().to_string());
                push(name.as_str(), kind, src.line_of(start + whole.start()), data_type);
            }
            for caps in TS_DESTRUCTURE.captures_iter(masked) {
                let (Some(whole), Some(kw), Some(names)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                    continue;
                };
                let kind = if kw.as_str() == "const" {
                    VariableKind::Constant
                } else {
                    VariableKind::Variable
                };
                let line = src.line_of(start + whole.start());
                for part in names.as_str().split(',') {
                    let local = part
                        .rsplit(':')
                        .next()
                        .unwrap_or("")
                        .split('=')
                        .next()
                        .unwrap_or("")
                        .trim()
                        .trim_start_matches("...");
                    push(local, kind, line, None);
                }
            }
        }
    }

    locals.sort_by_key(|l| l.line);
    locals
}

/// Control blocks in `start..end`, ordered by position.
pub fn extract_blocks(src: &SourceText<'_>, start: usize, end: usize) -> Vec<BlockInfo> {
    let mut blocks = Vec::new();

    if src.syntax() == Syntax::Python {
        let first = src.line_of(start);
        let last = src.line_of(end.saturating_sub(1).max(start));
        for l in first..=last {
            let text = src.masked_line(l).trim_start();
            let text = text.strip_prefix("async ").unwrap_or(text);
            let keyword = ["if", "for", "while", "try", "match", "with"]
                .into_iter()
                .find(|kw| {
                    text.starts_with(kw)
                        && text[kw.len()..].starts_with([' ', ':', '('])
                        && text.trim_end().ends_with(':')
                });
            let Some(keyword) = keyword else { continue };
            if keyword == "with" {
                continue;
            }
            // The header line of the function itself is not a block.
            if src.line_start(l) < start {
                continue;
            }
            blocks.push(BlockInfo {
                kind: block_kind(keyword),
                keyword: keyword.to_string(),
                line: l,
                end_line: src.indent_block_end(l).min(last),
            });
        }
        return blocks;
    }

    let masked = &src.masked()[start..end];
    let b = src.masked().as_bytes();
    for m in BRACE_BLOCK_KEYWORD.find_iter(masked) {
        let abs = start + m.start();
        let keyword = m.as_str();
        let prev = prev_non_space(b, start, abs);
        if prev == Some(b'.') {
            continue;
        }
        if keyword == "while" && prev == Some(b'}') {
            continue;
        }
        if src.syntax() != Syntax::Rust && matches!(keyword, "match" | "loop") {
            continue;
        }
        let span = src.brace_body(start + m.end());
        if let Some(open) = span.open {
            if open > end || src.masked()[start + m.end()..open].contains("=>") {
                continue;
            }
        }
        blocks.push(BlockInfo {
            kind: block_kind(keyword),
            keyword: keyword.to_string(),
            line: src.line_of(abs),
            end_line: src.line_of(span.end.min(end.saturating_sub(1).max(abs))),
        });
    }
    blocks
}

fn block_kind(keyword: &str) -> BlockKind {
    match keyword {
        "for" | "while" | "loop" | "do" => BlockKind::Loop,
        "try" => BlockKind::TryCatch,
        "match" | "switch" => BlockKind::MatchArm,
        _ => BlockKind::Conditional,
    }
}

fn collect_exceptions(syntax: Syntax, body: &str, throws: &mut Vec<String>, catches: &mut Vec<String>) {
    let add = |list: &mut Vec<String>, name: &str| {
        let name = name.trim().rsplit('.').next().unwrap_or("").trim();
        if !name.is_empty() && !is_keyword(name) && !list.iter().any(|n| n == name) {
            list.push(name.to_string());
        }
    };

    match syntax {
        Syntax::Python => {
            for caps in PY_RAISE.captures_iter(body) {
                if let Some(m) = caps.get(1) {
                    add(throws, m.as_str());
                }
            }
            for caps in PY_EXCEPT.captures_iter(body) {
                if let Some(m) = caps.get(1) {
                    let names = m.as_str().split(" as ").next().unwrap_or("");
                    for name in names.split(',') {
                        add(catches, name);
                    }
                }
            }
        }
        Syntax::Rust => {
            for caps in RUST_ERR.captures_iter(body) {
                if let Some(m) = caps.get(1) {
                    add(throws, m.as_str());
                }
            }
        }
        _ => {
            for caps in TS_THROW.captures_iter(body) {
                if let Some(m) = caps.get(1) {
                    add(throws, m.as_str());
                }
            }
            for caps in TS_CATCH.captures_iter(body).chain(TS_INSTANCEOF.captures_iter(body)) {
                if let Some(m) = caps.get(1) {
                    add(catches, m.as_str());
                }
            }
        }
    }
}

fn scan_events(src: &SourceText<'_>, start: usize, end: usize) -> (Vec<String>, Vec<EventHandlerInfo>) {
    let masked = &src.masked()[start..end];
    let mut emits = Vec::new();
    let mut handlers = Vec::new();

    for m in EMIT.find_iter(masked) {
        let quote = start + m.end() - 1;
        if let Some(event) = src.literal_at(quote) {
            if !event.is_empty() && !emits.iter().any(|e| e == event) {
                emits.push(event.to_string());
            }
        }
    }

    for m in HANDLER.find_iter(masked) {
        let quote = start + m.end() - 1;
        let Some(region) = src.region_at(quote).copied() else {
            continue;
        };
        let event = &src.raw()[region.inner_start..region.inner_end];
        let rest = &src.masked()[region.end.min(end)..end];
        let handler = HANDLER_TARGET
            .captures(rest)
            .and_then(|c| c.get(1))
            .map(|h| h.as_str())
            .filter(|h| !is_keyword(h));
        if let Some(handler) = handler {
            if !event.is_empty() {
                handlers.push(EventHandlerInfo {
                    event: event.to_string(),
                    handler: handler.to_string(),
                    line: src.line_of(quote),
                });
            }
        }
    }

    (emits, handlers)
}

/// Parse a parameter list (the text between the parentheses).
pub fn parse_parameters(list: &str, syntax: Syntax) -> Vec<ParameterInfo> {
    let mut params = Vec::new();

    for part in split_top_level(list, b',') {
        let mut text = part.trim();
        let mut is_rest = false;

        match syntax {
            Syntax::Python => {
                if text == "*" || text == "/" {
                    continue;
                }
                if let Some(rest) = text.strip_prefix("**") {
                    text = rest;
                    is_rest = true;
                } else if let Some(rest) = text.strip_prefix('*') {
                    text = rest;
                    is_rest = true;
                }
            }
            Syntax::Rust => {
                let bare = text.trim_start_matches('&').trim_start();
                let bare = bare.strip_prefix("mut ").unwrap_or(bare).trim_start();
                if bare == "self" || bare.starts_with("self:") || bare.starts_with('\'') && bare.contains("self") {
                    continue;
                }
                text = text.strip_prefix("mut ").unwrap_or(text);
            }
            _ => {
                for modifier in ["public ", "private ", "protected ", "readonly ", "override "] {
                    while let Some(rest) = text.strip_prefix(modifier) {
                        text = rest.trim_start();
                    }
                }
                if let Some(rest) = text.strip_prefix("...") {
                    text = rest;
                    is_rest = true;
                }
            }
        }

        let (decl, default_value) = match split_top_level(text, b'=').as_slice() {
            [decl] => (*decl, None),
            [decl, rest @ ..] => (*decl, Some(rest.join("="))),
            [] => continue,
        };
        let (name, data_type) = match decl.split_once(':') {
            Some((name, ty)) => (name.trim(), Some(ty.trim().to_string())),
            None => (decl.trim(), None),
        };
        let is_optional = name.ends_with('?') || default_value.is_some();
        let name = name.trim_end_matches('?');

        if name.is_empty() || !name.bytes().all(is_ident_byte) {
            continue;
        }
        if syntax == Syntax::Python && (name == "self" || name == "cls") && params.is_empty() {
            continue;
        }
        if syntax == Syntax::TypeScript && name == "this" {
            continue;
        }

        params.push(ParameterInfo {
            name: name.to_string(),
            data_type: data_type.filter(|t| !t.is_empty()),
            default_value: default_value.map(|v| truncate(v.trim(), 80)),
            is_optional,
            is_rest,
        });
    }

    params
}
