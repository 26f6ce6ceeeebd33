//! Fact structures extracted from a single source file.
//!
//! Facts are plain data: every parser produces them from raw text, nothing
//! mutates them afterwards, and all line numbers are 1-indexed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source language of a file.
///
/// Only TypeScript, JavaScript, Python and Rust have parsers. The remaining
/// variants are recognized so that their files still appear in the graph as
/// file nodes with empty structural facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    Kotlin,
    CSharp,
    C,
    Cpp,
    Ruby,
    Php,
    Swift,
    Json,
    Yaml,
    Toml,
    Markdown,
    Html,
    Css,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::CSharp => "csharp",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Markdown => "markdown",
            Language::Html => "html",
            Language::Css => "css",
            Language::Unknown => "unknown",
        }
    }

    /// Whether a structural parser exists for this language.
    pub fn is_parsed(&self) -> bool {
        matches!(
            self,
            Language::TypeScript | Language::JavaScript | Language::Python | Language::Rust
        )
    }

    /// Separator used when joining qualified names.
    pub fn path_separator(&self) -> &'static str {
        match self {
            Language::Rust => "::",
            _ => ".",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared visibility of a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Internal => "internal",
        }
    }
}

/// Architectural layer a file belongs to, inferred from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Presentation,
    Api,
    Service,
    Data,
    Utility,
    Config,
    Test,
    #[default]
    Unknown,
}

impl Layer {
    /// Classify a relative path. Test markers win over directory names.
    pub fn from_path(path: &str) -> Self {
        let normalized = path.replace('\\', "/").to_lowercase();
        let file_name = normalized.rsplit('/').next().unwrap_or("");

        if file_name.contains(".test.")
            || file_name.contains(".spec.")
            || file_name.starts_with("test_")
            || file_name.ends_with("_test.py")
            || file_name.ends_with("_test.rs")
        {
            return Layer::Test;
        }

        let dirs: Vec<&str> = normalized.split('/').collect();
        let dirs = &dirs[..dirs.len().saturating_sub(1)];

        for dir in dirs.iter().rev() {
            let layer = match *dir {
                "test" | "tests" | "__tests__" | "spec" | "specs" => Layer::Test,
                "components" | "views" | "pages" | "ui" | "templates" | "screens"
                | "widgets" => Layer::Presentation,
                "api" | "routes" | "controllers" | "handlers" | "endpoints" | "routers" => {
                    Layer::Api
                }
                "services" | "service" | "domain" | "core" | "logic" | "usecases" => {
                    Layer::Service
                }
                "models" | "db" | "database" | "repositories" | "repository" | "schema"
                | "entities" | "migrations" | "store" | "dao" => Layer::Data,
                "utils" | "util" | "helpers" | "common" | "shared" | "lib" => Layer::Utility,
                "config" | "configs" | "settings" => Layer::Config,
                _ => continue,
            };
            return layer;
        }

        let stem = file_name.split('.').next().unwrap_or("");
        match stem {
            "config" | "settings" | "constants" => Layer::Config,
            _ => Layer::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Presentation => "presentation",
            Layer::Api => "api",
            Layer::Service => "service",
            Layer::Data => "data",
            Layer::Utility => "utility",
            Layer::Config => "config",
            Layer::Test => "test",
            Layer::Unknown => "unknown",
        }
    }
}

/// A single name brought into scope by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportItem {
    /// Name as exported by the imported module (`*` for namespace/glob imports).
    pub name: String,
    /// Local alias, if renamed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Whether the local name is referenced outside import statements.
    pub referenced: bool,
}

impl ImportItem {
    /// The identifier this item binds in the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Module specifier as written (`./utils`, `os.path`, `crate::graph`).
    pub module: String,
    pub items: Vec<ImportItem>,
    pub line: usize,
    /// Relative import (`./x`, `.mod`, `super::`, `crate::`).
    pub is_relative: bool,
    /// TypeScript `import type`.
    #[serde(default)]
    pub is_type_only: bool,
}

/// Kind of exported construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Function,
    Class,
    Variable,
    Type,
    Default,
    ReExport,
}

/// An exported name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
    pub line: usize,
    /// Module the name is re-exported from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Kind of type-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Class,
    Struct,
    Interface,
    Trait,
    Enum,
    TypeAlias,
}

/// A class, struct, interface, trait, enum or type alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub kind: ClassKind,
    pub line: usize,
    pub end_line: usize,
    pub visibility: Visibility,
    pub is_exported: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub methods: Vec<FunctionInfo>,
    pub attributes: Vec<AttributeInfo>,
}

/// A class field or struct member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
}

/// Kind of callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Function,
    Method,
    Constructor,
    Closure,
    Handler,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub is_rest: bool,
}

/// A call site inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    /// Called name, last path segment (`bar` for `this.foo.bar()`).
    pub target: String,
    /// Receiver or path prefix (`this.foo`, `Config`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub line: usize,
    /// Raw argument expressions, split at top-level commas.
    pub arguments: Vec<String>,
    #[serde(default)]
    pub is_awaited: bool,
    /// `new X(...)` in TS/JS.
    #[serde(default)]
    pub is_constructor: bool,
}

/// Read or write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

/// Token shape around an identifier occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageShape {
    /// Passed as a call argument.
    Argument,
    /// Assigned into an attribute (`self.x = name`).
    Attribute,
    /// Part of a `return` expression.
    Return,
    /// Right-hand side of a plain assignment.
    Assignment,
    Plain,
}

/// An identifier occurrence inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableUsageInfo {
    pub name: String,
    pub line: usize,
    pub access: Access,
    pub shape: UsageShape,
}

/// A `receiver.name` access that is not a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAccessInfo {
    pub receiver: String,
    pub name: String,
    pub line: usize,
    pub access: Access,
}

/// Kind of control block inside a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Conditional,
    Loop,
    TryCatch,
    MatchArm,
}

/// A control block with its line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub kind: BlockKind,
    /// Leading keyword (`if`, `for`, `match`, ...).
    pub keyword: String,
    pub line: usize,
    pub end_line: usize,
}

/// An event handler registration (`emitter.on("evt", handler)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandlerInfo {
    pub event: String,
    pub handler: String,
    pub line: usize,
}

/// A function, method, constructor or closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub kind: FunctionKind,
    pub line: usize,
    pub end_line: usize,
    pub parameters: Vec<ParameterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default)]
    pub decorators: Vec<String>,
    /// Extra markers such as `abstract`, `generator`, `trait_impl`, `unsafe`.
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Owning class/struct, for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    pub complexity: u32,
    pub max_nesting: u32,
    pub calls: Vec<CallInfo>,
    pub variable_usages: Vec<VariableUsageInfo>,
    #[serde(default)]
    pub attribute_accesses: Vec<AttributeAccessInfo>,
    #[serde(default)]
    pub locals: Vec<VariableInfo>,
    #[serde(default)]
    pub blocks: Vec<BlockInfo>,
    #[serde(default)]
    pub throws: Vec<String>,
    #[serde(default)]
    pub catches: Vec<String>,
    #[serde(default)]
    pub emits: Vec<String>,
    #[serde(default)]
    pub handlers: Vec<EventHandlerInfo>,
}

impl FunctionInfo {
    /// Create a function fact with empty body facts.
    pub fn new(name: &str, kind: FunctionKind, line: usize, end_line: usize) -> Self {
        Self {
            name: name.to_string(),
            kind,
            line,
            end_line,
            parameters: Vec::new(),
            return_type: None,
            visibility: Visibility::Public,
            is_async: false,
            is_static: false,
            is_exported: false,
            decorators: Vec::new(),
            modifiers: Vec::new(),
            documentation: None,
            parent_class: None,
            complexity: 1,
            max_nesting: 0,
            calls: Vec::new(),
            variable_usages: Vec::new(),
            attribute_accesses: Vec::new(),
            locals: Vec::new(),
            blocks: Vec::new(),
            throws: Vec::new(),
            catches: Vec::new(),
            emits: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Lines of code spanned by the declaration.
    pub fn loc(&self) -> usize {
        self.end_line.saturating_sub(self.line) + 1
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// Kind of variable declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Variable,
    Constant,
}

/// A module-level or local variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub kind: VariableKind,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub visibility: Visibility,
    #[serde(default)]
    pub is_exported: bool,
    /// Initializer text, truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// All facts extracted from a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Project-relative path with `/` separators.
    pub path: String,
    pub language: Language,
    /// Size in bytes.
    pub size: usize,
    pub line_count: usize,
    pub layer: Layer,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub classes: Vec<ClassInfo>,
    pub functions: Vec<FunctionInfo>,
    pub variables: Vec<VariableInfo>,
}

impl FileInfo {
    /// Create facts for a file with no structural content.
    pub fn empty(path: &str, language: Language, content: &str) -> Self {
        Self {
            path: path.to_string(),
            language,
            size: content.len(),
            line_count: count_lines(content),
            layer: Layer::from_path(path),
            imports: Vec::new(),
            exports: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Iterate over every callable in the file, methods included.
    pub fn callables(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions
            .iter()
            .chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    /// Whether `name` is exported by this file.
    pub fn exports_name(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e.name == name)
    }

    /// Sum of complexity over all callables.
    pub fn total_complexity(&self) -> u32 {
        self.callables().map(|f| f.complexity).sum()
    }
}

/// One input file: project-relative path, language and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Project-relative path with `/` separators.
    pub path: String,
    pub language: Language,
    pub content: String,
}

impl SourceFile {
    /// Create a source file, detecting the language from the extension.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into().replace('\\', "/");
        let language = super::languages::detect_language(&path);
        Self {
            path,
            language,
            content: content.into(),
        }
    }

    pub fn with_language(path: impl Into<String>, language: Language, content: impl Into<String>) -> Self {
        Self {
            path: path.into().replace('\\', "/"),
            language,
            content: content.into(),
        }
    }
}

/// Number of lines, counting a trailing line without newline.
pub fn count_lines(content: &str) -> usize {
    if content.is_empty() {
        0
    } else {
        content.lines().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_from_path() {
        assert_eq!(Layer::from_path("src/components/Button.tsx"), Layer::Presentation);
        assert_eq!(Layer::from_path("src/api/users.ts"), Layer::Api);
        assert_eq!(Layer::from_path("app/models/user.py"), Layer::Data);
        assert_eq!(Layer::from_path("src/utils/date.ts"), Layer::Utility);
        assert_eq!(Layer::from_path("src/components/Button.test.tsx"), Layer::Test);
        assert_eq!(Layer::from_path("tests/test_graph.py"), Layer::Test);
        assert_eq!(Layer::from_path("config.py"), Layer::Config);
        assert_eq!(Layer::from_path("main.rs"), Layer::Unknown);
    }

    #[test]
    fn test_callables_include_methods() {
        let mut file = FileInfo::empty("a.ts", Language::TypeScript, "x\ny\n");
        file.functions.push(FunctionInfo::new("top", FunctionKind::Function, 1, 1));
        file.classes.push(ClassInfo {
            name: "A".to_string(),
            kind: ClassKind::Class,
            line: 2,
            end_line: 4,
            visibility: Visibility::Public,
            is_exported: false,
            is_abstract: false,
            extends: None,
            implements: Vec::new(),
            decorators: Vec::new(),
            documentation: None,
            methods: vec![FunctionInfo::new("m", FunctionKind::Method, 3, 3)],
            attributes: Vec::new(),
        });

        let names: Vec<_> = file.callables().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["top", "m"]);
        assert_eq!(file.line_count, 2);
        assert_eq!(file.total_complexity(), 2);
    }

    #[test]
    fn test_function_loc() {
        let f = FunctionInfo::new("f", FunctionKind::Function, 10, 14);
        assert_eq!(f.loc(), 5);
    }
}
