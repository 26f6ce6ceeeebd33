//! Import target resolution against the project's own file paths.
//!
//! Resolution is best-effort path matching. A module that matches no project
//! file (a third-party package, the standard library) resolves to nothing,
//! which is the expected outcome rather than an error.

use std::collections::{BTreeSet, HashMap};

use crate::analysis::{ImportInfo, Language};

/// Directories that hold sources rather than name a module.
const SOURCE_ROOTS: &[&str] = &["src", "lib", "app", "packages", "crates", "pkg"];

const SCRIPT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "py", "pyw", "rs",
];

/// Grouping directory of a file, used as its module name.
///
/// The first path component, or the first two when the first is a
/// conventional source root. Files at the project root group under `.`.
pub fn module_of(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [] | [_] => ".".to_string(),
        [first, second, _, ..] if SOURCE_ROOTS.contains(first) => format!("{}/{}", first, second),
        [first, ..] => first.to_string(),
    }
}

fn dir_of(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if dot > path.rfind('/').map(|s| s + 1).unwrap_or(0) => {
            let ext = &path[dot + 1..];
            if SCRIPT_EXTENSIONS.contains(&ext) {
                &path[..dot]
            } else {
                path
            }
        }
        _ => path,
    }
}

fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        dir.to_string()
    } else {
        format!("{}/{}", dir, rel)
    }
}

/// Collapse `.` and `..` components. Returns None when the path climbs above
/// the project root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.split('/')
        .zip(b.split('/'))
        .take_while(|(x, y)| x == y)
        .count()
}

/// Resolves import module strings to project file paths.
pub struct ModuleResolver {
    paths: BTreeSet<String>,
    /// Path without script extension -> paths, sorted.
    by_stem: HashMap<String, Vec<String>>,
}

impl ModuleResolver {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let paths: BTreeSet<String> = paths.into_iter().map(str::to_string).collect();
        let mut by_stem: HashMap<String, Vec<String>> = HashMap::new();
        for path in &paths {
            by_stem
                .entry(strip_extension(path).to_string())
                .or_default()
                .push(path.clone());
        }
        Self { paths, by_stem }
    }

    /// Resolve an import of `from` to the project files it refers to.
    pub fn resolve(&self, from: &str, language: Language, import: &ImportInfo) -> Vec<String> {
        let mut targets: Vec<String> = match language {
            Language::TypeScript | Language::JavaScript => {
                self.resolve_script(from, &import.module).into_iter().collect()
            }
            Language::Python => self.resolve_python(from, import),
            Language::Rust => self.resolve_rust(from, import),
            _ => Vec::new(),
        };
        targets.retain(|t| t != from);
        targets.dedup();
        targets
    }

    fn by_stem(&self, stem: &str) -> Option<&str> {
        self.by_stem
            .get(stem)
            .and_then(|paths| paths.first())
            .map(String::as_str)
    }

    fn resolve_script(&self, from: &str, module: &str) -> Option<String> {
        if module.starts_with('.') {
            let joined = normalize(&join(dir_of(from), module))?;
            return self.script_candidate(&joined);
        }
        // Path aliases such as `@/x` and `~/x`.
        let stripped = module
            .strip_prefix("@/")
            .or_else(|| module.strip_prefix("~/"))
            .unwrap_or(module);
        if !stripped.contains('/') || (module.starts_with('@') && stripped == module) {
            return None;
        }
        self.suffix_match(from, strip_extension(stripped))
            .or_else(|| self.suffix_match(from, &format!("{}/index", stripped)))
    }

    fn script_candidate(&self, joined: &str) -> Option<String> {
        if self.paths.contains(joined) {
            return Some(joined.to_string());
        }
        self.by_stem(strip_extension(joined))
            .or_else(|| self.by_stem(&format!("{}/index", joined)))
            .map(str::to_string)
    }

    /// Best path whose stem is `stem` or ends with `/stem`: the one sharing
    /// the longest directory prefix with `from`, then the first by path.
    fn suffix_match(&self, from: &str, stem: &str) -> Option<String> {
        let needle = format!("/{}", stem);
        let mut best: Option<(&str, usize)> = None;
        for (candidate_stem, paths) in &self.by_stem {
            if candidate_stem != stem && !candidate_stem.ends_with(&needle) {
                continue;
            }
            for path in paths {
                let score = common_prefix_len(dir_of(from), dir_of(path));
                let better = match best {
                    None => true,
                    Some((current, current_score)) => {
                        score > current_score || (score == current_score && path.as_str() < current)
                    }
                };
                if better {
                    best = Some((path, score));
                }
            }
        }
        best.map(|(path, _)| path.to_string())
    }

    fn python_candidate(&self, from: &str, dotted: &str, base: Option<&str>) -> Option<String> {
        let rel = dotted.replace('.', "/");
        match base {
            Some(base) => {
                let target = join(base, &rel);
                self.by_stem(&target)
                    .or_else(|| self.by_stem(&join(&target, "__init__")))
                    .map(str::to_string)
            }
            None => self
                .suffix_match(from, &rel)
                .or_else(|| self.suffix_match(from, &join(&rel, "__init__"))),
        }
    }

    fn resolve_python(&self, from: &str, import: &ImportInfo) -> Vec<String> {
        let module = import.module.as_str();
        let dots = module.chars().take_while(|&c| c == '.').count();
        let rest = &module[dots..];

        let base = if dots > 0 {
            let mut dir = dir_of(from).to_string();
            for _ in 1..dots {
                dir = dir_of(&dir).to_string();
            }
            Some(dir)
        } else {
            None
        };

        let mut targets = Vec::new();
        if !rest.is_empty() {
            if let Some(target) = self.python_candidate(from, rest, base.as_deref()) {
                targets.push(target);
                return targets;
            }
        }
        // `from pkg import module` and `from . import module`.
        for item in &import.items {
            if item.name == "*" {
                continue;
            }
            let dotted = if rest.is_empty() {
                item.name.clone()
            } else {
                format!("{}.{}", rest, item.name)
            };
            if let Some(target) = self.python_candidate(from, &dotted, base.as_deref()) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        targets
    }

    /// Directory holding the submodules of the module defined by `path`.
    fn rust_module_dir(path: &str) -> String {
        let dir = dir_of(path);
        match file_name(path) {
            "main.rs" | "lib.rs" | "mod.rs" => dir.to_string(),
            name => join(dir, name.trim_end_matches(".rs")),
        }
    }

    fn rust_crate_root(&self, path: &str) -> String {
        let mut dir = dir_of(path).to_string();
        loop {
            if self.paths.contains(&join(&dir, "lib.rs")) || self.paths.contains(&join(&dir, "main.rs"))
            {
                return dir;
            }
            if dir.is_empty() {
                break;
            }
            dir = dir_of(&dir).to_string();
        }
        // No crate root among the inputs: fall back to the enclosing `src`.
        match path.find("src/") {
            Some(idx) => path[..idx + 3].to_string(),
            None => dir_of(path).to_string(),
        }
    }

    fn rust_candidate(&self, base: &str, segments: &[&str]) -> Option<String> {
        for len in (1..=segments.len()).rev() {
            let target = join(base, &segments[..len].join("/"));
            let file = format!("{}.rs", target);
            if self.paths.contains(&file) {
                return Some(file);
            }
            let module = join(&target, "mod.rs");
            if self.paths.contains(&module) {
                return Some(module);
            }
        }
        None
    }

    fn resolve_rust(&self, from: &str, import: &ImportInfo) -> Vec<String> {
        let mut segments: Vec<&str> = import.module.split("::").collect();
        let mut base = match segments.first().copied() {
            Some("crate") => self.rust_crate_root(from),
            Some("self") => Self::rust_module_dir(from),
            Some("super") => dir_of(&Self::rust_module_dir(from)).to_string(),
            _ => return Vec::new(),
        };
        segments.remove(0);
        while segments.first() == Some(&"super") {
            base = dir_of(&base).to_string();
            segments.remove(0);
        }

        let mut targets = Vec::new();
        for item in &import.items {
            let mut with_item = segments.clone();
            with_item.push(item.name.as_str());
            if let Some(target) = self.rust_candidate(&base, &with_item) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
        if targets.is_empty() && !segments.is_empty() {
            targets.extend(self.rust_candidate(&base, &segments));
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImportItem;

    fn import(module: &str, items: &[&str]) -> ImportInfo {
        ImportInfo {
            module: module.to_string(),
            items: items
                .iter()
                .map(|name| ImportItem {
                    name: name.to_string(),
                    alias: None,
                    referenced: true,
                })
                .collect(),
            line: 1,
            is_relative: module.starts_with('.'),
            is_type_only: false,
        }
    }

    #[test]
    fn test_module_of() {
        assert_eq!(module_of("main.py"), ".");
        assert_eq!(module_of("src/main.rs"), "src");
        assert_eq!(module_of("src/services/user.ts"), "src/services");
        assert_eq!(module_of("tests/test_api.py"), "tests");
        assert_eq!(module_of("web/components/Button.tsx"), "web");
    }

    #[test]
    fn test_typescript_relative_imports() {
        let resolver = ModuleResolver::new([
            "src/app.ts",
            "src/services/user.ts",
            "src/utils/index.ts",
            "src/legacy.js",
        ]);
        let from = "src/app.ts";
        let ts = Language::TypeScript;
        assert_eq!(
            resolver.resolve(from, ts, &import("./services/user", &[])),
            vec!["src/services/user.ts"]
        );
        assert_eq!(
            resolver.resolve(from, ts, &import("./utils", &[])),
            vec!["src/utils/index.ts"]
        );
        assert_eq!(
            resolver.resolve("src/services/user.ts", ts, &import("../legacy.js", &[])),
            vec!["src/legacy.js"]
        );
        assert!(resolver.resolve(from, ts, &import("react", &[])).is_empty());
        assert!(resolver.resolve(from, ts, &import("../../outside", &[])).is_empty());
    }

    #[test]
    fn test_python_imports() {
        let resolver = ModuleResolver::new([
            "app/main.py",
            "app/models/__init__.py",
            "app/models/user.py",
            "app/services.py",
        ]);
        let py = Language::Python;
        assert_eq!(
            resolver.resolve("app/main.py", py, &import(".services", &["UserService"])),
            vec!["app/services.py"]
        );
        assert_eq!(
            resolver.resolve("app/main.py", py, &import("app.models", &["User"])),
            vec!["app/models/__init__.py"]
        );
        assert_eq!(
            resolver.resolve("app/models/__init__.py", py, &import(".", &["user"])),
            vec!["app/models/user.py"]
        );
        assert!(resolver.resolve("app/main.py", py, &import("os", &["path"])).is_empty());
    }

    #[test]
    fn test_rust_imports() {
        let resolver = ModuleResolver::new([
            "src/main.rs",
            "src/store.rs",
            "src/graph/mod.rs",
            "src/graph/builder.rs",
        ]);
        let rs = Language::Rust;
        assert_eq!(
            resolver.resolve("src/main.rs", rs, &import("self::graph", &[])),
            vec!["src/graph/mod.rs"]
        );
        assert_eq!(
            resolver.resolve("src/main.rs", rs, &import("crate::store", &["Store"])),
            vec!["src/store.rs"]
        );
        assert_eq!(
            resolver.resolve("src/graph/mod.rs", rs, &import("self::builder", &[])),
            vec!["src/graph/builder.rs"]
        );
        assert_eq!(
            resolver.resolve("src/graph/builder.rs", rs, &import("super::super::store", &["Store"])),
            vec!["src/store.rs"]
        );
        assert_eq!(
            resolver.resolve("src/graph/builder.rs", rs, &import("crate", &["store"])),
            vec!["src/store.rs"]
        );
        assert!(resolver.resolve("src/main.rs", rs, &import("std::fmt", &["Display"])).is_empty());
    }
}
