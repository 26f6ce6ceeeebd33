//! Graph construction.
//!
//! Building runs as an ordered pipeline over a per-run arena:
//!
//! 1. [`NodeArena::build`] creates every node from the file facts. The arena
//!    is immutable afterwards.
//! 2. [`EdgeResolver`] resolves references against the finished arena. An
//!    edge is only emitted once both endpoints are known node ids;
//!    unresolved references are dropped.
//! 3. [`metrics::compute`](super::metrics::compute) fills in metrics from the
//!    finished edge set.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use crate::analysis::{
    Access, BlockKind, ClassInfo, ExportKind, FileInfo, FunctionInfo, ImportInfo, ImportItem,
    Language, VariableKind, Visibility,
};

use super::metrics;
use super::resolve::{module_of, ModuleResolver};
use super::types::{CodeEdge, CodeGraph, CodeNode, EdgeKind, Level, Location, NodeMetrics, NodeType};

/// Builds a [`CodeGraph`] from a project's file facts.
pub struct GraphBuilder<'f> {
    project: String,
    files: Vec<&'f FileInfo>,
}

impl<'f> GraphBuilder<'f> {
    /// Files are ordered by path regardless of the input order.
    pub fn new(project: impl Into<String>, files: &'f [FileInfo]) -> Self {
        let mut files: Vec<&FileInfo> = files.iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            project: project.into(),
            files,
        }
    }

    pub fn build(self) -> CodeGraph {
        let arena = NodeArena::build(&self.project, &self.files);
        info!(nodes = arena.nodes.len(), "graph nodes created");

        let edges = EdgeResolver::new(&arena).resolve();
        info!(edges = edges.len(), "graph edges resolved");

        let mut nodes = arena.into_nodes();
        metrics::compute(&mut nodes, &edges);
        CodeGraph::new(nodes, edges)
    }
}

/// Everything needed to create one node.
struct NodeSpec {
    node_type: NodeType,
    name: String,
    full_path: String,
    location: Location,
    visibility: Visibility,
    modifiers: Vec<String>,
    metrics: NodeMetrics,
    language: Option<Language>,
}

impl NodeSpec {
    fn new(node_type: NodeType, name: &str, full_path: String, location: Location) -> Self {
        Self {
            node_type,
            name: name.to_string(),
            full_path,
            location,
            visibility: Visibility::Public,
            modifiers: Vec::new(),
            metrics: NodeMetrics::default(),
            language: None,
        }
    }
}

struct FileEntry<'f> {
    id: String,
    info: &'f FileInfo,
    classes: Vec<usize>,
    functions: Vec<usize>,
    variables: Vec<(&'f str, String)>,
}

struct ClassEntry<'f> {
    id: String,
    file: usize,
    info: &'f ClassInfo,
    methods: Vec<usize>,
    attributes: Vec<(&'f str, String)>,
}

struct FunctionEntry<'f> {
    id: String,
    file: usize,
    info: &'f FunctionInfo,
    owner: Option<usize>,
    params: Vec<(&'f str, String)>,
    locals: Vec<(&'f str, String)>,
}

/// Node set of one build. Created in full before any edge is resolved.
struct NodeArena<'f> {
    nodes: Vec<CodeNode>,
    index: HashMap<String, usize>,
    files: Vec<FileEntry<'f>>,
    file_by_path: HashMap<&'f str, usize>,
    classes: Vec<ClassEntry<'f>>,
    functions: Vec<FunctionEntry<'f>>,
}

fn node_id(node_type: NodeType, location: &Location, name: &str) -> String {
    match node_type.level() {
        Level::System => format!("L1:{}", name),
        Level::Module => format!("L2:{}", name),
        Level::File => format!("L3:{}", location.file),
        level => format!("{}:{}:{}:{}", level, location.file, location.line, name),
    }
}

/// Dotted name of a file: its path without extension, `/` replaced by the
/// language separator.
fn file_full_path(path: &str, separator: &str) -> String {
    let stem = match path.rfind('.') {
        Some(dot) if dot > path.rfind('/').map(|s| s + 1).unwrap_or(0) => &path[..dot],
        _ => path,
    };
    stem.split('/').collect::<Vec<_>>().join(separator)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl<'f> NodeArena<'f> {
    fn build(project: &str, files: &[&'f FileInfo]) -> Self {
        let mut arena = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            files: Vec::new(),
            file_by_path: HashMap::new(),
            classes: Vec::new(),
            functions: Vec::new(),
        };

        let root = arena.add(
            None,
            NodeSpec::new(
                NodeType::System,
                project,
                project.to_string(),
                Location::line(".", 1),
            ),
        );

        let modules: BTreeSet<String> = files.iter().map(|f| module_of(&f.path)).collect();
        let mut module_ids = HashMap::new();
        for module in modules {
            let full_path = module.replace('/', ".");
            let id = arena.add(
                Some(&root),
                NodeSpec::new(NodeType::Module, &module, full_path, Location::line(&module, 1)),
            );
            module_ids.insert(module, id);
        }

        for file in files {
            let Some(module_id) = module_ids.get(&module_of(&file.path)).cloned() else {
                continue;
            };
            arena.add_file(file, &module_id);
        }

        arena
    }

    fn into_nodes(self) -> Vec<CodeNode> {
        self.nodes
    }

    fn node(&self, id: &str) -> Option<&CodeNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    fn full_path_of(&self, id: &str) -> String {
        self.node(id).map(|n| n.full_path.clone()).unwrap_or_default()
    }

    /// Create a node under `parent` and return its id.
    fn add(&mut self, parent: Option<&str>, spec: NodeSpec) -> String {
        let base = node_id(spec.node_type, &spec.location, &spec.name);
        let mut id = base.clone();
        let mut n = 2;
        while self.index.contains_key(&id) {
            id = format!("{}#{}", base, n);
            n += 1;
        }

        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(CodeNode {
            id: id.clone(),
            level: spec.node_type.level(),
            node_type: spec.node_type,
            name: spec.name,
            full_path: spec.full_path,
            location: spec.location,
            visibility: spec.visibility,
            modifiers: spec.modifiers,
            metrics: spec.metrics,
            children: Vec::new(),
            parent: parent.map(str::to_string),
            language: spec.language,
        });

        if let Some(parent) = parent {
            if let Some(&p) = self.index.get(parent) {
                self.nodes[p].children.push(id.clone());
            }
        }
        id
    }

    fn add_file(&mut self, file: &'f FileInfo, module_id: &str) {
        let separator = file.language.path_separator();
        let mut spec = NodeSpec::new(
            NodeType::File,
            file_name(&file.path),
            file_full_path(&file.path, separator),
            Location::new(&file.path, 1, Some(file.line_count.max(1))),
        );
        spec.metrics.loc = file.line_count;
        spec.language = Some(file.language);
        let file_id = self.add(Some(module_id), spec);

        let file_idx = self.files.len();
        self.file_by_path.insert(file.path.as_str(), file_idx);
        self.files.push(FileEntry {
            id: file_id.clone(),
            info: file,
            classes: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
        });

        for class in &file.classes {
            self.add_class(file_idx, class);
        }

        for function in &file.functions {
            let owner = function.parent_class.as_deref().and_then(|name| {
                self.files[file_idx]
                    .classes
                    .iter()
                    .copied()
                    .find(|&c| self.classes[c].info.name == name)
            });
            match owner {
                Some(class_idx) => {
                    let parent = self.classes[class_idx].id.clone();
                    let idx = self.add_function(file_idx, function, &parent, Some(class_idx));
                    self.classes[class_idx].methods.push(idx);
                }
                None => {
                    let idx = self.add_function(file_idx, function, &file_id, None);
                    self.files[file_idx].functions.push(idx);
                }
            }
        }

        let file_path = self.full_path_of(&file_id);
        for variable in &file.variables {
            let node_type = match variable.kind {
                VariableKind::Constant => NodeType::Constant,
                VariableKind::Variable => NodeType::Variable,
            };
            let mut spec = NodeSpec::new(
                node_type,
                &variable.name,
                format!("{}{}{}", file_path, separator, variable.name),
                Location::line(&file.path, variable.line),
            );
            spec.visibility = variable.visibility;
            if variable.is_exported {
                spec.modifiers.push("exported".to_string());
            }
            let id = self.add(Some(&file_id), spec);
            self.files[file_idx].variables.push((variable.name.as_str(), id));
        }
    }

    fn add_class(&mut self, file_idx: usize, class: &'f ClassInfo) {
        let file = self.files[file_idx].info;
        let separator = file.language.path_separator();
        let parent = self.files[file_idx].id.clone();
        let full_path = format!("{}{}{}", self.full_path_of(&parent), separator, class.name);

        let mut spec = NodeSpec::new(
            NodeType::from_class_kind(class.kind),
            &class.name,
            full_path.clone(),
            Location::new(&file.path, class.line, Some(class.end_line)),
        );
        spec.visibility = class.visibility;
        if class.is_exported {
            spec.modifiers.push("exported".to_string());
        }
        if class.is_abstract {
            spec.modifiers.push("abstract".to_string());
        }
        let class_id = self.add(Some(&parent), spec);

        let class_idx = self.classes.len();
        self.classes.push(ClassEntry {
            id: class_id.clone(),
            file: file_idx,
            info: class,
            methods: Vec::new(),
            attributes: Vec::new(),
        });
        self.files[file_idx].classes.push(class_idx);

        for attribute in &class.attributes {
            let mut spec = NodeSpec::new(
                NodeType::Attribute,
                &attribute.name,
                format!("{}{}{}", full_path, separator, attribute.name),
                Location::line(&file.path, attribute.line),
            );
            spec.visibility = attribute.visibility;
            if attribute.is_static {
                spec.modifiers.push("static".to_string());
            }
            let id = self.add(Some(&class_id), spec);
            self.classes[class_idx].attributes.push((attribute.name.as_str(), id));
        }

        for method in &class.methods {
            let idx = self.add_function(file_idx, method, &class_id, Some(class_idx));
            self.classes[class_idx].methods.push(idx);
        }
    }

    fn add_function(
        &mut self,
        file_idx: usize,
        function: &'f FunctionInfo,
        parent: &str,
        owner: Option<usize>,
    ) -> usize {
        let file = self.files[file_idx].info;
        let separator = file.language.path_separator();
        let full_path = format!("{}{}{}", self.full_path_of(parent), separator, function.name);

        let mut spec = NodeSpec::new(
            NodeType::from_function_kind(
                function.kind,
                owner.is_some() || function.parent_class.is_some(),
            ),
            &function.name,
            full_path.clone(),
            Location::new(&file.path, function.line, Some(function.end_line)),
        );
        spec.visibility = function.visibility;
        spec.modifiers = function.modifiers.clone();
        if function.is_async {
            spec.modifiers.push("async".to_string());
        }
        if function.is_static {
            spec.modifiers.push("static".to_string());
        }
        if function.is_exported {
            spec.modifiers.push("exported".to_string());
        }
        spec.metrics.complexity = Some(function.complexity);
        spec.metrics.max_nesting = Some(function.max_nesting);
        let function_id = self.add(Some(parent), spec);

        let idx = self.functions.len();
        self.functions.push(FunctionEntry {
            id: function_id.clone(),
            file: file_idx,
            info: function,
            owner,
            params: Vec::new(),
            locals: Vec::new(),
        });

        for param in &function.parameters {
            let spec = NodeSpec::new(
                NodeType::Parameter,
                &param.name,
                format!("{}{}{}", full_path, separator, param.name),
                Location::line(&file.path, function.line),
            );
            let id = self.add(Some(&function_id), spec);
            self.functions[idx].params.push((param.name.as_str(), id));
        }

        // Blocks nest under the innermost block already created that spans
        // them; blocks arrive in line order so parents come first.
        let mut blocks: Vec<(usize, usize, String)> = Vec::new();
        let mut ordered: Vec<_> = function.blocks.iter().collect();
        ordered.sort_by_key(|b| (b.line, std::cmp::Reverse(b.end_line)));
        for block in ordered {
            let parent_id = blocks
                .iter()
                .rev()
                .find(|(start, end, _)| *start <= block.line && block.end_line <= *end)
                .map(|(_, _, id)| id.clone())
                .unwrap_or_else(|| function_id.clone());
            let node_type = match block.kind {
                BlockKind::Conditional => NodeType::Conditional,
                BlockKind::Loop => NodeType::Loop,
                BlockKind::TryCatch => NodeType::TryCatch,
                BlockKind::MatchArm => NodeType::MatchArm,
            };
            let spec = NodeSpec::new(
                node_type,
                &block.keyword,
                format!("{}{}{}", self.full_path_of(&parent_id), separator, block.keyword),
                Location::new(&file.path, block.line, Some(block.end_line)),
            );
            let id = self.add(Some(&parent_id), spec);
            blocks.push((block.line, block.end_line, id));
        }

        for local in &function.locals {
            let parent_id = blocks
                .iter()
                .rev()
                .find(|(start, end, _)| *start <= local.line && local.line <= *end)
                .map(|(_, _, id)| id.clone())
                .unwrap_or_else(|| function_id.clone());
            let node_type = match local.kind {
                VariableKind::Constant => NodeType::Constant,
                VariableKind::Variable => NodeType::Variable,
            };
            let mut spec = NodeSpec::new(
                node_type,
                &local.name,
                format!("{}{}{}", self.full_path_of(&parent_id), separator, local.name),
                Location::line(&file.path, local.line),
            );
            spec.visibility = Visibility::Private;
            let id = self.add(Some(&parent_id), spec);
            self.functions[idx].locals.push((local.name.as_str(), id));
        }

        idx
    }
}

/// Receivers that refer to the enclosing class.
fn is_self_receiver(receiver: &str) -> bool {
    matches!(receiver, "this" | "self" | "Self" | "cls" | "super")
}

/// Bare identifier of a type or decorator reference.
fn type_ident(text: &str) -> &str {
    let text = text.trim().trim_start_matches('@').trim_start_matches('&');
    let text = text.strip_prefix("mut ").unwrap_or(text);
    let base = text
        .split(|c: char| c == '<' || c == '[' || c == '(')
        .next()
        .unwrap_or(text);
    let base = base.rsplit("::").next().unwrap_or(base);
    base.rsplit('.').next().unwrap_or(base).trim()
}

/// Identifier tokens of a type expression, e.g. `Map<string, User[]>`.
fn type_tokens(text: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
        .collect();
    tokens.dedup();
    tokens
}

/// Resolves references between arena nodes into edges.
struct EdgeResolver<'a, 'f> {
    arena: &'a NodeArena<'f>,
    modules: ModuleResolver,
    functions_by_name: HashMap<&'f str, Vec<usize>>,
    classes_by_name: HashMap<&'f str, Vec<usize>>,
    edges: Vec<CodeEdge>,
    seen: HashSet<String>,
}

impl<'a, 'f> EdgeResolver<'a, 'f> {
    fn new(arena: &'a NodeArena<'f>) -> Self {
        let mut functions_by_name: HashMap<&'f str, Vec<usize>> = HashMap::new();
        for (idx, function) in arena.functions.iter().enumerate() {
            functions_by_name
                .entry(function.info.name.as_str())
                .or_default()
                .push(idx);
        }
        let mut classes_by_name: HashMap<&'f str, Vec<usize>> = HashMap::new();
        for (idx, class) in arena.classes.iter().enumerate() {
            classes_by_name
                .entry(class.info.name.as_str())
                .or_default()
                .push(idx);
        }

        Self {
            arena,
            modules: ModuleResolver::new(arena.files.iter().map(|f| f.info.path.as_str())),
            functions_by_name,
            classes_by_name,
            edges: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn resolve(mut self) -> Vec<CodeEdge> {
        self.containment();
        self.imports();
        self.exports();
        self.inheritance();
        self.bodies();
        self.decorators();
        self.events();
        self.edges
    }

    fn push(
        &mut self,
        kind: EdgeKind,
        source: &str,
        target: &str,
        location: Option<Location>,
        label: Option<String>,
    ) {
        let id = CodeEdge::edge_id(kind, source, target);
        if !self.seen.insert(id.clone()) {
            return;
        }
        self.edges.push(CodeEdge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            kind,
            location,
            label,
        });
    }

    fn containment(&mut self) {
        let arena = self.arena;
        for node in &arena.nodes {
            if let Some(parent) = &node.parent {
                self.push(EdgeKind::Contains, parent, &node.id, None, None);
                self.push(EdgeKind::ContainedBy, &node.id, parent, None, None);
            }
        }
    }

    fn imports(&mut self) {
        let arena = self.arena;
        let mut module_pairs: Vec<(String, String)> = Vec::new();

        for file in &arena.files {
            let path = file.info.path.as_str();
            for import in &file.info.imports {
                let targets = self.modules.resolve(path, file.info.language, import);
                if targets.is_empty() {
                    debug!(file = path, module = %import.module, "import not resolved");
                }
                for target in targets {
                    let Some(&target_idx) = arena.file_by_path.get(target.as_str()) else {
                        continue;
                    };
                    let target_file = &arena.files[target_idx];
                    self.push(
                        EdgeKind::Imports,
                        &file.id,
                        &target_file.id,
                        Some(Location::line(path, import.line)),
                        Some(import.module.clone()),
                    );

                    let source_module = arena.node(&file.id).and_then(|n| n.parent.clone());
                    let target_module = arena.node(&target_file.id).and_then(|n| n.parent.clone());
                    if let (Some(from), Some(to)) = (source_module, target_module) {
                        if from != to && !module_pairs.contains(&(from.clone(), to.clone())) {
                            module_pairs.push((from, to));
                        }
                    }
                }
            }
        }

        for (from, to) in module_pairs {
            self.push(EdgeKind::DependsOn, &from, &to, None, None);
        }
    }

    fn exports(&mut self) {
        let arena = self.arena;
        for file in &arena.files {
            let path = file.info.path.as_str();
            for export in &file.info.exports {
                let location = Some(Location::line(path, export.line));

                if export.kind == ExportKind::ReExport {
                    let Some(source) = &export.source else { continue };
                    let import = ImportInfo {
                        module: source.clone(),
                        items: vec![ImportItem {
                            name: export.name.clone(),
                            alias: None,
                            referenced: true,
                        }],
                        line: export.line,
                        is_relative: source.starts_with('.'),
                        is_type_only: false,
                    };
                    for target in self.modules.resolve(path, file.info.language, &import) {
                        if let Some(&target_idx) = arena.file_by_path.get(target.as_str()) {
                            self.push(
                                EdgeKind::ReExports,
                                &file.id,
                                &arena.files[target_idx].id,
                                location.clone(),
                                Some(export.name.clone()),
                            );
                        }
                    }
                    continue;
                }

                let name = export.name.as_str();
                let target = file
                    .classes
                    .iter()
                    .map(|&c| &arena.classes[c])
                    .find(|c| c.info.name == name)
                    .map(|c| c.id.as_str())
                    .or_else(|| {
                        file.functions
                            .iter()
                            .map(|&f| &arena.functions[f])
                            .find(|f| f.info.name == name)
                            .map(|f| f.id.as_str())
                    })
                    .or_else(|| {
                        file.variables
                            .iter()
                            .find(|(var, _)| *var == name)
                            .map(|(_, id)| id.as_str())
                    });
                if let Some(target) = target {
                    self.push(EdgeKind::Exports, &file.id, target, location, None);
                }
            }
        }
    }

    fn resolve_class(&self, name: &str, file: usize) -> Option<usize> {
        let candidates = self.classes_by_name.get(type_ident(name))?;
        candidates
            .iter()
            .copied()
            .find(|&c| self.arena.classes[c].file == file)
            .or_else(|| candidates.first().copied())
    }

    fn resolve_function_by_name(&self, name: &str, file: usize) -> Option<usize> {
        let candidates = self.functions_by_name.get(name)?;
        candidates
            .iter()
            .copied()
            .find(|&f| self.arena.functions[f].file == file)
            .or_else(|| candidates.first().copied())
    }

    /// Resolve a call target by name: the caller's own class for self calls,
    /// the named class for static calls, then the caller's file, then the
    /// first declaration in the project.
    fn resolve_call(&self, caller: &FunctionEntry<'f>, target: &str, receiver: Option<&str>) -> Option<usize> {
        let candidates = self.functions_by_name.get(target)?;
        let functions = &self.arena.functions;
        let classes = &self.arena.classes;

        if let Some(receiver) = receiver {
            if is_self_receiver(receiver) {
                if let Some(owner) = caller.owner {
                    if let Some(&f) = candidates.iter().find(|&&f| functions[f].owner == Some(owner)) {
                        return Some(f);
                    }
                }
            } else {
                let receiver_type = type_ident(receiver);
                if let Some(&f) = candidates.iter().find(|&&f| {
                    functions[f]
                        .owner
                        .map(|c| classes[c].info.name == receiver_type)
                        .unwrap_or(false)
                        || functions[f].info.parent_class.as_deref() == Some(receiver_type)
                }) {
                    return Some(f);
                }
            }
        }

        candidates
            .iter()
            .copied()
            .find(|&f| functions[f].file == caller.file)
            .or_else(|| candidates.first().copied())
    }

    /// Locals shadow parameters, which shadow file-level variables.
    fn resolve_variable(&self, function: &'a FunctionEntry<'f>, name: &str) -> Option<&'a str> {
        let arena = self.arena;
        function
            .locals
            .iter()
            .find(|(local, _)| *local == name)
            .or_else(|| function.params.iter().find(|(param, _)| *param == name))
            .or_else(|| {
                arena.files[function.file]
                    .variables
                    .iter()
                    .find(|(var, _)| *var == name)
            })
            .map(|(_, id)| id.as_str())
    }

    fn inheritance(&mut self) {
        let arena = self.arena;
        for (idx, class) in arena.classes.iter().enumerate() {
            let path = arena.files[class.file].info.path.as_str();
            let location = Some(Location::line(path, class.info.line));
            let mut bases = Vec::new();

            if let Some(base) = &class.info.extends {
                if let Some(base_idx) = self.resolve_class(base, class.file).filter(|&b| b != idx) {
                    self.push(
                        EdgeKind::Extends,
                        &class.id,
                        &arena.classes[base_idx].id,
                        location.clone(),
                        None,
                    );
                    bases.push(base_idx);
                }
            }
            for interface in &class.info.implements {
                if let Some(base_idx) = self.resolve_class(interface, class.file).filter(|&b| b != idx) {
                    self.push(
                        EdgeKind::Implements,
                        &class.id,
                        &arena.classes[base_idx].id,
                        location.clone(),
                        None,
                    );
                    bases.push(base_idx);
                }
            }

            for &method_idx in &class.methods {
                let method = &arena.functions[method_idx];
                for &base_idx in &bases {
                    let overridden = arena.classes[base_idx]
                        .methods
                        .iter()
                        .map(|&m| &arena.functions[m])
                        .find(|m| m.info.name == method.info.name);
                    if let Some(overridden) = overridden {
                        self.push(
                            EdgeKind::Overrides,
                            &method.id,
                            &overridden.id,
                            Some(Location::line(path, method.info.line)),
                            None,
                        );
                    }
                }
            }
        }
    }

    fn bodies(&mut self) {
        let arena = self.arena;
        for function in &arena.functions {
            let info = function.info;
            let path = arena.files[function.file].info.path.as_str();

            for call in &info.calls {
                let location = Some(Location::line(path, call.line));
                let starts_upper = call.target.starts_with(|c: char| c.is_ascii_uppercase());

                if call.is_constructor {
                    if let Some(class_idx) = self.resolve_class(&call.target, function.file) {
                        self.push(
                            EdgeKind::Instantiates,
                            &function.id,
                            &arena.classes[class_idx].id,
                            location,
                            None,
                        );
                    }
                    continue;
                }

                if let Some(target) = self.resolve_call(function, &call.target, call.receiver.as_deref()) {
                    let target_id = &arena.functions[target].id;
                    self.push(EdgeKind::Calls, &function.id, target_id, location.clone(), None);
                    if call.is_awaited {
                        self.push(EdgeKind::Awaits, &function.id, target_id, location, None);
                    }
                } else if starts_upper {
                    // `User(...)` in Python, tuple structs and enum variants in Rust.
                    if let Some(class_idx) = self.resolve_class(&call.target, function.file) {
                        self.push(
                            EdgeKind::Instantiates,
                            &function.id,
                            &arena.classes[class_idx].id,
                            location,
                            None,
                        );
                    }
                }
            }

            for usage in &info.variable_usages {
                if let Some(target) = self.resolve_variable(function, &usage.name) {
                    let kind = match usage.access {
                        Access::Read => EdgeKind::Reads,
                        Access::Write => EdgeKind::Writes,
                    };
                    self.push(kind, &function.id, target, Some(Location::line(path, usage.line)), None);
                }
            }

            // `self.x` resolves against the owning class, `param.x` against
            // the declared type of the parameter.
            for access in &info.attribute_accesses {
                let class_idx = if is_self_receiver(&access.receiver) {
                    function.owner
                } else {
                    info.parameters
                        .iter()
                        .find(|p| p.name == access.receiver)
                        .and_then(|p| p.data_type.as_deref())
                        .and_then(|t| self.resolve_class(t, function.file))
                };
                let Some(class_idx) = class_idx else { continue };
                let attribute = arena.classes[class_idx]
                    .attributes
                    .iter()
                    .find(|(name, _)| *name == access.name);
                if let Some((_, target)) = attribute {
                    let kind = match access.access {
                        Access::Read => EdgeKind::Reads,
                        Access::Write => EdgeKind::Writes,
                    };
                    self.push(kind, &function.id, target, Some(Location::line(path, access.line)), None);
                }
            }

            let location = Some(Location::line(path, info.line));
            for param in &info.parameters {
                let Some(data_type) = &param.data_type else { continue };
                for token in type_tokens(data_type) {
                    if let Some(class_idx) = self.resolve_class(token, function.file) {
                        self.push(
                            EdgeKind::UsesType,
                            &function.id,
                            &arena.classes[class_idx].id,
                            location.clone(),
                            Some(param.name.clone()),
                        );
                    }
                }
            }
            if let Some(return_type) = &info.return_type {
                for token in type_tokens(return_type) {
                    if let Some(class_idx) = self.resolve_class(token, function.file) {
                        self.push(
                            EdgeKind::ReturnsType,
                            &function.id,
                            &arena.classes[class_idx].id,
                            location.clone(),
                            None,
                        );
                    }
                }
            }

            for (names, kind) in [(&info.throws, EdgeKind::Throws), (&info.catches, EdgeKind::Catches)] {
                for name in names {
                    if let Some(class_idx) = self.resolve_class(name, function.file) {
                        self.push(kind, &function.id, &arena.classes[class_idx].id, location.clone(), None);
                    }
                }
            }
        }
    }

    fn decorators(&mut self) {
        let arena = self.arena;
        for class in &arena.classes {
            for decorator in &class.info.decorators {
                if let Some(f) = self.resolve_function_by_name(type_ident(decorator), class.file) {
                    self.push(EdgeKind::Decorates, &arena.functions[f].id, &class.id, None, None);
                }
            }
        }
        for function in &arena.functions {
            for decorator in &function.info.decorators {
                if let Some(f) = self.resolve_function_by_name(type_ident(decorator), function.file) {
                    if arena.functions[f].id != function.id {
                        self.push(EdgeKind::Decorates, &arena.functions[f].id, &function.id, None, None);
                    }
                }
            }
        }
    }

    /// Link emitters to the handlers registered for the same event name.
    fn events(&mut self) {
        let arena = self.arena;
        let registrations: Vec<(&str, &str, usize)> = arena
            .functions
            .iter()
            .flat_map(|f| {
                f.info
                    .handlers
                    .iter()
                    .map(move |h| (h.event.as_str(), h.handler.as_str(), f.file))
            })
            .collect();
        if registrations.is_empty() {
            return;
        }

        for function in &arena.functions {
            for event in &function.info.emits {
                for &(registered, handler, file) in &registrations {
                    if registered != event {
                        continue;
                    }
                    if let Some(target) = self.resolve_function_by_name(handler, file) {
                        self.push(
                            EdgeKind::Emits,
                            &function.id,
                            &arena.functions[target].id,
                            None,
                            Some(event.clone()),
                        );
                    }
                }
            }
        }
    }
}
