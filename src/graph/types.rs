//! Graph data model: nodes at seven granularity levels and typed edges.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::{ClassKind, FunctionKind, Language, Visibility};

/// Granularity level, from the whole system (L1) down to variables (L7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "L1")]
    System,
    #[serde(rename = "L2")]
    Module,
    #[serde(rename = "L3")]
    File,
    #[serde(rename = "L4")]
    Type,
    #[serde(rename = "L5")]
    Function,
    #[serde(rename = "L6")]
    Block,
    #[serde(rename = "L7")]
    Variable,
}

impl Level {
    pub const ALL: [Level; 7] = [
        Level::System,
        Level::Module,
        Level::File,
        Level::Type,
        Level::Function,
        Level::Block,
        Level::Variable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::System => "L1",
            Level::Module => "L2",
            Level::File => "L3",
            Level::Type => "L4",
            Level::Function => "L5",
            Level::Block => "L6",
            Level::Variable => "L7",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Node type. Each type belongs to exactly one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    System,
    Module,
    File,
    Class,
    Struct,
    Interface,
    Trait,
    Enum,
    TypeAlias,
    Function,
    Method,
    Constructor,
    Closure,
    Handler,
    Block,
    Conditional,
    Loop,
    TryCatch,
    MatchArm,
    Variable,
    Constant,
    Parameter,
    Attribute,
    Property,
}

impl NodeType {
    pub fn level(&self) -> Level {
        match self {
            NodeType::System => Level::System,
            NodeType::Module => Level::Module,
            NodeType::File => Level::File,
            NodeType::Class
            | NodeType::Struct
            | NodeType::Interface
            | NodeType::Trait
            | NodeType::Enum
            | NodeType::TypeAlias => Level::Type,
            NodeType::Function
            | NodeType::Method
            | NodeType::Constructor
            | NodeType::Closure
            | NodeType::Handler => Level::Function,
            NodeType::Block
            | NodeType::Conditional
            | NodeType::Loop
            | NodeType::TryCatch
            | NodeType::MatchArm => Level::Block,
            NodeType::Variable
            | NodeType::Constant
            | NodeType::Parameter
            | NodeType::Attribute
            | NodeType::Property => Level::Variable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::System => "system",
            NodeType::Module => "module",
            NodeType::File => "file",
            NodeType::Class => "class",
            NodeType::Struct => "struct",
            NodeType::Interface => "interface",
            NodeType::Trait => "trait",
            NodeType::Enum => "enum",
            NodeType::TypeAlias => "type_alias",
            NodeType::Function => "function",
            NodeType::Method => "method",
            NodeType::Constructor => "constructor",
            NodeType::Closure => "closure",
            NodeType::Handler => "handler",
            NodeType::Block => "block",
            NodeType::Conditional => "conditional",
            NodeType::Loop => "loop",
            NodeType::TryCatch => "try_catch",
            NodeType::MatchArm => "match_arm",
            NodeType::Variable => "variable",
            NodeType::Constant => "constant",
            NodeType::Parameter => "parameter",
            NodeType::Attribute => "attribute",
            NodeType::Property => "property",
        }
    }

    pub fn from_class_kind(kind: ClassKind) -> Self {
        match kind {
            ClassKind::Class => NodeType::Class,
            ClassKind::Struct => NodeType::Struct,
            ClassKind::Interface => NodeType::Interface,
            ClassKind::Trait => NodeType::Trait,
            ClassKind::Enum => NodeType::Enum,
            ClassKind::TypeAlias => NodeType::TypeAlias,
        }
    }

    /// Node type of a callable; plain functions owned by a class become
    /// methods.
    pub fn from_function_kind(kind: FunctionKind, has_owner: bool) -> Self {
        match kind {
            FunctionKind::Constructor => NodeType::Constructor,
            FunctionKind::Handler => NodeType::Handler,
            FunctionKind::Closure => NodeType::Closure,
            FunctionKind::Method => NodeType::Method,
            FunctionKind::Function if has_owner => NodeType::Method,
            FunctionKind::Function => NodeType::Function,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.level() == Level::Function
    }

    pub fn is_type(&self) -> bool {
        self.level() == Level::Type
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source location of a node or edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
}

impl Location {
    pub fn new(file: &str, line: usize, end_line: Option<usize>) -> Self {
        Self {
            file: file.to_string(),
            line,
            end_line,
        }
    }

    pub fn line(file: &str, line: usize) -> Self {
        Self::new(file, line, None)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Metrics attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub loc: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nesting: Option<u32>,
    /// Outgoing edges, containment excluded.
    pub dependencies: usize,
    /// Incoming edges, containment excluded.
    pub dependents: usize,
}

/// A node of the code graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    pub id: String,
    pub level: Level,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    /// Ancestor names joined with the language separator.
    pub full_path: String,
    pub location: Location,
    pub visibility: Visibility,
    pub modifiers: Vec<String>,
    pub metrics: NodeMetrics,
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl CodeNode {
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// Relation family of an edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeGroup {
    Imports,
    Hierarchy,
    Calls,
    Variables,
    Types,
    Exceptions,
    Async,
    Decorators,
    Communication,
}

/// Kind of relation between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Imports,
    Exports,
    ReExports,
    DependsOn,
    Contains,
    ContainedBy,
    Extends,
    Implements,
    Overrides,
    Calls,
    Instantiates,
    Reads,
    Writes,
    Captures,
    Mutates,
    UsesType,
    ReturnsType,
    ParameterType,
    Throws,
    Catches,
    Awaits,
    Spawns,
    Decorates,
    Annotates,
    Emits,
    ListensTo,
    Requests,
    Publishes,
    Subscribes,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Imports => "imports",
            EdgeKind::Exports => "exports",
            EdgeKind::ReExports => "re_exports",
            EdgeKind::DependsOn => "depends_on",
            EdgeKind::Contains => "contains",
            EdgeKind::ContainedBy => "contained_by",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::Overrides => "overrides",
            EdgeKind::Calls => "calls",
            EdgeKind::Instantiates => "instantiates",
            EdgeKind::Reads => "reads",
            EdgeKind::Writes => "writes",
            EdgeKind::Captures => "captures",
            EdgeKind::Mutates => "mutates",
            EdgeKind::UsesType => "uses_type",
            EdgeKind::ReturnsType => "returns_type",
            EdgeKind::ParameterType => "parameter_type",
            EdgeKind::Throws => "throws",
            EdgeKind::Catches => "catches",
            EdgeKind::Awaits => "awaits",
            EdgeKind::Spawns => "spawns",
            EdgeKind::Decorates => "decorates",
            EdgeKind::Annotates => "annotates",
            EdgeKind::Emits => "emits",
            EdgeKind::ListensTo => "listens_to",
            EdgeKind::Requests => "requests",
            EdgeKind::Publishes => "publishes",
            EdgeKind::Subscribes => "subscribes",
        }
    }

    pub fn group(&self) -> EdgeGroup {
        match self {
            EdgeKind::Imports | EdgeKind::Exports | EdgeKind::ReExports | EdgeKind::DependsOn => {
                EdgeGroup::Imports
            }
            EdgeKind::Contains
            | EdgeKind::ContainedBy
            | EdgeKind::Extends
            | EdgeKind::Implements
            | EdgeKind::Overrides => EdgeGroup::Hierarchy,
            EdgeKind::Calls | EdgeKind::Instantiates => EdgeGroup::Calls,
            EdgeKind::Reads | EdgeKind::Writes | EdgeKind::Captures | EdgeKind::Mutates => {
                EdgeGroup::Variables
            }
            EdgeKind::UsesType | EdgeKind::ReturnsType | EdgeKind::ParameterType => {
                EdgeGroup::Types
            }
            EdgeKind::Throws | EdgeKind::Catches => EdgeGroup::Exceptions,
            EdgeKind::Awaits | EdgeKind::Spawns => EdgeGroup::Async,
            EdgeKind::Decorates | EdgeKind::Annotates => EdgeGroup::Decorators,
            EdgeKind::Emits
            | EdgeKind::ListensTo
            | EdgeKind::Requests
            | EdgeKind::Publishes
            | EdgeKind::Subscribes => EdgeGroup::Communication,
        }
    }

    pub fn is_containment(&self) -> bool {
        matches!(self, EdgeKind::Contains | EdgeKind::ContainedBy)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved relation. Both endpoints are ids of existing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CodeEdge {
    pub fn edge_id(kind: EdgeKind, source: &str, target: &str) -> String {
        format!("{}:{}->{}", kind.as_str(), source, target)
    }
}

/// The finished graph: nodes in creation order, edges in resolution order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeGraph {
    pub nodes: Vec<CodeNode>,
    pub edges: Vec<CodeEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl CodeGraph {
    pub fn new(nodes: Vec<CodeNode>, edges: Vec<CodeEdge>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self {
            nodes,
            edges,
            index,
        }
    }

    pub fn node(&self, id: &str) -> Option<&CodeNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn root(&self) -> Option<&CodeNode> {
        self.nodes.first().filter(|n| n.level == Level::System)
    }

    pub fn nodes_at(&self, level: Level) -> impl Iterator<Item = &CodeNode> {
        self.nodes.iter().filter(move |n| n.level == level)
    }

    pub fn children_of<'a>(&'a self, node: &'a CodeNode) -> impl Iterator<Item = &'a CodeNode> {
        node.children.iter().filter_map(move |id| self.node(id))
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &CodeEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str, kind: EdgeKind) -> impl Iterator<Item = &'a CodeEdge> {
        self.edges
            .iter()
            .filter(move |e| e.kind == kind && e.source == id)
    }

    pub fn incoming<'a>(&'a self, id: &'a str, kind: EdgeKind) -> impl Iterator<Item = &'a CodeEdge> {
        self.edges
            .iter()
            .filter(move |e| e.kind == kind && e.target == id)
    }

    /// Nearest ancestor (or the node itself) at `level`.
    pub fn ancestor_at(&self, id: &str, level: Level) -> Option<&CodeNode> {
        let mut current = self.node(id)?;
        loop {
            if current.level == level {
                return Some(current);
            }
            current = self.node(current.parent.as_deref()?)?;
        }
    }

    /// Rebuild the id index, after deserialization.
    pub fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
    }
}

/// Adjacency lists over a graph's relationship edges, containment excluded.
pub struct EdgeIndex<'g> {
    incoming: HashMap<&'g str, Vec<&'g CodeEdge>>,
    outgoing: HashMap<&'g str, Vec<&'g CodeEdge>>,
}

impl<'g> EdgeIndex<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        let mut incoming: HashMap<&str, Vec<&CodeEdge>> = HashMap::new();
        let mut outgoing: HashMap<&str, Vec<&CodeEdge>> = HashMap::new();
        for edge in graph.edges.iter().filter(|e| !e.kind.is_containment()) {
            incoming.entry(edge.target.as_str()).or_default().push(edge);
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }
        Self { incoming, outgoing }
    }

    pub fn incoming(&self, id: &str) -> &[&'g CodeEdge] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn outgoing(&self, id: &str) -> &[&'g CodeEdge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_incoming(&self, id: &str, kinds: &[EdgeKind]) -> bool {
        self.incoming(id).iter().any(|e| kinds.contains(&e.kind))
    }

    pub fn has_outgoing(&self, id: &str, kinds: &[EdgeKind]) -> bool {
        self.outgoing(id).iter().any(|e| kinds.contains(&e.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_levels() {
        assert_eq!(NodeType::Trait.level(), Level::Type);
        assert_eq!(NodeType::Handler.level(), Level::Function);
        assert_eq!(NodeType::MatchArm.level(), Level::Block);
        assert_eq!(NodeType::Parameter.level(), Level::Variable);
        assert_eq!(
            NodeType::from_function_kind(FunctionKind::Function, true),
            NodeType::Method
        );
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&Level::Block).unwrap(), "\"L6\"");
        assert_eq!(serde_json::to_string(&NodeType::TypeAlias).unwrap(), "\"type_alias\"");
        assert_eq!(serde_json::to_string(&EdgeKind::ReExports).unwrap(), "\"re_exports\"");
        assert_eq!(EdgeKind::Awaits.group(), EdgeGroup::Async);
    }
}
