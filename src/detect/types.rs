//! Core types for code-quality issues.

use serde::{Deserialize, Serialize};

use crate::graph::Location;

/// Severity levels for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Issue kinds reported by the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    DeadCode,
    UnusedFunction,
    UnusedVariable,
    UnusedImport,
    CircularDependency,
    GodClass,
    LongMethod,
    HighComplexity,
    DeepNesting,
    FeatureEnvy,
}

impl IssueType {
    pub const ALL: [IssueType; 10] = [
        IssueType::DeadCode,
        IssueType::UnusedFunction,
        IssueType::UnusedVariable,
        IssueType::UnusedImport,
        IssueType::CircularDependency,
        IssueType::GodClass,
        IssueType::LongMethod,
        IssueType::HighComplexity,
        IssueType::DeepNesting,
        IssueType::FeatureEnvy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::DeadCode => "dead_code",
            IssueType::UnusedFunction => "unused_function",
            IssueType::UnusedVariable => "unused_variable",
            IssueType::UnusedImport => "unused_import",
            IssueType::CircularDependency => "circular_dependency",
            IssueType::GodClass => "god_class",
            IssueType::LongMethod => "long_method",
            IssueType::HighComplexity => "high_complexity",
            IssueType::DeepNesting => "deep_nesting",
            IssueType::FeatureEnvy => "feature_envy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        IssueType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Fixed severity of each issue type.
    pub fn severity(&self) -> Severity {
        match self {
            IssueType::CircularDependency => Severity::Error,
            IssueType::DeadCode
            | IssueType::UnusedFunction
            | IssueType::GodClass
            | IssueType::LongMethod
            | IssueType::HighComplexity
            | IssueType::DeepNesting
            | IssueType::FeatureEnvy => Severity::Warning,
            IssueType::UnusedVariable | IssueType::UnusedImport => Severity::Info,
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeIssue {
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Graph node the issue is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// File node ids of a dependency cycle, in cycle order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub involved: Vec<String>,
}

impl CodeIssue {
    /// Create an issue with the type's fixed severity.
    ///
    /// The id is derived from the type, location and `subject` so identical
    /// input always yields identical ids.
    pub fn new(issue_type: IssueType, location: Location, subject: &str, message: String) -> Self {
        Self {
            id: format!(
                "{}:{}:{}:{}",
                issue_type, location.file, location.line, subject
            ),
            issue_type,
            severity: issue_type.severity(),
            location,
            message,
            suggestion: None,
            node: None,
            involved: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_node(mut self, node: &str) -> Self {
        self.node = Some(node.to_string());
        self
    }
}

/// Thresholds for the size and coupling detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Lines before a class is a god class.
    pub god_class_loc: usize,
    /// Methods before a class is a god class.
    pub god_class_methods: usize,
    pub long_method_loc: usize,
    pub high_complexity: u32,
    pub deep_nesting: u32,
    /// Foreign accesses must exceed own accesses by this factor.
    pub feature_envy_ratio: f64,
    pub feature_envy_min_accesses: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            god_class_loc: 500,
            god_class_methods: 20,
            long_method_loc: 60,
            high_complexity: 15,
            deep_nesting: 4,
            feature_envy_ratio: 2.0,
            feature_envy_min_accesses: 3,
        }
    }
}

impl Thresholds {
    /// Tighter limits for new or actively refactored code.
    pub fn strict() -> Self {
        Self {
            god_class_loc: 300,
            god_class_methods: 15,
            long_method_loc: 40,
            high_complexity: 10,
            deep_nesting: 3,
            feature_envy_ratio: 1.5,
            feature_envy_min_accesses: 2,
        }
    }

    /// Looser limits for large, mature codebases.
    pub fn relaxed() -> Self {
        Self {
            god_class_loc: 1000,
            god_class_methods: 40,
            long_method_loc: 120,
            high_complexity: 25,
            deep_nesting: 6,
            feature_envy_ratio: 3.0,
            feature_envy_min_accesses: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_roundtrip() {
        assert_eq!("Warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
        assert!(Severity::Error < Severity::Info);
    }

    #[test]
    fn test_issue_type_parse() {
        for issue_type in IssueType::ALL {
            assert_eq!(IssueType::parse(issue_type.as_str()), Some(issue_type));
        }
        assert_eq!(IssueType::parse("god_file"), None);
    }

    #[test]
    fn test_issue_id_is_deterministic() {
        let a = CodeIssue::new(
            IssueType::LongMethod,
            Location::line("src/a.ts", 3),
            "run",
            "too long".to_string(),
        );
        let b = CodeIssue::new(
            IssueType::LongMethod,
            Location::line("src/a.ts", 3),
            "run",
            "too long".to_string(),
        );
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "long_method:src/a.ts:3:run");
        assert_eq!(a.severity, Severity::Warning);
    }

    #[test]
    fn test_threshold_presets() {
        let strict = Thresholds::strict();
        let default = Thresholds::default();
        let relaxed = Thresholds::relaxed();
        assert!(strict.long_method_loc < default.long_method_loc);
        assert!(default.long_method_loc < relaxed.long_method_loc);
    }
}
