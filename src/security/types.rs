//! Core types for security findings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::Location;

/// Severity of a vulnerability. Ordering ranks `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl VulnSeverity {
    pub const ALL: [VulnSeverity; 5] = [
        VulnSeverity::Critical,
        VulnSeverity::High,
        VulnSeverity::Medium,
        VulnSeverity::Low,
        VulnSeverity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VulnSeverity::Critical => "critical",
            VulnSeverity::High => "high",
            VulnSeverity::Medium => "medium",
            VulnSeverity::Low => "low",
            VulnSeverity::Info => "info",
        }
    }

    /// One level lower, flooring at `Info`.
    pub fn downgrade(self) -> Self {
        match self {
            VulnSeverity::Critical => VulnSeverity::High,
            VulnSeverity::High => VulnSeverity::Medium,
            VulnSeverity::Medium => VulnSeverity::Low,
            VulnSeverity::Low | VulnSeverity::Info => VulnSeverity::Info,
        }
    }

    /// Whether this severity is at least as severe as `threshold`.
    pub fn at_least(&self, threshold: VulnSeverity) -> bool {
        *self <= threshold
    }
}

impl std::fmt::Display for VulnSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VulnSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VulnSeverity::ALL
            .into_iter()
            .find(|v| v.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown severity: {}", s))
    }
}

/// Vulnerability class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SqlInjection,
    CommandInjection,
    Xss,
    PathTraversal,
    InsecureDeserialization,
    HardcodedCredentials,
    WeakCryptography,
    ExposedSecret,
    CodeInjection,
    Ssrf,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SqlInjection => "sql_injection",
            Category::CommandInjection => "command_injection",
            Category::Xss => "xss",
            Category::PathTraversal => "path_traversal",
            Category::InsecureDeserialization => "insecure_deserialization",
            Category::HardcodedCredentials => "hardcoded_credentials",
            Category::WeakCryptography => "weak_cryptography",
            Category::ExposedSecret => "exposed_secret",
            Category::CodeInjection => "code_injection",
            Category::Ssrf => "ssrf",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Category::SqlInjection => "SQL Injection",
            Category::CommandInjection => "Command Injection",
            Category::Xss => "Cross-Site Scripting",
            Category::PathTraversal => "Path Traversal",
            Category::InsecureDeserialization => "Insecure Deserialization",
            Category::HardcodedCredentials => "Hardcoded Credentials",
            Category::WeakCryptography => "Weak Cryptography",
            Category::ExposedSecret => "Exposed Secret",
            Category::CodeInjection => "Code Injection",
            Category::Ssrf => "Server-Side Request Forgery",
        }
    }

    pub fn owasp(&self) -> &'static str {
        match self {
            Category::SqlInjection
            | Category::CommandInjection
            | Category::Xss
            | Category::CodeInjection => "A03:2021-Injection",
            Category::PathTraversal => "A01:2021-Broken Access Control",
            Category::InsecureDeserialization => "A08:2021-Software and Data Integrity Failures",
            Category::HardcodedCredentials | Category::ExposedSecret => {
                "A07:2021-Identification and Authentication Failures"
            }
            Category::WeakCryptography => "A02:2021-Cryptographic Failures",
            Category::Ssrf => "A10:2021-Server-Side Request Forgery",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single security finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub rule_id: String,
    pub severity: VulnSeverity,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub location: Location,
    /// 1-based byte column of the match.
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owasp: Option<String>,
    /// Offending line, trimmed; secret values are masked.
    pub snippet: String,
}

impl Vulnerability {
    pub(crate) fn sort_key(&self) -> (&str, usize, usize, &str) {
        (
            self.location.file.as_str(),
            self.location.line,
            self.column,
            self.rule_id.as_str(),
        )
    }
}

/// Count of findings per severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
    /// Findings per category name.
    pub by_category: BTreeMap<String, usize>,
}

impl SeveritySummary {
    pub fn from_findings(findings: &[Vulnerability]) -> Self {
        let mut summary = Self::default();
        for v in findings {
            match v.severity {
                VulnSeverity::Critical => summary.critical += 1,
                VulnSeverity::High => summary.high += 1,
                VulnSeverity::Medium => summary.medium += 1,
                VulnSeverity::Low => summary.low += 1,
                VulnSeverity::Info => summary.info += 1,
            }
            *summary
                .by_category
                .entry(v.category.as_str().to_string())
                .or_default() += 1;
        }
        summary.total = findings.len();
        summary
    }

    pub fn count(&self, severity: VulnSeverity) -> usize {
        match severity {
            VulnSeverity::Critical => self.critical,
            VulnSeverity::High => self.high,
            VulnSeverity::Medium => self.medium,
            VulnSeverity::Low => self.low,
            VulnSeverity::Info => self.info,
        }
    }
}

/// Result of scanning a set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub vulnerabilities: Vec<Vulnerability>,
    pub summary: SeveritySummary,
    pub files_scanned: usize,
    /// Scanning stopped before every file was visited.
    pub cancelled: bool,
}

impl SecurityReport {
    pub fn new(vulnerabilities: Vec<Vulnerability>, files_scanned: usize, cancelled: bool) -> Self {
        let summary = SeveritySummary::from_findings(&vulnerabilities);
        Self {
            vulnerabilities,
            summary,
            files_scanned,
            cancelled,
        }
    }

    /// Whether any finding is at least as severe as `threshold`.
    pub fn has_at_least(&self, threshold: VulnSeverity) -> bool {
        self.vulnerabilities
            .iter()
            .any(|v| v.severity.at_least(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downgrade_floors_at_info() {
        assert_eq!(VulnSeverity::Critical.downgrade(), VulnSeverity::High);
        assert_eq!(VulnSeverity::Low.downgrade(), VulnSeverity::Info);
        assert_eq!(VulnSeverity::Info.downgrade(), VulnSeverity::Info);
    }

    #[test]
    fn test_severity_parse_and_rank() {
        assert_eq!("HIGH".parse::<VulnSeverity>(), Ok(VulnSeverity::High));
        assert!("severe".parse::<VulnSeverity>().is_err());
        assert!(VulnSeverity::Critical.at_least(VulnSeverity::High));
        assert!(!VulnSeverity::Medium.at_least(VulnSeverity::High));
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&Category::InsecureDeserialization).unwrap();
        assert_eq!(json, "\"insecure_deserialization\"");
    }
}
