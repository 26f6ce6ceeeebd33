//! Output formatting for codestrata results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the full result model for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for the security report

use std::collections::BTreeMap;
use std::fmt::Write as _;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::detect::{CodeIssue, Severity};
use crate::result::AnalysisResult;
use crate::security::{SecurityReport, VulnSeverity, Vulnerability};
use crate::Result;

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pretty,
    Json,
    Sarif,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Format::Pretty),
            "json" => Ok(Format::Json),
            "sarif" => Ok(Format::Sarif),
            _ => Err(format!(
                "invalid format {:?}, must be 'pretty', 'json', or 'sarif'",
                s
            )),
        }
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// Serialize any result model as pretty-printed JSON.
pub fn render_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "codestrata";
const INFO_URI: &str = "https://github.com/zen-systems/codestrata";

#[derive(Serialize, Deserialize)]
struct SarifReport {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize, Deserialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize, Deserialize)]
struct SarifDriver {
    name: String,
    version: String,
    #[serde(rename = "informationUri")]
    information_uri: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize, Deserialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "fullDescription", skip_serializing_if = "Option::is_none")]
    full_description: Option<SarifMessage>,
    #[serde(rename = "helpUri", skip_serializing_if = "Option::is_none")]
    help_uri: Option<String>,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
    properties: SarifProperties,
}

#[derive(Serialize, Deserialize)]
struct SarifRuleConfig {
    level: String,
}

#[derive(Serialize, Deserialize)]
struct SarifProperties {
    tags: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize, Deserialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize, Deserialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize, Deserialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize, Deserialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
    #[serde(rename = "startColumn")]
    start_column: usize,
}

fn map_severity_to_level(severity: VulnSeverity) -> &'static str {
    match severity {
        VulnSeverity::Critical | VulnSeverity::High => "error",
        VulnSeverity::Medium => "warning",
        VulnSeverity::Low | VulnSeverity::Info => "note",
    }
}

/// `sql-injection/concatenation` becomes `SqlInjectionConcatenation`.
fn rule_name(rule_id: &str) -> String {
    rule_id
        .split(|c: char| c == '/' || c == '-' || c == '_')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn cwe_uri(cwe: &str) -> Option<String> {
    cwe.strip_prefix("CWE-")
        .map(|n| format!("https://cwe.mitre.org/data/definitions/{}.html", n))
}

fn sarif_rule(v: &Vulnerability) -> SarifRule {
    let mut tags = vec!["security".to_string(), v.category.as_str().to_string()];
    tags.extend(v.cwe.iter().cloned());
    tags.extend(v.owasp.iter().cloned());
    SarifRule {
        id: v.rule_id.clone(),
        name: rule_name(&v.rule_id),
        short_description: SarifMessage {
            text: v.title.clone(),
        },
        full_description: Some(SarifMessage {
            text: v.description.clone(),
        }),
        help_uri: Some(
            v.cwe
                .as_deref()
                .and_then(cwe_uri)
                .unwrap_or_else(|| INFO_URI.to_string()),
        ),
        default_config: SarifRuleConfig {
            level: map_severity_to_level(v.severity).to_string(),
        },
        properties: SarifProperties { tags },
    }
}

/// Render a security report as SARIF 2.1.0.
pub fn render_sarif(report: &SecurityReport) -> Result<String> {
    // First finding of each rule describes it; BTreeMap keeps rules sorted.
    let mut rules: BTreeMap<&str, &Vulnerability> = BTreeMap::new();
    for v in &report.vulnerabilities {
        rules.entry(v.rule_id.as_str()).or_insert(v);
    }
    let rules: Vec<SarifRule> = rules.values().map(|v| sarif_rule(v)).collect();

    let results: Vec<SarifResult> = report
        .vulnerabilities
        .iter()
        .map(|v| SarifResult {
            rule_id: v.rule_id.clone(),
            level: map_severity_to_level(v.severity).to_string(),
            message: SarifMessage {
                text: format!("{}: {}", v.title, v.description),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: v.location.file.clone(),
                    },
                    region: SarifRegion {
                        start_line: v.location.line.max(1),
                        start_column: v.column.max(1),
                    },
                },
            }],
        })
        .collect();

    let sarif = SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    information_uri: INFO_URI.to_string(),
                    rules,
                },
            },
            results,
        }],
    };

    Ok(serde_json::to_string_pretty(&sarif)?)
}

// =============================================================================
// Pretty Format
// =============================================================================

fn header(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {} v{}",
        TOOL_NAME.cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}{}", format!("{:<10}", label).dimmed(), value);
}

fn issue_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "ERROR".red(),
        Severity::Warning => "WARN ".yellow(),
        Severity::Info => "INFO ".blue(),
    }
}

fn vuln_tag(severity: VulnSeverity) -> ColoredString {
    match severity {
        VulnSeverity::Critical => "CRIT ".red().bold(),
        VulnSeverity::High => "HIGH ".red(),
        VulnSeverity::Medium => "MED  ".yellow(),
        VulnSeverity::Low => "LOW  ".blue(),
        VulnSeverity::Info => "INFO ".dimmed(),
    }
}

fn write_issues(out: &mut String, issues: &[CodeIssue]) {
    let _ = writeln!(out, "  {} ({}):", "Issues".bold(), issues.len());
    let _ = writeln!(out);
    for issue in issues {
        let _ = writeln!(
            out,
            "    {}   {:<22}{}{}",
            issue_tag(issue.severity),
            issue.issue_type.as_str().dimmed(),
            issue.location.file.blue(),
            format!(":{}", issue.location.line).dimmed()
        );
        let _ = writeln!(out, "            {}", issue.message);
        if let Some(suggestion) = &issue.suggestion {
            let _ = writeln!(out, "            {}", suggestion.dimmed());
        }
        let _ = writeln!(out);
    }
}

fn write_vulnerabilities(out: &mut String, report: &SecurityReport) {
    let _ = writeln!(
        out,
        "  {} ({}):",
        "Vulnerabilities".bold(),
        report.vulnerabilities.len()
    );
    let _ = writeln!(out);
    for v in &report.vulnerabilities {
        let _ = writeln!(
            out,
            "    {}   {:<22}{}{}",
            vuln_tag(v.severity),
            v.category.as_str().dimmed(),
            v.location.file.blue(),
            format!(":{}:{}", v.location.line, v.column).dimmed()
        );
        let cwe = v.cwe.as_deref().unwrap_or("");
        let _ = writeln!(out, "            {} {}", v.description, cwe.dimmed());
        let _ = writeln!(out, "            {}", v.snippet.dimmed());
        let _ = writeln!(out);
    }
}

fn write_security_summary(out: &mut String, report: &SecurityReport) {
    let s = &report.summary;
    let _ = writeln!(
        out,
        "  {}  critical {}  high {}  medium {}  low {}  info {}  ({} files)",
        "Security:".bold(),
        s.critical.to_string().red().bold(),
        s.high.to_string().red(),
        s.medium.to_string().yellow(),
        s.low,
        s.info,
        report.files_scanned
    );
    if report.cancelled {
        let _ = writeln!(out, "  {}", "scan cancelled before all files were visited".yellow());
    }
}

/// Human-readable rendering of an analysis result.
pub fn render_pretty(result: &AnalysisResult) -> String {
    let mut out = String::new();
    header(&mut out, "Project:", &result.meta.project);
    let stats = &result.stats;
    let _ = writeln!(
        out,
        "  {}{} files, {} lines, {} nodes, {} edges",
        format!("{:<10}", "Graph:").dimmed(),
        stats.total_files,
        stats.total_lines,
        stats.total_nodes,
        stats.total_edges
    );
    let _ = writeln!(
        out,
        "  {}{} entry points, max depth {}",
        format!("{:<10}", "Calls:").dimmed(),
        result.call_graph.entry_points().count(),
        result.call_graph.max_depth()
    );
    if result.meta.cancelled {
        let _ = writeln!(out, "  {}", "analysis cancelled before all files were parsed".yellow());
    }
    let _ = writeln!(out);

    if result.issues.is_empty() {
        let _ = writeln!(out, "  {}", "✓ No issues".green());
    } else {
        write_issues(&mut out, &result.issues);
    }

    if let Some(report) = &result.security {
        let _ = writeln!(out);
        if !report.vulnerabilities.is_empty() {
            write_vulnerabilities(&mut out, report);
        }
        write_security_summary(&mut out, report);
    }
    let _ = writeln!(out);
    out
}

/// Human-readable rendering of a security report.
pub fn render_pretty_security(path: &str, report: &SecurityReport) -> String {
    let mut out = String::new();
    header(&mut out, "Scanning:", path);
    let _ = writeln!(out);
    if report.vulnerabilities.is_empty() {
        let _ = writeln!(out, "  {}", "✓ No vulnerabilities".green());
    } else {
        write_vulnerabilities(&mut out, report);
    }
    write_security_summary(&mut out, report);
    let _ = writeln!(out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SourceFile;
    use crate::security::SecurityScanner;

    fn report() -> SecurityReport {
        SecurityScanner::new().scan_files(&[SourceFile::new(
            "src/db.ts",
            "db.query(\"SELECT * FROM t WHERE id=\" + req.params.id);\nconst h = crypto.createHash('md5');\n",
        )])
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("sarif".parse::<Format>(), Ok(Format::Sarif));
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn test_rule_name() {
        assert_eq!(rule_name("vuln/sql-injection/concatenation"), "VulnSqlInjectionConcatenation");
        assert_eq!(rule_name("secret/high-entropy"), "SecretHighEntropy");
    }

    #[test]
    fn test_sarif_structure() {
        let sarif = render_sarif(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&sarif).unwrap();
        assert_eq!(value["version"], "2.1.0");
        let run = &value["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "codestrata");
        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["level"], "error");
        assert_eq!(results[0]["locations"][0]["physicalLocation"]["region"]["startLine"], 1);
        assert_eq!(results[1]["level"], "warning");
        let rules = run["tool"]["driver"]["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules
            .iter()
            .any(|r| r["helpUri"] == "https://cwe.mitre.org/data/definitions/89.html"));
    }

    #[test]
    fn test_pretty_security_lists_findings() {
        colored::control::set_override(false);
        let text = render_pretty_security("src", &report());
        assert!(text.contains("CRIT"));
        assert!(text.contains("sql_injection"));
        assert!(text.contains("src/db.ts:1:"));
        assert!(text.contains("critical 1"));
    }
}
