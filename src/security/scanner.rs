//! Per-file security scanning.

use std::collections::BTreeMap;

use globset::GlobSet;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::analysis::text::{truncate, Region, RegionKind};
use crate::analysis::{Layer, SourceFile, SourceText, Syntax};
use crate::cancel::CancellationToken;
use crate::config::build_glob_set;
use crate::graph::Location;
use crate::Result;

use super::rules::{Rule, RULES};
use super::secrets::{is_high_entropy, is_placeholder, mask_value, name_before, SECRET_PATTERNS};
use super::taint::{find_flows, TaintFlow};
use super::types::{Category, SecurityReport, VulnSeverity, Vulnerability};

/// Lines longer than this (minified bundles) are skipped by regex rules.
pub const MAX_LINE_LEN: usize = 4096;

const SNIPPET_LEN: usize = 160;

/// Whether a path is a test, example or generated file.
pub fn is_downgraded_path(path: &str) -> bool {
    if Layer::from_path(path) == Layer::Test {
        return true;
    }
    let lower = path.replace('\\', "/").to_lowercase();
    let mut segments: Vec<&str> = lower.split('/').collect();
    let file_name = segments.pop().unwrap_or("");

    let in_dir = segments.iter().any(|s| {
        matches!(
            *s,
            "example"
                | "examples"
                | "sample"
                | "samples"
                | "demo"
                | "demos"
                | "fixtures"
                | "__fixtures__"
                | "__mocks__"
                | "generated"
                | "__generated__"
        )
    });
    in_dir
        || file_name.contains(".generated.")
        || file_name.contains("_generated.")
        || file_name.contains(".example.")
        || file_name.contains(".min.")
        || file_name.ends_with("_pb2.py")
        || file_name.ends_with(".pb.go")
        || file_name.ends_with(".d.ts")
}

/// Scans raw source text for vulnerabilities, secrets and tainted sinks.
#[derive(Debug, Clone)]
pub struct SecurityScanner {
    entropy: bool,
    downgrade: Option<GlobSet>,
    parallel: bool,
    cancel: CancellationToken,
}

impl Default for SecurityScanner {
    fn default() -> Self {
        Self {
            entropy: true,
            downgrade: None,
            parallel: true,
            cancel: CancellationToken::new(),
        }
    }
}

impl SecurityScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the entropy heuristic.
    pub fn with_entropy(mut self, enabled: bool) -> Self {
        self.entropy = enabled;
        self
    }

    /// Treat paths matching these globs like test/example/generated files.
    pub fn with_downgrade_paths(mut self, patterns: &[String]) -> Result<Self> {
        self.downgrade = if patterns.is_empty() {
            None
        } else {
            Some(build_glob_set(patterns)?)
        };
        Ok(self)
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn downgrades(&self, path: &str) -> bool {
        is_downgraded_path(path)
            || self
                .downgrade
                .as_ref()
                .map(|set| set.is_match(path))
                .unwrap_or(false)
    }

    /// Scan one file. Findings are deduplicated and ordered.
    pub fn scan_file(&self, file: &SourceFile) -> Vec<Vulnerability> {
        let src = SourceText::new(&file.content, Syntax::for_language(file.language));
        let literals = literals_by_line(&src);
        let mut findings = Vec::new();

        for line in 1..=src.line_count() {
            let raw = src.raw_line(line);
            if raw.trim().is_empty() {
                continue;
            }
            if raw.len() > MAX_LINE_LEN {
                debug!(path = %file.path, line, "skipping overlong line");
                continue;
            }
            let line_start = src.line_start(line);

            for rule in RULES.iter() {
                if let Some(v) = match_rule(rule, &src, &file.path, line, line_start, raw) {
                    findings.push(v);
                }
            }

            let named = scan_named_secrets(&file.path, line, raw, &mut findings);
            if self.entropy && !named {
                if let Some(regions) = literals.get(&line) {
                    scan_entropy(&src, &file.path, line, raw, regions, &mut findings);
                }
            }
        }

        for flow in find_flows(&src, MAX_LINE_LEN) {
            findings.push(taint_finding(&file.path, src.raw_line(flow.line), &flow));
        }

        if self.downgrades(&file.path) {
            for v in &mut findings {
                v.severity = v.severity.downgrade();
                v.description
                    .push_str(" (reduced severity: test, example or generated file)");
            }
        }

        finalize(findings)
    }

    /// Scan many files. Cancellation is checked before each file.
    pub fn scan_files(&self, files: &[SourceFile]) -> SecurityReport {
        info!(files = files.len(), "scanning for vulnerabilities");
        let scan_one = |file: &SourceFile| {
            if self.cancel.is_cancelled() {
                return None;
            }
            let found = self.scan_file(file);
            debug!(path = %file.path, findings = found.len(), "scanned file");
            Some(found)
        };

        let results: Vec<Option<Vec<Vulnerability>>> = if self.parallel {
            files.par_iter().map(scan_one).collect()
        } else {
            files.iter().map(scan_one).collect()
        };

        let cancelled = results.iter().any(Option::is_none);
        let files_scanned = results.iter().filter(|r| r.is_some()).count();
        let mut vulnerabilities: Vec<Vulnerability> = results.into_iter().flatten().flatten().collect();
        vulnerabilities.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let report = SecurityReport::new(vulnerabilities, files_scanned, cancelled);
        info!(
            findings = report.summary.total,
            critical = report.summary.critical,
            high = report.summary.high,
            cancelled,
            "security scan complete"
        );
        report
    }
}

/// Single-line string literals, grouped by line.
fn literals_by_line<'s>(src: &'s SourceText<'_>) -> BTreeMap<usize, Vec<&'s Region>> {
    let mut by_line: BTreeMap<usize, Vec<&Region>> = BTreeMap::new();
    for region in src.regions() {
        if region.kind != RegionKind::Str {
            continue;
        }
        let inner = &src.raw()[region.inner_start..region.inner_end];
        if inner.contains('\n') {
            continue;
        }
        by_line
            .entry(src.line_of(region.inner_start))
            .or_default()
            .push(region);
    }
    by_line
}

fn snippet(raw: &str) -> String {
    truncate(raw.trim(), SNIPPET_LEN)
}

fn masked_snippet(raw: &str, value: &str) -> String {
    snippet(&raw.replace(value, &mask_value(value)))
}

#[allow(clippy::too_many_arguments)]
fn vulnerability(
    rule_id: &str,
    category: Category,
    severity: VulnSeverity,
    cwe: &str,
    description: String,
    path: &str,
    line: usize,
    column: usize,
    snippet: String,
) -> Vulnerability {
    Vulnerability {
        id: format!("{}:{}:{}:{}", rule_id, path, line, column),
        rule_id: rule_id.to_string(),
        severity,
        category,
        title: category.title().to_string(),
        description,
        location: Location::line(path, line),
        column,
        cwe: Some(cwe.to_string()),
        owasp: Some(category.owasp().to_string()),
        snippet,
    }
}

/// First match of a rule on a line that is outside comments and not cleared.
fn match_rule(
    rule: &Rule,
    src: &SourceText<'_>,
    path: &str,
    line: usize,
    line_start: usize,
    raw: &str,
) -> Option<Vulnerability> {
    if rule.unless.as_ref().map_or(false, |u| u.is_match(raw)) {
        return None;
    }
    for caps in rule.regex.captures_iter(raw) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if src.in_comment(line_start + whole.start()) {
            continue;
        }
        let text = if rule.secret {
            let value = caps.get(1).unwrap_or(whole).as_str();
            if is_placeholder(value) {
                continue;
            }
            masked_snippet(raw, value)
        } else {
            snippet(raw)
        };
        return Some(vulnerability(
            &format!("vuln/{}", rule.id),
            rule.category,
            rule.severity,
            rule.cwe,
            rule.description.to_string(),
            path,
            line,
            whole.start() + 1,
            text,
        ));
    }
    None
}

/// Named secret patterns. Returns whether any pattern matched a
/// non-placeholder value. Comments are scanned too: a key committed in a
/// comment is still leaked.
fn scan_named_secrets(path: &str, line: usize, raw: &str, out: &mut Vec<Vulnerability>) -> bool {
    let mut matched = false;
    for pattern in SECRET_PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(raw) else {
            continue;
        };
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let value = caps.get(1).unwrap_or(whole);
        if is_placeholder(value.as_str()) {
            continue;
        }
        matched = true;
        out.push(vulnerability(
            &format!("secret/{}", pattern.id),
            Category::ExposedSecret,
            pattern.severity,
            "CWE-798",
            format!("{} committed to source", pattern.name),
            path,
            line,
            whole.start() + 1,
            masked_snippet(raw, value.as_str()),
        ));
    }
    matched
}

fn scan_entropy(
    src: &SourceText<'_>,
    path: &str,
    line: usize,
    raw: &str,
    regions: &[&Region],
    out: &mut Vec<Vulnerability>,
) {
    let line_start = src.line_start(line);
    for region in regions {
        let value = &src.raw()[region.inner_start..region.inner_end];
        if !is_high_entropy(value) {
            continue;
        }
        let column = region.start.saturating_sub(line_start) + 1;
        let description = match name_before(raw, region.start.saturating_sub(line_start)) {
            Some(name) => format!("High-entropy string assigned near '{}' looks like a secret", name),
            None => "High-entropy string literal looks like a secret".to_string(),
        };
        out.push(vulnerability(
            "secret/high-entropy",
            Category::ExposedSecret,
            VulnSeverity::Medium,
            "CWE-798",
            description,
            path,
            line,
            column,
            masked_snippet(raw, value),
        ));
    }
}

fn taint_finding(path: &str, raw: &str, flow: &TaintFlow) -> Vulnerability {
    let description = match &flow.via {
        Some(var) => format!(
            "{} read on line {} reaches a {} sink through '{}' without sanitization",
            flow.source.describe(),
            flow.source_line,
            flow.sink.as_str(),
            var
        ),
        None => format!(
            "{} reaches a {} sink without sanitization",
            flow.source.describe(),
            flow.sink.as_str()
        ),
    };
    vulnerability(
        &format!("taint/{}", flow.sink.as_str()),
        flow.sink.category(),
        flow.sink.severity(),
        flow.sink.cwe(),
        description,
        path,
        flow.line,
        flow.column,
        snippet(raw),
    )
}

/// Keep the most severe finding per (file, line, category), then order by
/// file, line, column and rule id.
fn finalize(mut findings: Vec<Vulnerability>) -> Vec<Vulnerability> {
    findings.sort_by(|a, b| {
        (&a.location.file, a.location.line, a.category, a.severity)
            .cmp(&(&b.location.file, b.location.line, b.category, b.severity))
            .then_with(|| a.sort_key().cmp(&b.sort_key()))
    });
    findings.dedup_by(|later, first| {
        later.location.file == first.location.file
            && later.location.line == first.location.line
            && later.category == first.category
    });
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQL_LINE: &str = r#"  db.query("SELECT * FROM x WHERE id=" + req.params.id);"#;

    fn scan(path: &str, content: &str) -> Vec<Vulnerability> {
        SecurityScanner::new().scan_file(&SourceFile::new(path, content))
    }

    #[test]
    fn test_sql_injection_is_critical() {
        let found = scan("src/users.ts", &format!("{}\n", SQL_LINE));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].category, Category::SqlInjection);
        assert_eq!(found[0].severity, VulnSeverity::Critical);
        assert_eq!(found[0].cwe.as_deref(), Some("CWE-89"));
        assert_eq!(found[0].location.line, 1);
    }

    #[test]
    fn test_comment_is_not_flagged() {
        let found = scan("src/users.ts", &format!("// {}\n", SQL_LINE.trim()));
        assert!(found.is_empty());
        let found = scan(
            "src/users.ts",
            &format!("/*\n{}\n*/\n", SQL_LINE),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_docstring_is_not_flagged() {
        let code = "def f():\n    \"\"\"\n    cursor.execute(\"DELETE FROM t WHERE id = %s\" % user_id)\n    \"\"\"\n    return 1\n";
        assert!(scan("app/db.py", code).is_empty());
    }

    #[test]
    fn test_test_file_is_downgraded() {
        let found = scan("src/users.test.ts", &format!("{}\n", SQL_LINE));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, VulnSeverity::High);
        assert!(found[0].description.contains("reduced severity"));
    }

    #[test]
    fn test_custom_downgrade_glob() {
        let scanner = SecurityScanner::new()
            .with_downgrade_paths(&["legacy/**".to_string()])
            .unwrap();
        let found = scanner.scan_file(&SourceFile::new("legacy/db.ts", format!("{}\n", SQL_LINE)));
        assert_eq!(found[0].severity, VulnSeverity::High);
        assert!(SecurityScanner::new()
            .with_downgrade_paths(&["[".to_string()])
            .is_err());
    }

    #[test]
    fn test_named_secret() {
        let found = scan(
            "src/config.ts",
            "export const apiKey = \"aB3dE5gH7jK9mN1pQ2rS4tU6vW8xY0zC2iL4oF6\";\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_id, "secret/generic-api-key");
        assert_eq!(found[0].category, Category::ExposedSecret);
        assert!(found[0].snippet.contains("aB3d...4oF6"));
        assert!(!found[0].snippet.contains("aB3dE5gH7jK9mN1pQ2rS4tU6vW8xY0zC2iL4oF6"));
    }

    #[test]
    fn test_entropy_secret() {
        let found = scan(
            "src/client.ts",
            "const blob = \"Zq8Xv2Lm9Tr4Wk7Pn3Hs6Jd1Fb5Gc0Yt-Qe_Ra+U\";\n",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_id, "secret/high-entropy");
        assert_eq!(found[0].column, 14);

        let quiet = SecurityScanner::new().with_entropy(false).scan_file(&SourceFile::new(
            "src/client.ts",
            "const blob = \"Zq8Xv2Lm9Tr4Wk7Pn3Hs6Jd1Fb5Gc0Yt-Qe_Ra+U\";\n",
        ));
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_low_entropy_not_flagged() {
        let found = scan(
            "src/client.ts",
            &format!("const blob = \"{}\";\n", "a".repeat(40)),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_placeholder_secret_not_flagged() {
        let found = scan("src/config.py", "API_KEY = \"your_api_key_goes_here\"\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_overlong_lines_are_skipped() {
        let line = format!("{} // {}\n", SQL_LINE, "x".repeat(MAX_LINE_LEN));
        assert!(scan("dist/app.js", &line).is_empty());
    }

    #[test]
    fn test_dedup_keeps_most_severe() {
        let low = vulnerability(
            "b",
            Category::Xss,
            VulnSeverity::Medium,
            "CWE-79",
            String::new(),
            "a.ts",
            3,
            1,
            String::new(),
        );
        let high = vulnerability(
            "a",
            Category::Xss,
            VulnSeverity::High,
            "CWE-79",
            String::new(),
            "a.ts",
            3,
            9,
            String::new(),
        );
        let found = finalize(vec![low, high]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, VulnSeverity::High);
    }

    #[test]
    fn test_downgraded_paths() {
        assert!(is_downgraded_path("tests/test_api.py"));
        assert!(is_downgraded_path("examples/basic/main.rs"));
        assert!(is_downgraded_path("src/proto/user_pb2.py"));
        assert!(is_downgraded_path("src/api.generated.ts"));
        assert!(!is_downgraded_path("src/api/users.ts"));
    }

    #[test]
    fn test_scan_files_is_ordered_and_cancellable() {
        let files = vec![
            SourceFile::new("b.ts", format!("{}\n", SQL_LINE)),
            SourceFile::new("a.ts", format!("\n{}\n", SQL_LINE)),
        ];
        let report = SecurityScanner::new().scan_files(&files);
        assert_eq!(report.files_scanned, 2);
        assert!(!report.cancelled);
        assert_eq!(report.summary.critical, 2);
        let paths: Vec<_> = report
            .vulnerabilities
            .iter()
            .map(|v| v.location.file.as_str())
            .collect();
        assert_eq!(paths, vec!["a.ts", "b.ts"]);

        let token = CancellationToken::new();
        token.cancel();
        let report = SecurityScanner::new()
            .with_cancellation(token)
            .scan_files(&files);
        assert!(report.cancelled);
        assert_eq!(report.files_scanned, 0);
        assert!(report.vulnerabilities.is_empty());
    }
}
