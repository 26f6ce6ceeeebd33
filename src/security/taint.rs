//! Near-line taint approximation.
//!
//! Fixed tables classify source expressions (request data, process
//! arguments, environment, stdin), sink calls and sanitizers. A sink is
//! tainted when a source appears on the same line, or when a variable
//! assigned from a source a few lines above is used in the sink's arguments,
//! and no sanitizer for that sink class sits between them. Nothing is
//! tracked across functions or files.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::text::contains_word;
use crate::analysis::SourceText;

use super::rules::compile;
use super::types::{Category, VulnSeverity};

/// Lines a tainted assignment stays live for.
pub const TAINT_WINDOW: usize = 5;

/// Where tainted data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    UserInput,
    CommandLine,
    Environment,
    Stdin,
}

impl SourceKind {
    pub fn describe(&self) -> &'static str {
        match self {
            SourceKind::UserInput => "request input",
            SourceKind::CommandLine => "command-line arguments",
            SourceKind::Environment => "environment variables",
            SourceKind::Stdin => "standard input",
        }
    }
}

/// Operation that is dangerous with tainted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    SqlQuery,
    OsCommand,
    FileAccess,
    HtmlOutput,
    HttpRequest,
    CodeExecution,
    Deserialization,
}

impl SinkKind {
    pub const ALL: [SinkKind; 7] = [
        SinkKind::SqlQuery,
        SinkKind::OsCommand,
        SinkKind::FileAccess,
        SinkKind::HtmlOutput,
        SinkKind::HttpRequest,
        SinkKind::CodeExecution,
        SinkKind::Deserialization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::SqlQuery => "sql-query",
            SinkKind::OsCommand => "os-command",
            SinkKind::FileAccess => "file-access",
            SinkKind::HtmlOutput => "html-output",
            SinkKind::HttpRequest => "http-request",
            SinkKind::CodeExecution => "code-execution",
            SinkKind::Deserialization => "deserialization",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            SinkKind::SqlQuery => Category::SqlInjection,
            SinkKind::OsCommand => Category::CommandInjection,
            SinkKind::FileAccess => Category::PathTraversal,
            SinkKind::HtmlOutput => Category::Xss,
            SinkKind::HttpRequest => Category::Ssrf,
            SinkKind::CodeExecution => Category::CodeInjection,
            SinkKind::Deserialization => Category::InsecureDeserialization,
        }
    }

    pub fn severity(&self) -> VulnSeverity {
        match self {
            SinkKind::SqlQuery | SinkKind::OsCommand | SinkKind::CodeExecution => {
                VulnSeverity::Critical
            }
            SinkKind::FileAccess
            | SinkKind::HtmlOutput
            | SinkKind::HttpRequest
            | SinkKind::Deserialization => VulnSeverity::High,
        }
    }

    pub fn cwe(&self) -> &'static str {
        match self {
            SinkKind::SqlQuery => "CWE-89",
            SinkKind::OsCommand => "CWE-78",
            SinkKind::FileAccess => "CWE-22",
            SinkKind::HtmlOutput => "CWE-79",
            SinkKind::HttpRequest => "CWE-918",
            SinkKind::CodeExecution => "CWE-94",
            SinkKind::Deserialization => "CWE-502",
        }
    }
}

struct Table<K> {
    kind: K,
    regex: Regex,
}

fn table<K: Copy>(entries: &[(K, &'static str, &'static str)]) -> Vec<Table<K>> {
    entries
        .iter()
        .filter_map(|(kind, id, pattern)| {
            compile(id, pattern).map(|regex| Table { kind: *kind, regex })
        })
        .collect()
}

static SOURCES: Lazy<Vec<Table<SourceKind>>> = Lazy::new(|| {
    table(&[
        (
            SourceKind::UserInput,
            "source/request",
            r"\b(?:req|request)\.(?:body|query|params|headers|cookies|files|args|form|values|json|data|GET|POST|get_json)\b",
        ),
        (
            SourceKind::UserInput,
            "source/browser",
            r"\b(?:location\.(?:search|hash|href)|document\.(?:cookie|URL|referrer))\b",
        ),
        (
            SourceKind::CommandLine,
            "source/argv",
            r"\bprocess\.argv\b|\bsys\.argv\b|\b(?:std::)?env::args\b",
        ),
        (
            SourceKind::Environment,
            "source/env",
            r"\bprocess\.env\b|\bos\.environ\b|\bos\.getenv\b|\b(?:std::)?env::var\b",
        ),
        (
            SourceKind::Stdin,
            "source/stdin",
            r"\bsys\.stdin\b|\bprocess\.stdin\b|\binput\s*\(|\bstdin\s*\(\s*\)",
        ),
    ])
});

static SINKS: Lazy<Vec<Table<SinkKind>>> = Lazy::new(|| {
    table(&[
        (
            SinkKind::SqlQuery,
            "sink/sql",
            r"\b(?:query|execute|executemany|raw|query_as|prepare)\s*(?:::<[^>]*>)?\s*\(",
        ),
        (
            SinkKind::OsCommand,
            "sink/command",
            r"\b(?:exec|execSync|spawn|spawnSync|execFile|system|popen|Popen|check_output|check_call)\s*\(|\bsubprocess\.(?:run|call)\s*\(|\bCommand::new\s*\(",
        ),
        (
            SinkKind::FileAccess,
            "sink/file",
            r"\b(?:readFile|readFileSync|writeFile|writeFileSync|createReadStream|createWriteStream|unlink|unlinkSync|sendFile|open|read_to_string)\s*\(|\bFile::(?:open|create)\s*\(",
        ),
        (
            SinkKind::HtmlOutput,
            "sink/html",
            r"\.(?:innerHTML|outerHTML)\s*\+?=|\bdocument\.write(?:ln)?\s*\(|\bres\.send\s*\(|\bmake_response\s*\(|\brender_template_string\s*\(",
        ),
        (
            SinkKind::HttpRequest,
            "sink/http",
            r"\b(?:fetch|urlopen|urlretrieve)\s*\(|\baxios(?:\.(?:get|post|put|delete|request))?\s*\(|\brequests\.(?:get|post|put|delete|request)\s*\(|\breqwest::get\s*\(|\bhttps?\.get\s*\(",
        ),
        (
            SinkKind::CodeExecution,
            "sink/eval",
            r"\beval\s*\(|\bnew\s+Function\s*\(|\bvm\.runIn\w*\s*\(",
        ),
        (
            SinkKind::Deserialization,
            "sink/deserialize",
            r"\b(?:pickle|cPickle|dill)\.loads?\s*\(|\byaml\.(?:load|unsafe_load)\s*\(|\bunserialize\s*\(",
        ),
    ])
});

struct Sanitizer {
    sinks: &'static [SinkKind],
    regex: Regex,
}

static SANITIZERS: Lazy<Vec<Sanitizer>> = Lazy::new(|| {
    let entries: [(&'static [SinkKind], &str, &str); 8] = [
        (&SinkKind::ALL, "sanitizer/generic", r"\bsanitize\w*\s*\(|\bvalidate\w*\s*\("),
        (
            &[SinkKind::SqlQuery],
            "sanitizer/sql",
            r#"\b(?:escape|escapeId|quote_ident|literal|parseInt|parseFloat|Number|int|float)\s*\(|[?]\s*[`'"]\s*,|\$\d+\s*[`'"]\s*,|%s\s*["']\s*,"#,
        ),
        (
            &[SinkKind::OsCommand],
            "sanitizer/shell",
            r"\b(?:shlex\.quote|pipes\.quote|escapeShellArg|shellEscape|shell_escape|quote)\s*\(",
        ),
        (
            &[SinkKind::FileAccess],
            "sanitizer/path",
            r"\b(?:basename|secure_filename|canonicalize|realpath)\s*\(",
        ),
        (
            &[SinkKind::HtmlOutput],
            "sanitizer/html",
            r"\b(?:escape\w*|encodeURIComponent|encodeURI|DOMPurify\.sanitize|bleach\.clean|xss)\s*\(|\btextContent\b",
        ),
        (
            &[SinkKind::HttpRequest],
            "sanitizer/url",
            r"\b(?:isAllowedUrl|isValidUrl|allowlist\w*|whitelist\w*|is_safe_url|url_has_allowed_host_and_scheme)\s*\(",
        ),
        (
            &[SinkKind::CodeExecution],
            "sanitizer/eval",
            r"\b(?:JSON\.parse|ast\.literal_eval|parseInt|Number)\s*\(",
        ),
        (
            &[SinkKind::Deserialization],
            "sanitizer/deserialize",
            r"\b(?:safe_load|SafeLoader|json\.loads)\b",
        ),
    ];
    entries
        .iter()
        .filter_map(|(sinks, id, pattern)| {
            compile(id, pattern).map(|regex| Sanitizer { sinks: *sinks, regex })
        })
        .collect()
});

fn sanitized(sink: SinkKind, text: &str) -> bool {
    SANITIZERS
        .iter()
        .filter(|s| s.sinks.contains(&sink))
        .any(|s| s.regex.is_match(text))
}

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:const|let|var)\s+(?:mut\s+)?)?([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=[^=>]").unwrap()
});

/// A sink reached by tainted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintFlow {
    pub line: usize,
    /// 1-based byte column of the sink.
    pub column: usize,
    pub source: SourceKind,
    pub sink: SinkKind,
    /// Variable carrying the tainted value, when not on the sink's line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    /// Line the tainted value was read on.
    pub source_line: usize,
}

#[derive(Debug)]
struct Tainted {
    line: usize,
    kind: SourceKind,
    rhs: String,
}

fn matches_outside_comments<K: Copy>(
    src: &SourceText<'_>,
    line_start: usize,
    raw: &str,
    entries: &[Table<K>],
) -> Vec<(K, usize, usize)> {
    let mut found = Vec::new();
    for entry in entries {
        for m in entry.regex.find_iter(raw) {
            if !src.in_comment(line_start + m.start()) {
                found.push((entry.kind, m.start(), m.end()));
            }
        }
    }
    found.sort_by_key(|(_, start, _)| *start);
    found
}

/// Find tainted sinks in one file. Lines longer than `max_line_len` bytes
/// are skipped.
pub fn find_flows(src: &SourceText<'_>, max_line_len: usize) -> Vec<TaintFlow> {
    let mut flows = Vec::new();
    let mut tainted: HashMap<String, Tainted> = HashMap::new();

    for line in 1..=src.line_count() {
        let raw = src.raw_line(line);
        if raw.len() > max_line_len || raw.trim().is_empty() {
            continue;
        }
        let line_start = src.line_start(line);
        let sources = matches_outside_comments(src, line_start, raw, &SOURCES);
        let sinks = matches_outside_comments(src, line_start, raw, &SINKS);

        for &(sink, sink_start, sink_end) in &sinks {
            let direct = sources.iter().find(|&&(_, start, end)| {
                let from = start.min(sink_start);
                let to = end.max(sink_end);
                !sanitized(sink, &raw[from..to])
            });
            if let Some(&(source, _, _)) = direct {
                flows.push(TaintFlow {
                    line,
                    column: sink_start + 1,
                    source,
                    sink,
                    via: None,
                    source_line: line,
                });
                continue;
            }
            if !sources.is_empty() {
                continue;
            }

            let arguments = &raw[sink_start..];
            let mut carriers: Vec<(&String, &Tainted)> = tainted
                .iter()
                .filter(|(name, t)| {
                    line - t.line <= TAINT_WINDOW
                        && contains_word(arguments, name)
                        && !sanitized(sink, &t.rhs)
                        && !sanitized(sink, arguments)
                })
                .collect();
            carriers.sort_by(|a, b| (a.1.line, a.0).cmp(&(b.1.line, b.0)));
            if let Some((name, t)) = carriers.first() {
                flows.push(TaintFlow {
                    line,
                    column: sink_start + 1,
                    source: t.kind,
                    sink,
                    via: Some((*name).clone()),
                    source_line: t.line,
                });
            }
        }

        if let Some(caps) = ASSIGNMENT.captures(raw) {
            let name = caps[1].to_string();
            let rhs_start = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);
            let rhs = &raw[rhs_start..];
            let source = sources.iter().find(|(_, start, _)| *start >= rhs_start);
            match source {
                Some(&(kind, _, _)) => {
                    tainted.insert(
                        name,
                        Tainted {
                            line,
                            kind,
                            rhs: rhs.to_string(),
                        },
                    );
                }
                None => {
                    tainted.remove(&name);
                }
            }
        }
        tainted.retain(|_, t| line - t.line < TAINT_WINDOW);
    }

    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Syntax;

    fn flows(code: &str, syntax: Syntax) -> Vec<TaintFlow> {
        find_flows(&SourceText::new(code, syntax), 4096)
    }

    #[test]
    fn test_same_line_flow() {
        let found = flows(
            "app.get('/u', (req, res) => db.query('SELECT * FROM u WHERE id=' + req.params.id));\n",
            Syntax::TypeScript,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sink, SinkKind::SqlQuery);
        assert_eq!(found[0].source, SourceKind::UserInput);
        assert_eq!(found[0].sink.cwe(), "CWE-89");
    }

    #[test]
    fn test_sanitizer_between_source_and_sink() {
        let found = flows(
            "db.query('SELECT * FROM u WHERE id=' + parseInt(req.params.id));\n",
            Syntax::TypeScript,
        );
        assert!(found.is_empty());

        // An HTML escaper does not clear a SQL sink.
        let found = flows(
            "db.query('SELECT * FROM u WHERE id=' + escapeHtml(req.params.id));\n",
            Syntax::TypeScript,
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_flow_through_variable() {
        let code = "import subprocess\n\ndef run(request):\n    cmd = request.args.get('cmd')\n    subprocess.run(cmd, shell=True)\n";
        let found = flows(code, Syntax::Python);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sink, SinkKind::OsCommand);
        assert_eq!(found[0].via.as_deref(), Some("cmd"));
        assert_eq!(found[0].source_line, 4);
        assert_eq!(found[0].line, 5);
    }

    #[test]
    fn test_reassignment_clears_taint() {
        let code = "cmd = request.args.get('cmd')\ncmd = 'ls'\nos.system(cmd)\n";
        assert!(flows(code, Syntax::Python).is_empty());
    }

    #[test]
    fn test_taint_expires_outside_window() {
        let mut code = String::from("const target = req.query.url;\n");
        for _ in 0..TAINT_WINDOW {
            code.push_str("log();\n");
        }
        code.push_str("fetch(target);\n");
        assert!(flows(&code, Syntax::TypeScript).is_empty());
    }

    #[test]
    fn test_comment_sink_is_ignored() {
        let found = flows("// eval(req.body.code)\n", Syntax::TypeScript);
        assert!(found.is_empty());
    }
}
