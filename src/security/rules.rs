//! Vulnerability pattern groups.
//!
//! Each rule is one alternative regex inside a named group (SQL injection,
//! command injection, XSS, path traversal, insecure deserialization,
//! hardcoded credentials, weak cryptography). Patterns are matched one line
//! at a time against raw text. A pattern that fails to compile is logged and
//! left out; the remaining rules still run.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::types::{Category, VulnSeverity};

/// A compiled vulnerability rule.
#[derive(Debug)]
pub struct Rule {
    pub id: &'static str,
    pub category: Category,
    pub severity: VulnSeverity,
    pub cwe: &'static str,
    pub description: &'static str,
    pub regex: Regex,
    /// A line matching this pattern clears the finding.
    pub unless: Option<Regex>,
    /// The match (or its first capture group) is a credential value: skip
    /// placeholders and mask it in snippets.
    pub secret: bool,
}

struct RuleSpec {
    id: &'static str,
    category: Category,
    severity: VulnSeverity,
    cwe: &'static str,
    description: &'static str,
    pattern: &'static str,
    unless: Option<&'static str>,
    secret: bool,
}

const fn spec(
    id: &'static str,
    category: Category,
    severity: VulnSeverity,
    cwe: &'static str,
    description: &'static str,
    pattern: &'static str,
) -> RuleSpec {
    RuleSpec {
        id,
        category,
        severity,
        cwe,
        description,
        pattern,
        unless: None,
        secret: false,
    }
}

const RULE_SPECS: &[RuleSpec] = &[
    // SQL injection
    spec(
        "sql-injection/concatenation",
        Category::SqlInjection,
        VulnSeverity::Critical,
        "CWE-89",
        "SQL statement built by string concatenation is passed to a query call",
        r#"(?i)\b(?:query|execute|executemany|exec|raw|prepare)\s*\(\s*[`'"][^`'"]*\b(?:select|insert|update|delete)\b[^`'"]*[`'"]\s*\+"#,
    ),
    spec(
        "sql-injection/template-literal",
        Category::SqlInjection,
        VulnSeverity::Critical,
        "CWE-89",
        "SQL statement built with template interpolation is passed to a query call",
        r#"(?i)\b(?:query|execute|raw|prepare)\s*\(\s*`[^`]*\b(?:select|insert|update|delete)\b[^`]*\$\{"#,
    ),
    spec(
        "sql-injection/f-string",
        Category::SqlInjection,
        VulnSeverity::Critical,
        "CWE-89",
        "SQL statement built with an f-string is passed to execute",
        r#"(?i)\b(?:execute|executemany|raw)\s*\(\s*f(?:"[^"]*\b(?:select|insert|update|delete)\b[^"]*\{|'[^']*\b(?:select|insert|update|delete)\b[^']*\{)"#,
    ),
    spec(
        "sql-injection/string-format",
        Category::SqlInjection,
        VulnSeverity::Critical,
        "CWE-89",
        "SQL statement formatted with % or .format() is passed to execute",
        r#"(?i)\b(?:execute|executemany|raw)\s*\(\s*["'][^"']*\b(?:select|insert|update|delete)\b[^"']*["']\s*(?:%|\.format\s*\()"#,
    ),
    spec(
        "sql-injection/format-macro",
        Category::SqlInjection,
        VulnSeverity::Critical,
        "CWE-89",
        "SQL statement built with format! is passed to a query call",
        r#"(?i)\b(?:query|query_as|execute)\s*(?:::<[^>]*>)?\s*\(\s*&?format!\s*\(\s*"[^"]*\b(?:select|insert|update|delete)\b"#,
    ),
    // Command injection
    spec(
        "command-injection/exec-interpolation",
        Category::CommandInjection,
        VulnSeverity::Critical,
        "CWE-78",
        "Shell command built from concatenated or interpolated strings",
        r#"\b(?:exec|execSync|spawn|spawnSync|execFile)\s*\(\s*(?:[`'"][^`'"]*[`'"]\s*\+|`[^`]*\$\{)"#,
    ),
    spec(
        "command-injection/os-system",
        Category::CommandInjection,
        VulnSeverity::High,
        "CWE-78",
        "os.system/os.popen called with a non-literal command",
        r#"\bos\.(?:system|popen)\s*\(\s*(?:f["']|[A-Za-z_])"#,
    ),
    spec(
        "command-injection/shell-true",
        Category::CommandInjection,
        VulnSeverity::High,
        "CWE-78",
        "subprocess call runs through the shell",
        r#"\bsubprocess\.(?:call|run|Popen|check_output|check_call)\s*\([^)]*shell\s*=\s*True"#,
    ),
    spec(
        "command-injection/format-macro",
        Category::CommandInjection,
        VulnSeverity::High,
        "CWE-78",
        "Process command built with format!",
        r#"\bCommand::new\s*\(\s*&?format!"#,
    ),
    // Cross-site scripting
    spec(
        "xss/inner-html",
        Category::Xss,
        VulnSeverity::High,
        "CWE-79",
        "Non-literal value assigned to innerHTML/outerHTML",
        r#"\.(?:innerHTML|outerHTML)\s*\+?=\s*(?:[A-Za-z_$(]|`[^`]*\$\{)"#,
    ),
    spec(
        "xss/dangerously-set-inner-html",
        Category::Xss,
        VulnSeverity::Medium,
        "CWE-79",
        "Raw HTML rendered through dangerouslySetInnerHTML",
        r#"dangerouslySetInnerHTML\s*=\s*\{\s*\{\s*__html\s*:\s*[^'"`\s}]"#,
    ),
    spec(
        "xss/document-write",
        Category::Xss,
        VulnSeverity::Medium,
        "CWE-79",
        "document.write renders unescaped markup",
        r#"\bdocument\.write(?:ln)?\s*\("#,
    ),
    spec(
        "xss/mark-safe",
        Category::Xss,
        VulnSeverity::Medium,
        "CWE-79",
        "Non-literal value marked safe for HTML output",
        r#"\bmark_safe\s*\(\s*[^'")\s]"#,
    ),
    // Path traversal
    spec(
        "path-traversal/request-path",
        Category::PathTraversal,
        VulnSeverity::High,
        "CWE-22",
        "File operation on a path taken from the request",
        r#"\b(?:readFile|readFileSync|writeFile|writeFileSync|createReadStream|createWriteStream|unlink|unlinkSync|sendFile|open)\s*\([^)]*\b(?:req|request)\.(?:params|query|body|args|form|GET|POST|files)"#,
    ),
    spec(
        "path-traversal/join-request",
        Category::PathTraversal,
        VulnSeverity::High,
        "CWE-22",
        "Path joined with a request value",
        r#"\bpath\.(?:join|resolve)\s*\([^)]*\b(?:req|request)\.(?:params|query|body)"#,
    ),
    // Insecure deserialization
    spec(
        "insecure-deserialization/pickle",
        Category::InsecureDeserialization,
        VulnSeverity::High,
        "CWE-502",
        "pickle-family deserialization executes arbitrary code on untrusted input",
        r#"\b(?:pickle|cPickle|dill|shelve)\.(?:loads?|open)\s*\("#,
    ),
    RuleSpec {
        id: "insecure-deserialization/yaml-load",
        category: Category::InsecureDeserialization,
        severity: VulnSeverity::High,
        cwe: "CWE-502",
        description: "yaml.load without a safe loader constructs arbitrary objects",
        pattern: r#"\byaml\.(?:load|load_all|unsafe_load)\s*\("#,
        unless: Some(r#"Loader\s*=\s*(?:yaml\.)?C?SafeLoader"#),
        secret: false,
    },
    spec(
        "insecure-deserialization/marshal",
        Category::InsecureDeserialization,
        VulnSeverity::Medium,
        "CWE-502",
        "marshal deserialization of untrusted data",
        r#"\bmarshal\.loads?\s*\("#,
    ),
    spec(
        "insecure-deserialization/unserialize",
        Category::InsecureDeserialization,
        VulnSeverity::Medium,
        "CWE-502",
        "Generic object unserialization",
        r#"\bunserialize\s*\("#,
    ),
    // Hardcoded credentials
    RuleSpec {
        id: "hardcoded-credentials/password",
        category: Category::HardcodedCredentials,
        severity: VulnSeverity::High,
        cwe: "CWE-798",
        description: "Password or secret assigned from a string literal",
        pattern: r#"(?i)\b(?:password|passwd|pwd|secret|client_secret|auth_token)["']?\s*[=:]\s*["']([^"'\s]{4,})["']"#,
        unless: None,
        secret: true,
    },
    // Weak cryptography
    spec(
        "weak-crypto/hash",
        Category::WeakCryptography,
        VulnSeverity::Medium,
        "CWE-328",
        "Broken hash algorithm (MD4/MD5/SHA-1)",
        r#"(?i)\bcreateHash\s*\(\s*["'](?:md4|md5|sha1)["']"#,
    ),
    spec(
        "weak-crypto/hashlib",
        Category::WeakCryptography,
        VulnSeverity::Medium,
        "CWE-328",
        "Broken hash algorithm (MD5/SHA-1)",
        r#"\bhashlib\.(?:md5|sha1|new\s*\(\s*["'](?:md5|sha1)["'])"#,
    ),
    spec(
        "weak-crypto/rust-digest",
        Category::WeakCryptography,
        VulnSeverity::Medium,
        "CWE-328",
        "Broken hash algorithm (MD5/SHA-1)",
        r#"\b(?:md5::compute|Md5::new|Sha1::new)\s*\("#,
    ),
    spec(
        "weak-crypto/cipher",
        Category::WeakCryptography,
        VulnSeverity::High,
        "CWE-327",
        "Broken cipher (DES/RC4/RC2/Blowfish)",
        r#"(?i)(?:\bcreateCipher(?:iv)?\s*\(\s*["'](?:des|des-ede|rc4|rc2|bf)\b|\b(?:DES|ARC4|Blowfish)\.new\s*\(|\bCipher\.getInstance\s*\(\s*"(?:DES|RC4))"#,
    ),
    spec(
        "weak-crypto/ecb-mode",
        Category::WeakCryptography,
        VulnSeverity::Medium,
        "CWE-327",
        "Block cipher used in ECB mode",
        r#"(?i)(?:\bMODE_ECB\b|/ECB/|-ecb["'])"#,
    ),
    spec(
        "weak-crypto/insecure-random",
        Category::WeakCryptography,
        VulnSeverity::Low,
        "CWE-338",
        "Math.random is not a cryptographically secure generator",
        r#"\bMath\.random\s*\(\s*\)"#,
    ),
];

/// Compile a pattern, logging and dropping it on failure.
pub(crate) fn compile(id: &str, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(rule = id, error = %e, "skipping pattern that failed to compile");
            None
        }
    }
}

fn build(specs: &[RuleSpec]) -> Vec<Rule> {
    specs
        .iter()
        .filter_map(|s| {
            let regex = compile(s.id, s.pattern)?;
            let unless = match s.unless {
                Some(pattern) => Some(compile(s.id, pattern)?),
                None => None,
            };
            Some(Rule {
                id: s.id,
                category: s.category,
                severity: s.severity,
                cwe: s.cwe,
                description: s.description,
                regex,
                unless,
                secret: s.secret,
            })
        })
        .collect()
}

/// All vulnerability rules that compiled.
pub static RULES: Lazy<Vec<Rule>> = Lazy::new(|| build(RULE_SPECS));

#[cfg(test)]
mod tests {
    use super::*;

    fn matching(line: &str) -> Vec<&'static str> {
        RULES
            .iter()
            .filter(|r| r.regex.is_match(line))
            .filter(|r| r.unless.as_ref().map_or(true, |u| !u.is_match(line)))
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(RULES.len(), RULE_SPECS.len());
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let specs = [
            spec("bad", Category::Xss, VulnSeverity::Low, "CWE-79", "bad", r"(unclosed"),
            spec("good", Category::Xss, VulnSeverity::Low, "CWE-79", "good", r"ok"),
        ];
        let rules = build(&specs);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "good");
    }

    #[test]
    fn test_sql_rules() {
        assert_eq!(
            matching(r#"db.query("SELECT * FROM x WHERE id=" + req.params.id)"#),
            vec!["sql-injection/concatenation"]
        );
        assert_eq!(
            matching(r#"cursor.execute(f"SELECT * FROM users WHERE name = '{name}'")"#),
            vec!["sql-injection/f-string"]
        );
        assert_eq!(
            matching(r#"cursor.execute("DELETE FROM t WHERE id = %s" % user_id)"#),
            vec!["sql-injection/string-format"]
        );
        assert!(matching(r#"db.query("SELECT * FROM x WHERE id = ?", [id])"#).is_empty());
    }

    #[test]
    fn test_command_and_xss_rules() {
        assert_eq!(
            matching("exec(`ls ${dir}`)"),
            vec!["command-injection/exec-interpolation"]
        );
        assert_eq!(
            matching("subprocess.run(cmd, shell=True)"),
            vec!["command-injection/shell-true"]
        );
        assert_eq!(matching("el.innerHTML = userInput;"), vec!["xss/inner-html"]);
        assert!(matching("el.innerHTML = '';").is_empty());
    }

    #[test]
    fn test_yaml_safe_loader_is_cleared() {
        assert_eq!(
            matching("data = yaml.load(stream)"),
            vec!["insecure-deserialization/yaml-load"]
        );
        assert!(matching("data = yaml.load(stream, Loader=yaml.SafeLoader)").is_empty());
    }

    #[test]
    fn test_weak_crypto_rules() {
        assert_eq!(matching("crypto.createHash('md5')"), vec!["weak-crypto/hash"]);
        assert_eq!(matching("h = hashlib.sha1(data)"), vec!["weak-crypto/hashlib"]);
        assert!(matching("crypto.createHash('sha256')").is_empty());
    }

    #[test]
    fn test_password_rule_captures_value() {
        let rule = RULES
            .iter()
            .find(|r| r.id == "hardcoded-credentials/password")
            .unwrap();
        let caps = rule.regex.captures(r#"password = "hunter2hunter2""#).unwrap();
        assert_eq!(&caps[1], "hunter2hunter2");
        assert!(!rule.regex.is_match(r#"if password == "x":"#));
    }
}
