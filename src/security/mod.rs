//! Pattern-based security scanning over raw source text.
//!
//! The scanner is independent of the code graph. Three finding classes are
//! produced per file:
//!
//! - vulnerability rules: named regex groups with fixed severity and CWE/OWASP
//!   tags, suppressed inside comments and docstrings
//! - secrets: named credential patterns, plus a Shannon-entropy heuristic
//!   for string literals no named pattern recognized
//! - taint: sink calls reached by a source expression on the same line or
//!   through a recently assigned variable, with no matching sanitizer
//!
//! Findings in test, example and generated files are reported one severity
//! level lower, never dropped.

mod rules;
mod scanner;
mod secrets;
mod taint;
mod types;

pub use rules::{Rule, RULES};
pub use scanner::{is_downgraded_path, SecurityScanner, MAX_LINE_LEN};
pub use secrets::{
    is_high_entropy, is_placeholder, mask_value, shannon_entropy, SecretPattern, MIN_ENTROPY_LEN,
    SECRET_PATTERNS,
};
pub use taint::{find_flows, SinkKind, SourceKind, TaintFlow, TAINT_WINDOW};
pub use types::{Category, SecurityReport, SeveritySummary, VulnSeverity, Vulnerability};
