//! Code pattern rules
//!
//! Regex rules matched against JavaScript/TypeScript sources inside an
//! extracted artifact. Each hit becomes one finding carrying the rule id,
//! the file path relative to the package root, and the match count.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::Severity;

/// One detection rule.
pub struct CodePattern {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub pattern: Regex,
}

#[allow(clippy::expect_used)] // static patterns, exercised by tests
fn rule(rule_id: &'static str, severity: Severity, description: &'static str, re: &str) -> CodePattern {
    CodePattern {
        rule_id,
        severity,
        description,
        pattern: Regex::new(re).expect("valid code pattern regex"),
    }
}

/// The rule set, in fixed order so finding output stays deterministic.
pub static CODE_PATTERNS: LazyLock<Vec<CodePattern>> = LazyLock::new(|| {
    vec![
        rule(
            "CODE_EVAL",
            Severity::Critical,
            "dynamic code evaluation via eval",
            r"\beval\s*\(",
        ),
        rule(
            "CODE_FUNCTION_CONSTRUCTOR",
            Severity::High,
            "dynamic code via the Function constructor",
            r"new\s+Function\s*\(",
        ),
        rule(
            "CODE_SHELL_EXEC",
            Severity::High,
            "shell command execution",
            r"\bexec(?:Sync)?\s*\(",
        ),
        rule(
            "CODE_PROCESS_SPAWN",
            Severity::Medium,
            "child process spawning",
            r"\bspawn(?:Sync)?\s*\(",
        ),
        rule(
            "CODE_CHILD_PROCESS_IMPORT",
            Severity::Medium,
            "child_process module import",
            r#"require\s*\(\s*['"]child_process['"]\s*\)|from\s+['"](?:node:)?child_process['"]"#,
        ),
        rule(
            "CODE_HARDCODED_URL",
            Severity::Low,
            "hardcoded remote URL",
            r#"https?://[^\s'"`<>]+"#,
        ),
        rule(
            "CODE_BASE64_DECODE",
            Severity::Medium,
            "base64 payload decoding",
            r#"\batob\s*\(|Buffer\.from\s*\([^)]*,\s*['"]base64['"]"#,
        ),
        rule(
            "CODE_ENV_ACCESS",
            Severity::Low,
            "environment variable access",
            r"process\.env\b",
        ),
    ]
});

/// File suffixes the code scan covers.
pub const SCANNED_SUFFIXES: &[&str] = &[".js", ".ts", ".mjs", ".cjs"];

/// True when the file name has a scanned suffix.
#[must_use]
pub fn is_scannable(file_name: &str) -> bool {
    SCANNED_SUFFIXES.iter().any(|s| file_name.ends_with(s))
}

/// Count matches of one rule inside a source body.
#[must_use]
pub fn match_count(pattern: &CodePattern, source: &str) -> usize {
    pattern.pattern.find_iter(source).count()
}
