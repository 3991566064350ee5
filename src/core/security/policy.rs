//! Policy engine
//!
//! A policy is a declarative document gating Add and Scan. Evaluation is a
//! pure function of its inputs: rules run in a fixed order and short-circuit
//! on the first block. An absent policy (or one without a `global` section)
//! allows everything.

use serde::{Deserialize, Serialize};

use crate::core::types::{Finding, Severity};

/// The only supported policy schema version.
pub const POLICY_VERSION: &str = "1.0";

/// Declarative gating policy, loaded from `policy.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<ServerPolicy>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobalPolicy {
    #[serde(default)]
    pub allow_namespaces: Vec<String>,
    #[serde(default)]
    pub deny_namespaces: Vec<String>,
    #[serde(default)]
    pub deny_unverified: bool,
    /// Maximum tolerated risk score; absent means 100 (no cap).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_risk_score: Option<u32>,
    #[serde(default)]
    pub block_severities: Vec<Severity>,
    /// Capability category hints that make an Add require approval.
    #[serde(default)]
    pub require_approval_for: Vec<String>,
}

/// Per-server policy entry. Accepted and schema-validated; reserved for
/// server-scoped overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerPolicy {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_risk_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_severities: Option<Vec<Severity>>,
}

/// Structured reason code for a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    #[serde(rename = "DENYLIST")]
    Denylist,
    #[serde(rename = "ALLOWLIST")]
    Allowlist,
    #[serde(rename = "DENY_UNVERIFIED")]
    DenyUnverified,
    #[serde(rename = "MAX_RISK_SCORE")]
    MaxRiskScore,
    #[serde(rename = "BLOCK_SEVERITY")]
    BlockSeverity,
    #[serde(rename = "POLICY")]
    Policy,
}

impl ReasonCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Denylist => "DENYLIST",
            Self::Allowlist => "ALLOWLIST",
            Self::DenyUnverified => "DENY_UNVERIFIED",
            Self::MaxRiskScore => "MAX_RISK_SCORE",
            Self::BlockSeverity => "BLOCK_SEVERITY",
            Self::Policy => "POLICY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReason {
    pub code: ReasonCode,
    pub message: String,
}

/// Result of evaluating an Add.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEvaluation {
    pub allowed: bool,
    pub reasons: Vec<PolicyReason>,
    pub requires_approval: bool,
}

/// Result of evaluating a Scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvaluation {
    pub allowed: bool,
    pub reasons: Vec<PolicyReason>,
}

/// Inputs shared by both evaluation contexts.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub namespace: &'a str,
    pub verified: bool,
    pub risk_score: u32,
    pub findings: &'a [Finding],
}

/// Validation outcome for a policy document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Structural validation mirroring the policy schema.
#[must_use]
pub fn validate(policy: &Policy) -> PolicyValidation {
    let mut errors = Vec::new();
    if policy.version != POLICY_VERSION {
        errors.push(format!(
            "unsupported policy version '{}' (expected '{POLICY_VERSION}')",
            policy.version
        ));
    }
    if let Some(global) = &policy.global {
        if let Some(cap) = global.max_risk_score
            && cap > 100
        {
            errors.push(format!("maxRiskScore {cap} is outside 0-100"));
        }
        for pattern in global
            .allow_namespaces
            .iter()
            .chain(&global.deny_namespaces)
        {
            if pattern.is_empty() {
                errors.push("empty namespace pattern".into());
            }
        }
    }
    if let Some(servers) = &policy.servers {
        for server in servers {
            if server.namespace.is_empty() {
                errors.push("server policy entry with empty namespace".into());
            }
            if let Some(cap) = server.max_risk_score
                && cap > 100
            {
                errors.push(format!(
                    "server '{}': maxRiskScore {cap} is outside 0-100",
                    server.namespace
                ));
            }
        }
    }
    PolicyValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Evaluate the Add gate.
#[must_use]
pub fn evaluate_add(ctx: &EvalContext<'_>, policy: Option<&Policy>) -> AddEvaluation {
    let Some(global) = policy.and_then(|p| p.global.as_ref()) else {
        return AddEvaluation {
            allowed: true,
            reasons: Vec::new(),
            requires_approval: false,
        };
    };

    if let Some(reason) = check_common(ctx, global, true) {
        return AddEvaluation {
            allowed: false,
            reasons: vec![reason],
            requires_approval: false,
        };
    }

    let requires_approval = ctx.findings.iter().any(|f| {
        global.require_approval_for.iter().any(|hint| {
            f.category
                .to_ascii_lowercase()
                .contains(&hint.to_ascii_lowercase())
        })
    });

    AddEvaluation {
        allowed: true,
        reasons: Vec::new(),
        requires_approval,
    }
}

/// Evaluate the Scan gate. Scan applies the deny list but not the allow list.
#[must_use]
pub fn evaluate_scan(ctx: &EvalContext<'_>, policy: Option<&Policy>) -> ScanEvaluation {
    let Some(global) = policy.and_then(|p| p.global.as_ref()) else {
        return ScanEvaluation {
            allowed: true,
            reasons: Vec::new(),
        };
    };

    match check_common(ctx, global, false) {
        Some(reason) => ScanEvaluation {
            allowed: false,
            reasons: vec![reason],
        },
        None => ScanEvaluation {
            allowed: true,
            reasons: Vec::new(),
        },
    }
}

/// Rules 1-5 in their fixed order; returns the first blocking reason.
fn check_common(
    ctx: &EvalContext<'_>,
    global: &GlobalPolicy,
    apply_allowlist: bool,
) -> Option<PolicyReason> {
    if let Some(pattern) = global
        .deny_namespaces
        .iter()
        .find(|p| glob_match(p, ctx.namespace))
    {
        return Some(PolicyReason {
            code: ReasonCode::Denylist,
            message: format!("namespace '{}' matches deny pattern '{pattern}'", ctx.namespace),
        });
    }

    if apply_allowlist
        && !global.allow_namespaces.is_empty()
        && !global
            .allow_namespaces
            .iter()
            .any(|p| glob_match(p, ctx.namespace))
    {
        return Some(PolicyReason {
            code: ReasonCode::Allowlist,
            message: format!(
                "namespace '{}' matches no allow pattern",
                ctx.namespace
            ),
        });
    }

    if global.deny_unverified && !ctx.verified {
        return Some(PolicyReason {
            code: ReasonCode::DenyUnverified,
            message: format!("namespace '{}' is not verified", ctx.namespace),
        });
    }

    let cap = global.max_risk_score.unwrap_or(100);
    if ctx.risk_score > cap {
        return Some(PolicyReason {
            code: ReasonCode::MaxRiskScore,
            message: format!("risk score {} exceeds maximum {cap}", ctx.risk_score),
        });
    }

    let triggering: Vec<&Finding> = ctx
        .findings
        .iter()
        .filter(|f| global.block_severities.contains(&f.severity))
        .collect();
    if !triggering.is_empty() {
        let listed: Vec<String> = triggering
            .iter()
            .map(|f| format!("{} ({})", f.rule_id, f.severity))
            .collect();
        return Some(PolicyReason {
            code: ReasonCode::BlockSeverity,
            message: format!("blocked severities present: {}", listed.join(", ")),
        });
    }

    None
}

/// Anchored glob match: `.` is literal, `*` matches any run, `?` one char.
#[must_use]
pub fn glob_match(pattern: &str, value: &str) -> bool {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    regex::Regex::new(&regex).is_ok_and(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, category: &str) -> Finding {
        Finding::new("TEST_RULE", severity, category, "test".into())
    }

    fn ctx<'a>(
        namespace: &'a str,
        verified: bool,
        risk_score: u32,
        findings: &'a [Finding],
    ) -> EvalContext<'a> {
        EvalContext {
            namespace,
            verified,
            risk_score,
            findings,
        }
    }

    fn policy(global: GlobalPolicy) -> Policy {
        Policy {
            version: POLICY_VERSION.into(),
            global: Some(global),
            servers: None,
        }
    }

    #[test]
    fn test_absent_policy_allows() {
        let result = evaluate_add(&ctx("io.github.a/b", false, 100, &[]), None);
        assert!(result.allowed);
        assert!(result.reasons.is_empty());
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_policy_without_global_allows() {
        let p = Policy {
            version: POLICY_VERSION.into(),
            global: None,
            servers: None,
        };
        assert!(evaluate_scan(&ctx("x.y/z", false, 100, &[]), Some(&p)).allowed);
    }

    #[test]
    fn test_denylist_blocks_first() {
        let p = policy(GlobalPolicy {
            deny_namespaces: vec!["io.github.banned.*".into()],
            deny_unverified: true,
            ..GlobalPolicy::default()
        });
        let result = evaluate_add(&ctx("io.github.banned.x/y", false, 0, &[]), Some(&p));
        assert!(!result.allowed);
        assert_eq!(result.reasons.len(), 1);
        assert_eq!(result.reasons[0].code, ReasonCode::Denylist);
    }

    #[test]
    fn test_allowlist_applies_to_add_only() {
        let p = policy(GlobalPolicy {
            allow_namespaces: vec!["io.github.good/*".into()],
            ..GlobalPolicy::default()
        });
        let add = evaluate_add(&ctx("io.github.other/x", true, 0, &[]), Some(&p));
        assert!(!add.allowed);
        assert_eq!(add.reasons[0].code, ReasonCode::Allowlist);

        let scan = evaluate_scan(&ctx("io.github.other/x", true, 0, &[]), Some(&p));
        assert!(scan.allowed);
    }

    #[test]
    fn test_deny_unverified() {
        let p = policy(GlobalPolicy {
            deny_unverified: true,
            ..GlobalPolicy::default()
        });
        let blocked = evaluate_add(&ctx("io.github.a/b", false, 0, &[]), Some(&p));
        assert_eq!(blocked.reasons[0].code, ReasonCode::DenyUnverified);
        assert!(evaluate_add(&ctx("io.github.a/b", true, 0, &[]), Some(&p)).allowed);
    }

    #[test]
    fn test_max_risk_score_reports_numbers() {
        let p = policy(GlobalPolicy {
            max_risk_score: Some(20),
            ..GlobalPolicy::default()
        });
        let result = evaluate_add(&ctx("a.b/c", true, 30, &[]), Some(&p));
        assert!(!result.allowed);
        assert_eq!(result.reasons[0].code, ReasonCode::MaxRiskScore);
        assert!(result.reasons[0].message.contains("30"));
        assert!(result.reasons[0].message.contains("20"));
    }

    #[test]
    fn test_absent_cap_defaults_to_100() {
        let p = policy(GlobalPolicy::default());
        assert!(evaluate_add(&ctx("a.b/c", true, 100, &[]), Some(&p)).allowed);
    }

    #[test]
    fn test_block_severity_enumerates_findings() {
        let findings = vec![
            finding(Severity::Critical, "code"),
            finding(Severity::Low, "code"),
        ];
        let p = policy(GlobalPolicy {
            block_severities: vec![Severity::Critical],
            ..GlobalPolicy::default()
        });
        let result = evaluate_scan(&ctx("a.b/c", true, 0, &findings), Some(&p));
        assert!(!result.allowed);
        assert_eq!(result.reasons[0].code, ReasonCode::BlockSeverity);
        assert!(result.reasons[0].message.contains("TEST_RULE"));
    }

    #[test]
    fn test_require_approval_is_advisory() {
        let findings = vec![finding(Severity::Medium, "Network-Access")];
        let p = policy(GlobalPolicy {
            require_approval_for: vec!["network".into()],
            ..GlobalPolicy::default()
        });
        let result = evaluate_add(&ctx("a.b/c", true, 10, &findings), Some(&p));
        assert!(result.allowed);
        assert!(result.requires_approval);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let findings = vec![finding(Severity::High, "code")];
        let p = policy(GlobalPolicy {
            max_risk_score: Some(50),
            block_severities: vec![Severity::High],
            ..GlobalPolicy::default()
        });
        let c = ctx("a.b/c", true, 40, &findings);
        let first = evaluate_add(&c, Some(&p));
        let second = evaluate_add(&c, Some(&p));
        assert_eq!(first.allowed, second.allowed);
        assert_eq!(first.reasons.len(), second.reasons.len());
        assert_eq!(first.reasons[0].code, second.reasons[0].code);
    }

    #[test]
    fn test_glob_semantics() {
        assert!(glob_match("io.github.foo/*", "io.github.foo/bar"));
        assert!(glob_match("*", "anything/at.all"));
        assert!(glob_match("a.?/c", "a.b/c"));
        assert!(!glob_match("a.?/c", "a.bb/c"));
        // '.' is literal, not any-char
        assert!(!glob_match("a.b/c", "aXb/c"));
        // anchored both ends
        assert!(!glob_match("io.github.foo", "io.github.foo/bar"));
    }

    #[test]
    fn test_validate_catches_bad_version_and_cap() {
        let mut p = policy(GlobalPolicy {
            max_risk_score: Some(150),
            ..GlobalPolicy::default()
        });
        p.version = "2.0".into();
        let v = validate(&p);
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 2);
    }

    #[test]
    fn test_validate_accepts_good_policy() {
        let p = policy(GlobalPolicy {
            allow_namespaces: vec!["io.github.me/*".into()],
            max_risk_score: Some(50),
            block_severities: vec![Severity::Critical, Severity::High],
            ..GlobalPolicy::default()
        });
        assert!(validate(&p).valid);
    }
}
