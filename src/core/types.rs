//! Shared types for the scan pipeline
//!
//! Wire-facing shapes serialize in camelCase so the lockfile and JSON
//! reports stay stable across consumers.

use serde::{Deserialize, Serialize};

/// Closed set of package registries a server artifact can come from.
///
/// Registry records carry loosely-typed `registry_type` strings; anything
/// that does not classify onto this enum is dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Npm,
    Pypi,
    Oci,
    Nuget,
    Mcpb,
}

impl PackageKind {
    /// Classify a loose registry-type string onto the closed enum.
    #[must_use]
    pub fn classify(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "npm" => Some(Self::Npm),
            "pypi" | "pip" => Some(Self::Pypi),
            "oci" | "docker" => Some(Self::Oci),
            "nuget" => Some(Self::Nuget),
            "mcpb" => Some(Self::Mcpb),
            _ => None,
        }
    }

    /// True when the full resolve/download/scan pipeline supports this kind.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Npm | Self::Pypi)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Oci => "oci",
            Self::Nuget => "nuget",
            Self::Mcpb => "mcpb",
        }
    }
}

impl std::fmt::Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloadable package declared by a server record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub kind: PackageKind,
    /// Registry identifier, e.g. `@scope/name` for npm.
    pub identifier: String,
    pub version: String,
    /// Digest declared by the registry record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_digest: Option<String>,
}

/// Verification metadata claim carried by a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryClaim {
    Official,
    Verified,
}

/// A server record from the MCP registry, normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    /// Reverse-DNS namespace, e.g. `io.github.owner/name`.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub packages: Vec<Package>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<RegistryClaim>,
}

/// A resolved, downloadable artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub kind: PackageKind,
    pub url: String,
    /// Algorithm-prefixed base64 digest declared upstream, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Severity of a finding. Ordering is by rank: critical sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
    Info = 4,
}

impl Severity {
    /// Risk weight contributed by one code-pattern hit of this severity.
    #[must_use]
    pub fn pattern_weight(self) -> u32 {
        match self {
            Self::Critical => 25,
            Self::High => 15,
            Self::Medium => 8,
            Self::Low => 3,
            Self::Info => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    /// Parse a policy-file severity name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall classification of one scanned artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Clean,
    Warning,
    Suspicious,
    Malicious,
    Unknown,
}

impl Verdict {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Warning => "warning",
            Self::Suspicious => "suspicious",
            Self::Malicious => "malicious",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issue emitted by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Finding {
    #[must_use]
    pub fn new(rule_id: &str, severity: Severity, category: &str, message: String) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            category: category.to_string(),
            message,
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Deterministic ordering for findings: (severity rank, ruleId, message).
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.message.cmp(&b.message))
    });
}

/// Aggregate counts of vulnerable direct dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyStats {
    pub total: usize,
    pub vulnerable: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub advisories: Vec<String>,
}

/// Result of scanning one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub verdict: Verdict,
    /// Severity-weighted score in [0, 100].
    pub risk_score: u32,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_stats: Option<DependencyStats>,
}

impl ScanOutcome {
    /// Verdict for a package kind the scanner does not implement.
    #[must_use]
    pub fn unknown(kind: PackageKind) -> Self {
        Self {
            verdict: Verdict::Unknown,
            risk_score: 0,
            findings: vec![Finding::new(
                "SCAN_NOT_IMPLEMENTED",
                Severity::Info,
                "coverage",
                format!("scanning is not implemented for {kind} packages"),
            )],
            dependency_stats: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(PackageKind::classify("npm"), Some(PackageKind::Npm));
        assert_eq!(PackageKind::classify(" NPM "), Some(PackageKind::Npm));
        assert_eq!(PackageKind::classify("pip"), Some(PackageKind::Pypi));
        assert_eq!(PackageKind::classify("docker"), Some(PackageKind::Oci));
        assert_eq!(PackageKind::classify("mcpb"), Some(PackageKind::Mcpb));
        assert_eq!(PackageKind::classify("homebrew"), None);
        assert_eq!(PackageKind::classify(""), None);
    }

    #[test]
    fn test_severity_ordering_is_rank_based() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Low < Severity::Info);
    }

    #[test]
    fn test_sort_findings_is_deterministic() {
        let mut findings = vec![
            Finding::new("B_RULE", Severity::High, "code", "b".into()),
            Finding::new("A_RULE", Severity::High, "code", "z".into()),
            Finding::new("Z_RULE", Severity::Critical, "code", "a".into()),
            Finding::new("A_RULE", Severity::High, "code", "a".into()),
        ];
        sort_findings(&mut findings);
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, ["Z_RULE", "A_RULE", "A_RULE", "B_RULE"]);
        assert_eq!(findings[1].message, "a");
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("nope"), None);
    }

    #[test]
    fn test_unknown_outcome_shape() {
        let outcome = ScanOutcome::unknown(PackageKind::Oci);
        assert_eq!(outcome.verdict, Verdict::Unknown);
        assert_eq!(outcome.risk_score, 0);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].severity, Severity::Info);
    }
}
