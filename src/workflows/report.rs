//! Workflow report objects
//!
//! Every workflow returns a structured report carrying the tool envelope
//! `{tool, toolVersion, command, generatedAt}`. The CLI shell renders these
//! as text or JSON; nothing here touches the terminal.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::security::policy::PolicyReason;
use crate::core::types::{DependencyStats, Finding, Verdict};
use crate::lockfile::LockedArtifact;
use crate::{TOOL_NAME, TOOL_VERSION};

/// Common report envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub tool: String,
    pub tool_version: String,
    pub command: String,
    pub generated_at: String,
}

impl Envelope {
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            tool: TOOL_NAME.into(),
            tool_version: TOOL_VERSION.into(),
            command: command.into(),
            generated_at: jiff::Timestamp::now().to_string(),
        }
    }
}

/// Result of an Add workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub namespace: String,
    pub version: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_owner: Option<String>,
    pub verdict: Verdict,
    pub risk_score: u32,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_stats: Option<DependencyStats>,
    pub artifacts: Vec<LockedArtifact>,
    /// Package kinds present in the record but skipped by the pipeline.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped_kinds: Vec<String>,
    pub requires_approval: bool,
    pub policy_overridden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
}

/// Per-artifact detail inside a scan result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactScan {
    pub url: String,
    pub digest: String,
    pub verdict: Verdict,
    pub risk_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-server scan result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerScan {
    pub namespace: String,
    pub version: String,
    pub verdict: Verdict,
    pub risk_score: u32,
    pub findings: Vec<Finding>,
    pub artifacts: Vec<ArtifactScan>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
    pub policy_blocked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub policy_reasons: Vec<PolicyReason>,
}

/// Policy portion of the scan summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub enforced: bool,
    pub blocked: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub reasons: Vec<PolicyReason>,
}

/// Scan totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub servers: usize,
    pub artifacts: usize,
    pub verdicts: BTreeMap<String, usize>,
    pub policy: PolicySummary,
}

/// Result of a Scan workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub servers: Vec<ServerScan>,
    pub summary: ScanSummary,
}

/// Status of one artifact during Verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Ok,
    Drift,
    CacheMiss,
    Error,
}

/// Per-artifact verify result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEntry {
    pub namespace: String,
    pub url: String,
    pub digest: String,
    pub status: VerifyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of a Verify workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub entries: Vec<VerifyEntry>,
    pub ok: bool,
}

/// One validated document inside a Validate report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentValidation {
    pub present: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

/// Result of the Validate workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub lockfile: DocumentValidation,
    pub policy: DocumentValidation,
}

/// One doctor check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorCheck {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

/// Result of the Doctor workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorReport {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub checks: Vec<DoctorCheck>,
    pub ok: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_carries_tool_identity() {
        let envelope = Envelope::new("scan");
        assert_eq!(envelope.tool, "mcpshield");
        assert_eq!(envelope.command, "scan");
        assert!(!envelope.tool_version.is_empty());
        assert!(envelope.generated_at.contains('T'));
    }

    #[test]
    fn test_report_keys_serialize_sorted() {
        // serde_json's default map is ordered; converting through Value
        // yields lexicographically sorted keys for snapshot stability.
        let report = VerifyReport {
            envelope: Envelope::new("verify"),
            entries: Vec::new(),
            ok: true,
        };
        let value = serde_json::to_value(&report).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
