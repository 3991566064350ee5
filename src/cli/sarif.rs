//! SARIF 2.1.0 report shaping for scan results
//!
//! One rule per encountered ruleId, one result per finding, with a
//! deterministic 16-hex fingerprint per (namespace@version, ruleId,
//! message) triple so downstream viewers can track findings across runs.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::core::types::Severity;
use crate::workflows::report::ScanReport;
use crate::{TOOL_NAME, TOOL_VERSION};

/// SARIF level for a finding severity.
#[must_use]
pub fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

/// Deterministic 16-hex fingerprint for one finding occurrence.
#[must_use]
pub fn fingerprint(namespace: &str, version: &str, rule_id: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"@");
    hasher.update(version.as_bytes());
    hasher.update(b"|");
    hasher.update(rule_id.as_bytes());
    hasher.update(b"|");
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Render a scan report as a SARIF 2.1.0 document.
#[must_use]
pub fn sarif_report(report: &ScanReport) -> Value {
    // One rule per encountered ruleId, keyed for deterministic order.
    let mut rules: BTreeMap<String, Value> = BTreeMap::new();
    for server in &report.servers {
        for finding in &server.findings {
            rules.entry(finding.rule_id.clone()).or_insert_with(|| {
                json!({
                    "id": finding.rule_id.clone(),
                    "shortDescription": { "text": finding.category.clone() },
                    "defaultConfiguration": { "level": sarif_level(finding.severity) },
                })
            });
        }
    }
    let rule_index: BTreeMap<&String, usize> =
        rules.keys().enumerate().map(|(i, id)| (id, i)).collect();

    let mut results = Vec::new();
    for server in &report.servers {
        for finding in &server.findings {
            results.push(json!({
                "ruleId": finding.rule_id.clone(),
                "ruleIndex": rule_index[&finding.rule_id],
                "level": sarif_level(finding.severity),
                "message": { "text": finding.message.clone() },
                "partialFingerprints": {
                    "mcpshield/finding/v1": fingerprint(
                        &server.namespace,
                        &server.version,
                        &finding.rule_id,
                        &finding.message,
                    ),
                },
                "properties": {
                    "namespace": server.namespace.clone(),
                    "severity": finding.severity.as_str(),
                },
            }));
        }
    }

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": TOOL_NAME,
                    "version": TOOL_VERSION,
                    "informationUri": "https://github.com/mcpshield/mcpshield",
                    "rules": rules.into_values().collect::<Vec<_>>(),
                }
            },
            "results": results,
        }]
    })
}
