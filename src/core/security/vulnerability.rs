//! Vulnerability advisory client
//!
//! Batched version-range queries against an OSV-shaped advisory service.
//! The service's own "affected" judgement is not trusted: each advisory's
//! ranges are re-walked against the queried version, and unparseable
//! versions conservatively count as affected.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::http::{ensure_online, shared_client};
use crate::core::types::{DependencyStats, Severity};

/// Default advisory service endpoint.
pub const DEFAULT_OSV_URL: &str = "https://api.osv.dev";

/// One dependency to look up.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyQuery {
    pub package: String,
    pub ecosystem: String,
    pub version: String,
}

/// An advisory as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub affected: Vec<AffectedEntry>,
    #[serde(default)]
    pub severity: Vec<SeverityEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_specific: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedEntry {
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub ranges: Vec<VersionRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRange {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub events: Vec<RangeEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub score: String,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    queries: Vec<BatchQuery<'a>>,
}

#[derive(Serialize)]
struct BatchQuery<'a> {
    package: BatchPackage<'a>,
    version: &'a str,
}

#[derive(Serialize)]
struct BatchPackage<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchResult>,
}

#[derive(Deserialize, Default)]
struct BatchResult {
    #[serde(default)]
    vulns: Vec<Advisory>,
}

/// Advisory service client.
#[derive(Debug, Clone)]
pub struct VulnerabilityClient {
    base_url: String,
    offline: bool,
}

impl VulnerabilityClient {
    #[must_use]
    pub fn new(base_url: &str, offline: bool) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            offline,
        }
    }

    /// Query advisories for a batch of dependencies. The returned vector
    /// preserves the input ordering: `result[i]` belongs to `queries[i]`.
    pub async fn batch_query(&self, queries: &[DependencyQuery]) -> Result<Vec<Vec<Advisory>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        ensure_online(self.offline, "vulnerability lookup")?;

        let request = BatchRequest {
            queries: queries
                .iter()
                .map(|q| BatchQuery {
                    package: BatchPackage {
                        name: &q.package,
                        ecosystem: &q.ecosystem,
                    },
                    version: &q.version,
                })
                .collect(),
        };

        let url = format!("{}/v1/querybatch", self.base_url);
        let response: BatchResponse = shared_client()
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut results: Vec<Vec<Advisory>> =
            response.results.into_iter().map(|r| r.vulns).collect();
        // A short response still maps positionally; pad the tail.
        results.resize_with(queries.len(), Vec::new);
        Ok(results)
    }

    /// Fetch the full advisory record for one id.
    pub async fn get_details(&self, id: &str) -> Result<Advisory> {
        ensure_online(self.offline, "advisory lookup")?;
        let url = format!("{}/v1/vulns/{id}", self.base_url);
        let advisory = shared_client()
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(advisory)
    }
}

/// Re-derive whether `version` is affected by `advisory`.
///
/// Explicit version lists win; otherwise each SEMVER/ECOSYSTEM range's event
/// list is walked keeping the most recent `introduced` and `fixed`, and the
/// version is affected iff `introduced <= v < fixed` (no `fixed` means still
/// open). An unparseable version conservatively counts as affected.
#[must_use]
pub fn affects_version(advisory: &Advisory, version: &str) -> bool {
    let Some(parsed) = parse_lenient(version) else {
        return !advisory.affected.is_empty();
    };

    for entry in &advisory.affected {
        if !entry.versions.is_empty() {
            if entry.versions.iter().any(|v| v == version) {
                return true;
            }
            continue;
        }
        for range in &entry.ranges {
            if !matches!(range.kind.as_str(), "SEMVER" | "ECOSYSTEM") {
                continue;
            }
            let mut introduced: Option<semver::Version> = None;
            let mut fixed: Option<semver::Version> = None;
            for event in &range.events {
                if let Some(v) = event.introduced.as_deref() {
                    introduced = if v == "0" {
                        Some(semver::Version::new(0, 0, 0))
                    } else {
                        parse_lenient(v)
                    };
                    fixed = None;
                }
                if let Some(v) = event.fixed.as_deref() {
                    fixed = parse_lenient(v);
                }
            }
            let lower_ok = introduced.as_ref().is_none_or(|i| parsed >= *i);
            let upper_ok = fixed.as_ref().is_none_or(|f| parsed < *f);
            if lower_ok && upper_ok {
                return true;
            }
        }
    }
    false
}

/// Classify an advisory's severity.
///
/// CVSS v3 first: the numeric score is the final `/N.N` segment of the
/// vector string (≥9 critical, ≥7 high, ≥4 medium, else low). Falls back to
/// a database-specific severity name, then medium.
#[must_use]
pub fn classify_severity(advisory: &Advisory) -> Severity {
    for entry in &advisory.severity {
        if !entry.kind.starts_with("CVSS_V3") {
            continue;
        }
        if let Some(score) = entry
            .score
            .rsplit('/')
            .next()
            .and_then(|s| s.parse::<f32>().ok())
        {
            return if score >= 9.0 {
                Severity::Critical
            } else if score >= 7.0 {
                Severity::High
            } else if score >= 4.0 {
                Severity::Medium
            } else {
                Severity::Low
            };
        }
    }

    if let Some(name) = advisory
        .database_specific
        .as_ref()
        .and_then(|d| d.get("severity"))
        .and_then(|s| s.as_str())
        .and_then(Severity::parse)
    {
        return name;
    }

    Severity::Medium
}

/// Aggregate matched advisories into dependency stats. Advisories are
/// deduplicated by id across all queries; ids come out sorted.
#[must_use]
pub fn aggregate(total_deps: usize, hits: &[&Advisory]) -> DependencyStats {
    let mut stats = DependencyStats {
        total: total_deps,
        ..DependencyStats::default()
    };
    let mut seen = std::collections::BTreeSet::new();
    for advisory in hits {
        if !seen.insert(advisory.id.clone()) {
            continue;
        }
        match classify_severity(advisory) {
            Severity::Critical => stats.critical += 1,
            Severity::High => stats.high += 1,
            Severity::Medium | Severity::Info => stats.medium += 1,
            Severity::Low => stats.low += 1,
        }
    }
    stats.vulnerable = seen.len();
    stats.advisories = seen.into_iter().collect();
    stats
}

/// Lenient semver parse: strips a leading `v`, pads missing components.
#[must_use]
pub fn parse_lenient(version: &str) -> Option<semver::Version> {
    let trimmed = version.trim().trim_start_matches('v');
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }
    // "1" or "1.2" style: pad with zeros and retry, keeping any
    // pre-release/build suffix exactly as written.
    let (core, suffix) = match trimmed.find(['-', '+']) {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    };
    let numbers: Vec<&str> = core.split('.').collect();
    if numbers.is_empty() || numbers.len() > 2 {
        return None;
    }
    let mut padded = numbers.join(".");
    for _ in numbers.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    semver::Version::parse(&padded).ok()
}
