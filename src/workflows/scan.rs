//! Scan workflow
//!
//! Walks every pinned server in the lockfile, re-acquires artifact bytes
//! (cache first, network fallback unless offline), scans them, and applies
//! the scan policy. Artifact-level failures are recorded on the per-server
//! result and never abort the walk.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::config::{Settings, load_policy};
use crate::core::error::{Result, ShieldError};
use crate::core::security::policy::{self as policy_engine, EvalContext, GlobalPolicy, Policy};
use crate::core::security::scanner::Scanner;
use crate::core::security::vulnerability::VulnerabilityClient;
use crate::core::types::{Finding, Package, ScanOutcome, Verdict, sort_findings};
use crate::core::ContentCache;
use crate::lockfile::{LockedArtifact, LockfileEntry, LockfileStore};
use crate::resolvers::resolver_for;
use crate::workflows::report::{
    ArtifactScan, Envelope, PolicySummary, ScanReport, ScanSummary, ServerScan,
};
use crate::workflows::verdict_rank;

/// Error marker recorded when offline scanning misses the cache.
pub const OFFLINE_CACHE_MISS: &str = "OFFLINE_CACHE_MISS";

/// Options controlling the Scan workflow.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Apply policy blocking to the exit code.
    pub enforce: bool,
    /// Never touch the network; rely on the cache exclusively.
    pub offline: bool,
    /// Render download progress bars.
    pub show_progress: bool,
}

/// Conservative default applied when enforcing without a policy file.
fn default_enforcement_policy() -> Policy {
    Policy {
        version: policy_engine::POLICY_VERSION.into(),
        global: Some(GlobalPolicy {
            max_risk_score: Some(50),
            block_severities: vec![crate::core::types::Severity::Critical],
            deny_unverified: false,
            ..GlobalPolicy::default()
        }),
        servers: None,
    }
}

pub async fn scan(
    options: &ScanOptions,
    settings: &Settings,
    store: &LockfileStore,
    policy_path: &std::path::Path,
    cache: &ContentCache,
) -> Result<ScanReport> {
    if !store.exists() {
        return Err(ShieldError::User(format!(
            "no lockfile at {} (run `mcpshield add` first)",
            store.path().display()
        )));
    }
    let lockfile = store.read()?;
    let validation = crate::lockfile::validate(&lockfile);
    if !validation.valid {
        return Err(ShieldError::User(format!(
            "lockfile is invalid: {}",
            validation.errors.join("; ")
        )));
    }

    let mut policy = load_policy(policy_path)?;
    if options.enforce && policy.is_none() {
        tracing::info!("no policy file; enforcing conservative defaults");
        policy = Some(default_enforcement_policy());
    }

    let resolver_config = settings.resolver_config(options.offline, options.show_progress);
    let vuln_client = VulnerabilityClient::new(&settings.osv_url, options.offline);
    let scanner = if options.offline {
        Scanner::new(None)
    } else {
        Scanner::new(Some(&vuln_client))
    };
    let workspace = tempfile::TempDir::new()?;

    let mut servers: Vec<ServerScan> = Vec::new();
    let mut total_artifacts = 0;
    let mut verdict_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut blocked = 0;
    let mut blocked_reasons = Vec::new();

    // BTreeMap iteration gives the lexicographic namespace order the
    // output contract requires.
    for (namespace, entry) in &lockfile.servers {
        let mut findings: Vec<Finding> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut artifact_scans: Vec<ArtifactScan> = Vec::new();
        let mut risk_score: u32 = 0;
        let mut verdict = Verdict::Clean;

        for artifact in &entry.artifacts {
            total_artifacts += 1;
            let outcome = scan_artifact(
                entry,
                artifact,
                options,
                &resolver_config,
                &scanner,
                cache,
                workspace.path(),
            )
            .await;

            match outcome {
                Ok(scan) => {
                    risk_score = risk_score.max(scan.risk_score);
                    if verdict_rank(scan.verdict) > verdict_rank(verdict) {
                        verdict = scan.verdict;
                    }
                    artifact_scans.push(ArtifactScan {
                        url: artifact.url.clone(),
                        digest: artifact.digest.clone(),
                        verdict: scan.verdict,
                        risk_score: scan.risk_score,
                        error: None,
                    });
                    findings.extend(scan.findings);
                }
                Err(err) => {
                    let message = match &err {
                        ShieldError::Offline(_) => {
                            format!("{OFFLINE_CACHE_MISS}: {} is not cached", artifact.digest)
                        }
                        other => other.to_string(),
                    };
                    errors.push(message.clone());
                    if verdict_rank(Verdict::Unknown) > verdict_rank(verdict) {
                        verdict = Verdict::Unknown;
                    }
                    artifact_scans.push(ArtifactScan {
                        url: artifact.url.clone(),
                        digest: artifact.digest.clone(),
                        verdict: Verdict::Unknown,
                        risk_score: 0,
                        error: Some(message),
                    });
                }
            }
        }
        sort_findings(&mut findings);

        let evaluation = policy_engine::evaluate_scan(
            &EvalContext {
                namespace,
                verified: entry.verified,
                risk_score,
                findings: &findings,
            },
            policy.as_ref(),
        );
        if !evaluation.allowed {
            blocked += 1;
            blocked_reasons.extend(evaluation.reasons.clone());
        }

        *verdict_counts.entry(verdict.to_string()).or_insert(0) += 1;
        servers.push(ServerScan {
            namespace: namespace.clone(),
            version: entry.version.clone(),
            verdict,
            risk_score,
            findings,
            artifacts: artifact_scans,
            errors,
            policy_blocked: !evaluation.allowed,
            policy_reasons: evaluation.reasons,
        });
    }

    Ok(ScanReport {
        envelope: Envelope::new("scan"),
        summary: ScanSummary {
            servers: servers.len(),
            artifacts: total_artifacts,
            verdicts: verdict_counts,
            policy: PolicySummary {
                enforced: options.enforce,
                blocked,
                reasons: blocked_reasons,
            },
        },
        servers,
    })
}

/// Acquire and scan one pinned artifact.
async fn scan_artifact(
    entry: &LockfileEntry,
    artifact: &LockedArtifact,
    options: &ScanOptions,
    resolver_config: &crate::resolvers::ResolverConfig,
    scanner: &Scanner<'_>,
    cache: &ContentCache,
    workspace: &std::path::Path,
) -> Result<ScanOutcome> {
    let bytes = if let Some(path) = cache.get(&artifact.digest) {
        std::fs::read(path)?
    } else if options.offline {
        return Err(ShieldError::Offline(format!(
            "digest {} is not in the cache",
            artifact.digest
        )));
    } else {
        let Some(resolver) = resolver_for(artifact.kind, resolver_config) else {
            return Ok(ScanOutcome::unknown(artifact.kind));
        };
        let temp_path = workspace.join(format!("{}.tgz", Uuid::new_v4()));
        let remote = crate::core::types::Artifact {
            kind: artifact.kind,
            url: artifact.url.clone(),
            // Pinned digest doubles as the integrity expectation.
            integrity: Some(artifact.digest.clone()),
            size: artifact.size,
        };
        let outcome = resolver.download(&remote, &temp_path).await?;
        let cached = cache.put(&outcome.digest, &outcome.path)?;
        std::fs::read(cached)?
    };

    let package = Package {
        kind: artifact.kind,
        identifier: derive_identifier(entry, artifact),
        version: entry.version.clone(),
        declared_digest: None,
    };
    scanner.scan(&package, &bytes).await
}

/// Recover the registry package name for a pinned artifact. npm tarball
/// URLs embed it as `/<name>/-/<file>.tgz`; otherwise fall back to the
/// namespace's package label.
fn derive_identifier(entry: &LockfileEntry, artifact: &LockedArtifact) -> String {
    if let Some(idx) = artifact.url.find("/-/") {
        let head = &artifact.url[..idx];
        if let Some(name_start) = head.rfind('/') {
            let name = &head[name_start + 1..];
            let decoded = name.replace("%2f", "/").replace("%2F", "/").replace("%40", "@");
            if !decoded.is_empty() {
                return decoded;
            }
        }
    }
    entry
        .namespace
        .rsplit('/')
        .next()
        .unwrap_or(&entry.namespace)
        .to_string()
}

/// Exit code for a completed scan, per the workflow contract: offline cache
/// misses are user errors, enforcement blocks and artifact errors are
/// general failures.
#[must_use]
pub fn exit_code(report: &ScanReport) -> i32 {
    let any_offline_miss = report
        .servers
        .iter()
        .flat_map(|s| &s.errors)
        .any(|e| e.starts_with(OFFLINE_CACHE_MISS));
    if any_offline_miss {
        return crate::core::error::EXIT_USER_ERROR;
    }
    if report.summary.policy.enforced && report.summary.policy.blocked > 0 {
        return crate::core::error::EXIT_FAILURE;
    }
    if report.servers.iter().any(|s| !s.errors.is_empty()) {
        return crate::core::error::EXIT_FAILURE;
    }
    crate::core::error::EXIT_OK
}
