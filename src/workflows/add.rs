//! Add workflow
//!
//! namespace → verify identity → resolve and download every supported
//! package → cache → scan → policy gate → lockfile entry. Temp files live
//! in a per-run workspace that is deleted on every exit path.

use dialoguer::Confirm;
use uuid::Uuid;

use crate::config::{Settings, load_policy};
use crate::core::error::{Result, ShieldError};
use crate::core::security::policy::{self as policy_engine, EvalContext};
use crate::core::security::scanner::Scanner;
use crate::core::security::vulnerability::VulnerabilityClient;
use crate::core::security::identity;
use crate::core::types::{DependencyStats, Finding, Verdict, sort_findings};
use crate::core::{ContentCache, paths};
use crate::lockfile::{LockedArtifact, LockfileEntry, LockfileStore};
use crate::registry::RegistryClient;
use crate::resolvers::resolver_for;
use crate::workflows::report::{AddReport, Envelope};
use crate::workflows::verdict_rank;

/// Options controlling the Add workflow.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Prompt for policy overrides and final confirmation.
    pub interactive: bool,
    /// Skip the final confirmation prompt.
    pub approve_all: bool,
    /// Render download progress bars.
    pub show_progress: bool,
}

pub async fn add(
    namespace: &str,
    options: &AddOptions,
    settings: &Settings,
    store: &LockfileStore,
    policy_path: &std::path::Path,
    cache: &ContentCache,
) -> Result<AddReport> {
    if !identity::is_valid_format(namespace) {
        return Err(ShieldError::User(format!(
            "'{namespace}' is not a valid namespace (expected reverse-DNS form like io.github.owner/name)"
        )));
    }

    let registry = RegistryClient::new(&settings.registry_url, false);
    let record = registry.fetch_server(namespace).await?;

    let verification = identity::verify(namespace, &record);
    tracing::info!(
        namespace,
        verified = verification.verified,
        method = verification.method.as_deref().unwrap_or("-"),
        "identity verification complete"
    );

    let resolver_config = settings.resolver_config(false, options.show_progress);
    let vuln_client = VulnerabilityClient::new(&settings.osv_url, false);
    let scanner = Scanner::new(Some(&vuln_client));

    let workspace = tempfile::TempDir::new()?;
    let mut findings: Vec<Finding> = Vec::new();
    let mut risk_score: u32 = 0;
    let mut verdict = Verdict::Clean;
    let mut artifacts: Vec<LockedArtifact> = Vec::new();
    let mut skipped_kinds: Vec<String> = Vec::new();
    let mut dependency_stats: Option<DependencyStats> = None;

    for package in &record.packages {
        let Some(resolver) = resolver_for(package.kind, &resolver_config) else {
            skipped_kinds.push(package.kind.to_string());
            continue;
        };

        let artifact = resolver.resolve(package).await?;
        let temp_path = workspace.path().join(format!("{}.tgz", Uuid::new_v4()));
        let outcome = resolver.download(&artifact, &temp_path).await?;
        let cached_path = cache.put(&outcome.digest, &outcome.path)?;
        let bytes = std::fs::read(&cached_path)?;

        let scan = scanner.scan(package, &bytes).await?;
        // Server-level risk is the worst package, not the sum.
        risk_score = risk_score.max(scan.risk_score);
        if verdict_rank(scan.verdict) > verdict_rank(verdict) {
            verdict = scan.verdict;
        }
        findings.extend(scan.findings);
        if let Some(stats) = scan.dependency_stats {
            let merged = dependency_stats.get_or_insert_with(DependencyStats::default);
            merged.total += stats.total;
            merged.vulnerable += stats.vulnerable;
            merged.critical += stats.critical;
            merged.high += stats.high;
            merged.medium += stats.medium;
            merged.low += stats.low;
            merged.advisories.extend(stats.advisories);
            merged.advisories.sort();
            merged.advisories.dedup();
        }

        artifacts.push(LockedArtifact {
            kind: package.kind,
            url: artifact.url,
            digest: outcome.digest,
            size: Some(outcome.bytes_written),
        });
    }
    sort_findings(&mut findings);

    let policy = load_policy(policy_path)?;
    let evaluation = policy_engine::evaluate_add(
        &EvalContext {
            namespace,
            verified: verification.verified,
            risk_score,
            findings: &findings,
        },
        policy.as_ref(),
    );

    let mut policy_overridden = false;
    if !evaluation.allowed {
        let reasons: Vec<String> = evaluation
            .reasons
            .iter()
            .map(|r| format!("[{}] {}", r.code.as_str(), r.message))
            .collect();
        if options.interactive {
            let override_it = Confirm::new()
                .with_prompt(format!(
                    "Policy blocks this add:\n  {}\nOverride and pin anyway?",
                    reasons.join("\n  ")
                ))
                .default(false)
                .interact()
                .map_err(|e| ShieldError::Unexpected(format!("prompt failed: {e}")))?;
            if !override_it {
                return Err(ShieldError::User("add aborted: blocked by policy".into()));
            }
            policy_overridden = true;
        } else {
            let first = &evaluation.reasons[0];
            return Err(ShieldError::PolicyViolation {
                code: first.code.as_str().to_string(),
                reason: reasons.join("; "),
            });
        }
    }

    if evaluation.requires_approval {
        tracing::warn!(
            namespace,
            "policy marks this server's findings as requiring approval"
        );
    }

    if options.interactive && !options.approve_all {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Pin {namespace}@{} ({} artifact(s), verdict {verdict})?",
                record.version,
                artifacts.len()
            ))
            .default(true)
            .interact()
            .map_err(|e| ShieldError::Unexpected(format!("prompt failed: {e}")))?;
        if !confirmed {
            return Err(ShieldError::User("add aborted".into()));
        }
    }

    let now = jiff::Timestamp::now().to_string();
    let approved_by = policy_overridden.then(paths::approver_identity);
    let entry = LockfileEntry {
        namespace: namespace.to_string(),
        version: record.version.clone(),
        repository: record.repository.clone(),
        verified: verification.verified,
        verification_method: verification.method.clone(),
        verified_owner: verification.owner.clone(),
        fetched_at: now.clone(),
        artifacts: artifacts.clone(),
        approved_at: policy_overridden.then(|| now.clone()),
        approved_by: approved_by.clone(),
    };
    store.add_server(entry)?;
    tracing::info!(namespace, version = %record.version, "pinned to lockfile");

    Ok(AddReport {
        envelope: Envelope::new("add"),
        namespace: namespace.to_string(),
        version: record.version,
        verified: verification.verified,
        verification_method: verification.method,
        verified_owner: verification.owner,
        verdict,
        risk_score,
        findings,
        dependency_stats,
        artifacts,
        skipped_kinds,
        requires_approval: evaluation.requires_approval,
        policy_overridden,
        approved_by,
    })
}
