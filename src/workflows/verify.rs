//! Verify workflow
//!
//! Re-hashes every pinned artifact against the lockfile digests. Prefers
//! the cache; downloads to a temp path otherwise. A successful download
//! that matches heals the cache. Verify never rewrites the lockfile and
//! never runs the scanner.

use uuid::Uuid;

use crate::config::Settings;
use crate::core::digest;
use crate::core::error::{EXIT_FAILURE, EXIT_OK, EXIT_USER_ERROR, Result, ShieldError};
use crate::core::ContentCache;
use crate::lockfile::LockfileStore;
use crate::resolvers::resolver_for;
use crate::workflows::report::{Envelope, VerifyEntry, VerifyReport, VerifyStatus};

/// Options controlling the Verify workflow.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub offline: bool,
    pub show_progress: bool,
}

pub async fn verify(
    options: &VerifyOptions,
    settings: &Settings,
    store: &LockfileStore,
    cache: &ContentCache,
) -> Result<VerifyReport> {
    if !store.exists() {
        return Err(ShieldError::User(format!(
            "no lockfile at {} (run `mcpshield add` first)",
            store.path().display()
        )));
    }
    let lockfile = store.read()?;

    let resolver_config = settings.resolver_config(options.offline, options.show_progress);
    let workspace = tempfile::TempDir::new()?;
    let mut entries: Vec<VerifyEntry> = Vec::new();

    for (namespace, server) in &lockfile.servers {
        for artifact in &server.artifacts {
            let mut entry = VerifyEntry {
                namespace: namespace.clone(),
                url: artifact.url.clone(),
                digest: artifact.digest.clone(),
                status: VerifyStatus::Ok,
                actual_digest: None,
                message: None,
            };

            // Cached bytes that still match are proof enough.
            let cached_ok = cache
                .get(&artifact.digest)
                .and_then(|path| digest::verify(&path, &artifact.digest).ok())
                .is_some_and(|check| check.valid);
            if cached_ok {
                entries.push(entry);
                continue;
            }

            if options.offline {
                entry.status = VerifyStatus::CacheMiss;
                entry.message = Some(format!(
                    "digest {} is not in the cache and offline mode forbids downloads",
                    artifact.digest
                ));
                entries.push(entry);
                continue;
            }

            let Some(resolver) = resolver_for(artifact.kind, &resolver_config) else {
                entry.status = VerifyStatus::Error;
                entry.message = Some(format!("no resolver for {} artifacts", artifact.kind));
                entries.push(entry);
                continue;
            };

            let temp_path = workspace.path().join(format!("{}.tgz", Uuid::new_v4()));
            let remote = crate::core::types::Artifact {
                kind: artifact.kind,
                url: artifact.url.clone(),
                // No declared integrity here: a drifted artifact must
                // download fully so its actual digest can be reported.
                integrity: None,
                size: None,
            };
            match resolver.download(&remote, &temp_path).await {
                Ok(outcome) => {
                    let check = digest::verify(&outcome.path, &artifact.digest)?;
                    if check.valid {
                        cache.put(&artifact.digest, &outcome.path)?;
                    } else {
                        entry.status = VerifyStatus::Drift;
                        entry.actual_digest = Some(check.actual.clone());
                        entry.message = Some(digest::drift_report(
                            namespace,
                            &artifact.digest,
                            &check.actual,
                            &artifact.url,
                        ));
                    }
                }
                Err(err) => {
                    entry.status = VerifyStatus::Error;
                    entry.message = Some(err.to_string());
                }
            }
            entries.push(entry);
        }
    }

    let ok = entries.iter().all(|e| e.status == VerifyStatus::Ok);
    Ok(VerifyReport {
        envelope: Envelope::new("verify"),
        entries,
        ok,
    })
}

/// Exit code for a completed verify: cache misses are user errors, drift
/// and download errors are general failures.
#[must_use]
pub fn exit_code(report: &VerifyReport) -> i32 {
    if report
        .entries
        .iter()
        .any(|e| e.status == VerifyStatus::CacheMiss)
    {
        return EXIT_USER_ERROR;
    }
    if report
        .entries
        .iter()
        .any(|e| matches!(e.status, VerifyStatus::Drift | VerifyStatus::Error))
    {
        return EXIT_FAILURE;
    }
    EXIT_OK
}
