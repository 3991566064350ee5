//! npm artifact resolver
//!
//! Translates an npm package declaration into its registry tarball:
//! metadata fetch, dist-tag follow, declared-size pre-check, then a
//! streaming capped download verified against the declared integrity.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::digest::Algorithm;
use crate::core::error::{Result, ShieldError};
use crate::core::http::{ensure_online, shared_client};
use crate::core::types::{Artifact, Package, PackageKind};
use crate::registry::encode_segment;
use crate::resolvers::download::fetch_to_file;
use crate::resolvers::traits::Resolver;
use crate::resolvers::types::{DownloadOutcome, ResolverConfig};

pub struct NpmResolver {
    config: ResolverConfig,
}

impl NpmResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }
}

/// Split an npm identifier on its last `@`. A leading `@` introduces a
/// scope, not a version: `@scope/name@1.0.0` → (`@scope/name`, `1.0.0`),
/// `@scope/name` → (`@scope/name`, None).
#[must_use]
pub fn split_identifier(identifier: &str) -> (&str, Option<&str>) {
    match identifier.rfind('@') {
        Some(0) | None => (identifier, None),
        Some(idx) => (&identifier[..idx], Some(&identifier[idx + 1..])),
    }
}

#[async_trait]
impl Resolver for NpmResolver {
    fn kind(&self) -> PackageKind {
        PackageKind::Npm
    }

    async fn resolve(&self, package: &Package) -> Result<Artifact> {
        ensure_online(self.config.offline, "npm metadata fetch")?;

        let (name, embedded_version) = split_identifier(&package.identifier);
        let requested = embedded_version.unwrap_or(&package.version);

        let url = format!(
            "{}/{}",
            self.config.npm_registry_url.trim_end_matches('/'),
            encode_segment(name)
        );
        tracing::debug!(url = %url, "fetching npm metadata");
        let response = shared_client().get(&url).send().await?;
        if response.status().as_u16() == 404 {
            return Err(ShieldError::NotFound(format!("npm package '{name}'")));
        }
        let metadata: Value = response.error_for_status()?.json().await?;

        let versions = metadata
            .get("versions")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ShieldError::Unexpected(format!("npm metadata for '{name}' has no versions map"))
            })?;

        // A missing version may be a dist-tag (latest, next, ...).
        let version = if versions.contains_key(requested) {
            requested.to_string()
        } else {
            metadata
                .get("dist-tags")
                .and_then(|tags| tags.get(requested))
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| {
                    ShieldError::NotFound(format!("npm package '{name}' version '{requested}'"))
                })?
        };

        let resolved = versions.get(&version).ok_or_else(|| {
            ShieldError::NotFound(format!("npm package '{name}' version '{version}'"))
        })?;
        let dist = resolved
            .get("dist")
            .ok_or_else(|| ShieldError::Unexpected(format!("npm '{name}@{version}' has no dist")))?;
        let tarball = dist
            .get("tarball")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ShieldError::Unexpected(format!("npm '{name}@{version}' has no tarball URL"))
            })?
            .to_string();
        let integrity = dist
            .get("integrity")
            .and_then(Value::as_str)
            .map(String::from);
        let size = dist.get("size").and_then(Value::as_u64);

        // Over-cap artifacts are rejected before any artifact bytes move.
        if let Some(declared) = size
            && declared > self.config.max_artifact_bytes
        {
            return Err(ShieldError::SizeLimit {
                actual: declared,
                limit: self.config.max_artifact_bytes,
            });
        }

        Ok(Artifact {
            kind: PackageKind::Npm,
            url: tarball,
            integrity,
            size,
        })
    }

    async fn download(&self, artifact: &Artifact, dest: &Path) -> Result<DownloadOutcome> {
        ensure_online(self.config.offline, "npm tarball download")?;

        if let Some(declared) = artifact.size
            && declared > self.config.max_artifact_bytes
        {
            return Err(ShieldError::SizeLimit {
                actual: declared,
                limit: self.config.max_artifact_bytes,
            });
        }

        // sha512 is the npm default when the integrity prefix is absent.
        let algo = artifact
            .integrity
            .as_deref()
            .and_then(|i| Algorithm::from_prefix(i).ok())
            .unwrap_or(Algorithm::Sha512);

        let outcome = fetch_to_file(
            &artifact.url,
            dest,
            algo,
            self.config.max_artifact_bytes,
            self.config.max_redirects,
            self.config.show_progress,
        )
        .await?;

        if let Some(expected) = artifact.integrity.as_deref()
            && outcome.digest != expected
        {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(ShieldError::Integrity {
                subject: artifact.url.clone(),
                expected: expected.to_string(),
                actual: outcome.digest,
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_identifier_plain() {
        assert_eq!(split_identifier("express"), ("express", None));
        assert_eq!(split_identifier("express@4.18.2"), ("express", Some("4.18.2")));
    }

    #[test]
    fn test_split_identifier_scoped() {
        assert_eq!(split_identifier("@scope/name"), ("@scope/name", None));
        assert_eq!(
            split_identifier("@scope/name@1.0.0"),
            ("@scope/name", Some("1.0.0"))
        );
    }

    #[test]
    fn test_leading_at_is_not_a_separator() {
        assert_eq!(split_identifier("@lone"), ("@lone", None));
    }

    #[test]
    fn test_offline_refuses_resolve() {
        let resolver = NpmResolver::new(ResolverConfig {
            offline: true,
            ..ResolverConfig::default()
        });
        let package = Package {
            kind: PackageKind::Npm,
            identifier: "express".into(),
            version: "4.18.2".into(),
            declared_digest: None,
        };
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = rt.block_on(resolver.resolve(&package)).unwrap_err();
        assert!(matches!(err, ShieldError::Offline(_)));
    }

    #[test]
    fn test_oversize_artifact_rejected_before_download() {
        let resolver = NpmResolver::new(ResolverConfig {
            max_artifact_bytes: 1024,
            ..ResolverConfig::default()
        });
        let artifact = Artifact {
            kind: PackageKind::Npm,
            url: "https://registry.example/x.tgz".into(),
            integrity: None,
            size: Some(4096),
        };
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = rt
            .block_on(resolver.download(&artifact, Path::new("/tmp/never-created.tgz")))
            .unwrap_err();
        assert!(matches!(err, ShieldError::SizeLimit { actual: 4096, limit: 1024 }));
    }
}
