//! PyPI artifact resolver
//!
//! Metadata comes from the JSON API; artifact selection prefers the source
//! distribution, then a wheel, then whatever is first. PyPI publishes hex
//! sha256 digests, normalized here to the canonical base64 form.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::core::digest::Algorithm;
use crate::core::error::{Result, ShieldError};
use crate::core::http::{ensure_online, shared_client};
use crate::core::types::{Artifact, Package, PackageKind};
use crate::registry::encode_segment;
use crate::resolvers::download::fetch_to_file;
use crate::resolvers::traits::Resolver;
use crate::resolvers::types::{DownloadOutcome, ResolverConfig};

pub struct PypiResolver {
    config: ResolverConfig,
}

impl PypiResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }
}

/// Pick the preferred artifact entry from a PyPI `urls` array.
fn select_artifact(urls: &[Value]) -> Option<&Value> {
    let by_type = |wanted: &str| {
        urls.iter()
            .find(|u| u.get("packagetype").and_then(Value::as_str) == Some(wanted))
    };
    by_type("sdist")
        .or_else(|| by_type("bdist_wheel"))
        .or_else(|| urls.first())
}

/// PyPI digests are hex; the canonical digest form is base64.
fn hex_to_canonical(hex_digest: &str) -> Option<String> {
    let raw = hex::decode(hex_digest).ok()?;
    Some(format!("sha256-{}", BASE64.encode(raw)))
}

#[async_trait]
impl Resolver for PypiResolver {
    fn kind(&self) -> PackageKind {
        PackageKind::Pypi
    }

    async fn resolve(&self, package: &Package) -> Result<Artifact> {
        ensure_online(self.config.offline, "pypi metadata fetch")?;

        let url = format!(
            "{}/pypi/{}/{}/json",
            self.config.pypi_registry_url.trim_end_matches('/'),
            encode_segment(&package.identifier),
            encode_segment(&package.version)
        );
        tracing::debug!(url = %url, "fetching pypi metadata");
        let response = shared_client().get(&url).send().await?;
        if response.status().as_u16() == 404 {
            return Err(ShieldError::NotFound(format!(
                "pypi package '{}' version '{}'",
                package.identifier, package.version
            )));
        }
        let metadata: Value = response.error_for_status()?.json().await?;

        let urls = metadata
            .get("urls")
            .and_then(Value::as_array)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ShieldError::NotFound(format!(
                    "pypi package '{}' version '{}' has no artifacts",
                    package.identifier, package.version
                ))
            })?;
        let entry = select_artifact(urls).ok_or_else(|| {
            ShieldError::Unexpected("pypi artifact selection failed on non-empty urls".into())
        })?;

        let artifact_url = entry
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ShieldError::Unexpected("pypi artifact entry has no url".into()))?
            .to_string();
        let integrity = entry
            .get("digests")
            .and_then(|d| d.get("sha256"))
            .and_then(Value::as_str)
            .and_then(hex_to_canonical);
        let size = entry.get("size").and_then(Value::as_u64);

        if let Some(declared) = size
            && declared > self.config.max_artifact_bytes
        {
            return Err(ShieldError::SizeLimit {
                actual: declared,
                limit: self.config.max_artifact_bytes,
            });
        }

        Ok(Artifact {
            kind: PackageKind::Pypi,
            url: artifact_url,
            integrity,
            size,
        })
    }

    async fn download(&self, artifact: &Artifact, dest: &Path) -> Result<DownloadOutcome> {
        ensure_online(self.config.offline, "pypi artifact download")?;

        if let Some(declared) = artifact.size
            && declared > self.config.max_artifact_bytes
        {
            return Err(ShieldError::SizeLimit {
                actual: declared,
                limit: self.config.max_artifact_bytes,
            });
        }

        let outcome = fetch_to_file(
            &artifact.url,
            dest,
            Algorithm::Sha256,
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
