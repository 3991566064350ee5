//! Resolver trait
//!
//! One implementation per package kind. The orchestrator dispatches on the
//! kind recorded in the server record; kinds without a resolver are skipped
//! at the scan stage.

use std::path::Path;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::types::{Artifact, Package, PackageKind};
use crate::resolvers::npm::NpmResolver;
use crate::resolvers::pypi::PypiResolver;
use crate::resolvers::types::{DownloadOutcome, ResolverConfig};

#[async_trait]
pub trait Resolver: Send + Sync {
    /// The package kind this resolver serves.
    fn kind(&self) -> PackageKind;

    /// Translate a package declaration into a downloadable artifact.
    async fn resolve(&self, package: &Package) -> Result<Artifact>;

    /// Stream the artifact into `dest`, hashing and enforcing the size cap
    /// as bytes arrive. The destination only exists on success.
    async fn download(&self, artifact: &Artifact, dest: &Path) -> Result<DownloadOutcome>;
}

/// Resolver for a package kind, or `None` when the kind is unsupported.
#[must_use]
pub fn resolver_for(kind: PackageKind, config: &ResolverConfig) -> Option<Box<dyn Resolver>> {
    match kind {
        PackageKind::Npm => Some(Box::new(NpmResolver::new(config.clone()))),
        PackageKind::Pypi => Some(Box::new(PypiResolver::new(config.clone()))),
        PackageKind::Oci | PackageKind::Nuget | PackageKind::Mcpb => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_kinds_have_resolvers() {
        let config = ResolverConfig::default();
        assert!(resolver_for(PackageKind::Npm, &config).is_some());
        assert!(resolver_for(PackageKind::Pypi, &config).is_some());
        assert!(resolver_for(PackageKind::Oci, &config).is_none());
        assert!(resolver_for(PackageKind::Nuget, &config).is_none());
        assert!(resolver_for(PackageKind::Mcpb, &config).is_none());
    }
}
