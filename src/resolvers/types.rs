//! Resolver support types

use std::path::PathBuf;

use crate::core::http::DEFAULT_MAX_REDIRECTS;

/// Default per-artifact size cap: 100 MiB.
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 100 * 1024 * 1024;

/// npm registry default endpoint.
pub const DEFAULT_NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// PyPI default endpoint.
pub const DEFAULT_PYPI_REGISTRY_URL: &str = "https://pypi.org";

/// Outcome of a completed streaming download.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Canonical digest computed over the streamed bytes.
    pub digest: String,
    pub bytes_written: u64,
    pub path: PathBuf,
}

/// Shared resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub npm_registry_url: String,
    pub pypi_registry_url: String,
    pub max_artifact_bytes: u64,
    pub max_redirects: usize,
    pub offline: bool,
    pub show_progress: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            npm_registry_url: DEFAULT_NPM_REGISTRY_URL.into(),
            pypi_registry_url: DEFAULT_PYPI_REGISTRY_URL.into(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            offline: false,
            show_progress: false,
        }
    }
}
