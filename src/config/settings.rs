//! MCPShield settings
//!
//! Optional TOML file at the user config dir. Every field has a default so
//! the tool works with no configuration at all.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::http::DEFAULT_MAX_REDIRECTS;
use crate::core::paths;
use crate::core::security::vulnerability::DEFAULT_OSV_URL;
use crate::registry::DEFAULT_REGISTRY_URL;
use crate::resolvers::ResolverConfig;
use crate::resolvers::types::{
    DEFAULT_MAX_ARTIFACT_BYTES, DEFAULT_NPM_REGISTRY_URL, DEFAULT_PYPI_REGISTRY_URL,
};

/// MCPShield configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// MCP registry endpoint
    pub registry_url: String,

    /// npm registry endpoint
    pub npm_registry_url: String,

    /// PyPI endpoint
    pub pypi_registry_url: String,

    /// Advisory service endpoint
    pub osv_url: String,

    /// Per-artifact download cap in bytes
    pub max_artifact_bytes: u64,

    /// Maximum redirects followed during artifact downloads
    pub max_redirects: usize,

    /// Cache entries older than this many days are removed by cleanup
    pub cache_max_age_days: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            npm_registry_url: DEFAULT_NPM_REGISTRY_URL.to_string(),
            pypi_registry_url: DEFAULT_PYPI_REGISTRY_URL.to_string(),
            osv_url: DEFAULT_OSV_URL.to_string(),
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            cache_max_age_days: 30,
        }
    }
}

impl Settings {
    /// Path of the config file under the resolved config directory.
    #[must_use]
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.toml")
    }

    /// Load settings from the config file, applying env overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut settings: Self = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        // Registry override keeps hermetic tests off the public registry.
        if let Ok(url) = std::env::var("MCPSHIELD_REGISTRY_URL")
            && !url.is_empty()
        {
            settings.registry_url = url;
        }

        Ok(settings)
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolver configuration derived from these settings.
    #[must_use]
    pub fn resolver_config(&self, offline: bool, show_progress: bool) -> ResolverConfig {
        ResolverConfig {
            npm_registry_url: self.npm_registry_url.clone(),
            pypi_registry_url: self.pypi_registry_url.clone(),
            max_artifact_bytes: self.max_artifact_bytes,
            max_redirects: self.max_redirects,
            offline,
            show_progress,
        }
    }
}
