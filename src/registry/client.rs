//! MCP registry metadata client

use serde_json::Value;

use crate::core::error::{Result, ShieldError};
use crate::core::http::{ensure_online, shared_client};
use crate::core::types::ServerRecord;
use crate::registry::{encode_segment, normalize::normalize_server};

/// Client for the MCP server registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    offline: bool,
}

impl RegistryClient {
    #[must_use]
    pub fn new(base_url: &str, offline: bool) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            offline,
        }
    }

    /// Fetch and normalize the record for one namespace.
    /// A 404 maps to [`ShieldError::NotFound`] so callers can surface it as
    /// a user error.
    pub async fn fetch_server(&self, namespace: &str) -> Result<ServerRecord> {
        ensure_online(self.offline, "registry metadata fetch")?;

        let url = format!("{}/v0/servers/{}", self.base_url, encode_segment(namespace));
        tracing::debug!(url = %url, "fetching server record");

        let response = shared_client().get(&url).send().await?;
        if response.status().as_u16() == 404 {
            return Err(ShieldError::NotFound(format!(
                "server '{namespace}' is not in the registry"
            )));
        }
        let response = response.error_for_status()?;
        let raw: Value = response.json().await?;
        normalize_server(&raw)
    }
}
