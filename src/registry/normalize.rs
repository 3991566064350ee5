//! Registry record normalization
//!
//! Registry responses are loosely typed: package entries spell their
//! registry under `registry_type`, `registryType`, or `type`, versions may
//! live in a `version_detail` object, and repository may be a string or an
//! object. Normalization maps all of that onto the closed [`ServerRecord`]
//! shape and drops package entries that cannot be classified.

use serde_json::Value;

use crate::core::error::{Result, ShieldError};
use crate::core::types::{Package, PackageKind, RegistryClaim, ServerRecord};

/// Normalize a raw registry response body into a [`ServerRecord`].
pub fn normalize_server(raw: &Value) -> Result<ServerRecord> {
    // Some registry deployments wrap the record in a `server` envelope.
    let record = raw.get("server").unwrap_or(raw);

    let name = record
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ShieldError::Unexpected("registry record has no name".into()))?
        .to_string();

    let version = record
        .get("version")
        .and_then(Value::as_str)
        .or_else(|| {
            record
                .get("version_detail")
                .and_then(|d| d.get("version"))
                .and_then(Value::as_str)
        })
        .unwrap_or("0.0.0")
        .to_string();

    let description = record
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let repository = match record.get("repository") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Object(obj)) => obj.get("url").and_then(Value::as_str).map(String::from),
        _ => None,
    };

    let packages = record
        .get("packages")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(normalize_package).collect())
        .unwrap_or_default();

    let claim = extract_claim(record);

    Ok(ServerRecord {
        name,
        description,
        version,
        repository,
        packages,
        claim,
    })
}

/// Map one loose package entry onto the closed kind enum; unknown kinds
/// are dropped rather than propagated as strings.
fn normalize_package(entry: &Value) -> Option<Package> {
    let raw_kind = entry
        .get("registry_type")
        .or_else(|| entry.get("registryType"))
        .or_else(|| entry.get("type"))
        .and_then(Value::as_str)?;
    let kind = PackageKind::classify(raw_kind)?;

    let identifier = entry
        .get("identifier")
        .or_else(|| entry.get("name"))
        .and_then(Value::as_str)?
        .to_string();
    let version = entry
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("latest")
        .to_string();
    let declared_digest = entry
        .get("file_sha256")
        .or_else(|| entry.get("fileSha256"))
        .or_else(|| entry.get("digest"))
        .and_then(Value::as_str)
        .map(String::from);

    Some(Package {
        kind,
        identifier,
        version,
        declared_digest,
    })
}

fn extract_claim(record: &Value) -> Option<RegistryClaim> {
    let raw = record
        .get("verification")
        .and_then(Value::as_str)
        .or_else(|| {
            record
                .get("_meta")
                .and_then(|m| m.get("io.modelcontextprotocol.registry/official"))
                .and_then(|o| o.get("verification"))
                .and_then(Value::as_str)
        })?;
    match raw.to_ascii_lowercase().as_str() {
        "official" => Some(RegistryClaim::Official),
        "verified" => Some(RegistryClaim::Verified),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_full_record() {
        let raw = json!({
            "name": "io.github.owner/tool",
            "description": "A tool",
            "version": "1.2.3",
            "repository": {"url": "https://github.com/owner/tool", "source": "github"},
            "packages": [
                {"registry_type": "npm", "identifier": "@owner/tool", "version": "1.2.3"},
                {"registry_type": "homebrew", "identifier": "tool", "version": "1.2.3"}
            ]
        });
        let record = normalize_server(&raw).unwrap();
        assert_eq!(record.name, "io.github.owner/tool");
        assert_eq!(record.version, "1.2.3");
        assert_eq!(record.repository.as_deref(), Some("https://github.com/owner/tool"));
        // homebrew entry is dropped, not propagated
        assert_eq!(record.packages.len(), 1);
        assert_eq!(record.packages[0].kind, PackageKind::Npm);
        assert!(record.claim.is_none());
    }

    #[test]
    fn test_version_detail_fallback() {
        let raw = json!({
            "name": "com.example/x",
            "version_detail": {"version": "2.0.0"}
        });
        let record = normalize_server(&raw).unwrap();
        assert_eq!(record.version, "2.0.0");
    }

    #[test]
    fn test_server_envelope_unwrapped() {
        let raw = json!({"server": {"name": "com.example/x", "version": "1.0.0"}});
        assert_eq!(normalize_server(&raw).unwrap().name, "com.example/x");
    }

    #[test]
    fn test_string_repository() {
        let raw = json!({
            "name": "com.example/x",
            "version": "1.0.0",
            "repository": "https://github.com/e/x"
        });
        assert_eq!(
            normalize_server(&raw).unwrap().repository.as_deref(),
            Some("https://github.com/e/x")
        );
    }

    #[test]
    fn test_camel_case_package_keys() {
        let raw = json!({
            "name": "com.example/x",
            "version": "1.0.0",
            "packages": [{"registryType": "pypi", "name": "xtool", "version": "0.1.0"}]
        });
        let record = normalize_server(&raw).unwrap();
        assert_eq!(record.packages[0].kind, PackageKind::Pypi);
        assert_eq!(record.packages[0].identifier, "xtool");
    }

    #[test]
    fn test_verification_claim() {
        let raw = json!({
            "name": "com.example/x",
            "version": "1.0.0",
            "verification": "official"
        });
        assert_eq!(
            normalize_server(&raw).unwrap().claim,
            Some(RegistryClaim::Official)
        );
    }

    #[test]
    fn test_missing_name_is_error() {
        assert!(normalize_server(&json!({"version": "1.0.0"})).is_err());
    }
}
