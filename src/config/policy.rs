//! Policy document loading
//!
//! `policy.yaml` is parsed into the typed [`Policy`] struct and passed
//! through the schema gate before anything evaluates it: unknown keys are
//! rejected at deserialization and the structural checks mirror the schema
//! document shipped in `schemas/`. Evaluation never sees raw YAML.

use std::path::Path;

use crate::core::error::{Result, ShieldError};
use crate::core::security::policy::{Policy, validate};

/// The policy JSON-schema document, part of the public contract.
pub const POLICY_SCHEMA: &str = include_str!("../../schemas/policy.schema.json");

/// The lockfile JSON-schema document, part of the public contract.
pub const LOCKFILE_SCHEMA: &str = include_str!("../../schemas/lockfile.schema.json");

/// Load and validate a policy file. An absent file is `None`; a present but
/// malformed or schema-violating file is a user error.
pub fn load_policy(path: &Path) -> Result<Option<Policy>> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let policy: Policy = serde_yaml_bw::from_str(&raw).map_err(|e| {
        ShieldError::User(format!("policy {} is not valid: {e}", path.display()))
    })?;

    let validation = validate(&policy);
    if !validation.valid {
        return Err(ShieldError::User(format!(
            "policy {} failed validation: {}",
            path.display(),
            validation.errors.join("; ")
        )));
    }
    Ok(Some(policy))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::types::Severity;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_policy(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("policy.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_absent_policy_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_policy(&tmp.path().join("policy.yaml")).unwrap().is_none());
    }

    #[test]
    fn test_full_policy_round_trip() {
        let (_tmp, path) = write_policy(
            r#"
version: "1.0"
global:
  allowNamespaces:
    - "io.github.myorg/*"
  denyNamespaces:
    - "io.github.banned.*"
  denyUnverified: true
  maxRiskScore: 40
  blockSeverities: [critical, high]
  requireApprovalFor: [network]
servers:
  - namespace: "io.github.myorg/special"
    maxRiskScore: 80
"#,
        );
        let policy = load_policy(&path).unwrap().unwrap();
        let global = policy.global.unwrap();
        assert_eq!(global.allow_namespaces, vec!["io.github.myorg/*"]);
        assert!(global.deny_unverified);
        assert_eq!(global.max_risk_score, Some(40));
        assert_eq!(
            global.block_severities,
            vec![Severity::Critical, Severity::High]
        );
        assert_eq!(policy.servers.unwrap()[0].max_risk_score, Some(80));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let (_tmp, path) = write_policy("version: \"1.0\"\nunknownKey: true\n");
        let err = load_policy(&path).unwrap_err();
        assert!(matches!(err, ShieldError::User(_)));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let (_tmp, path) = write_policy("version: \"2.0\"\n");
        let err = load_policy(&path).unwrap_err();
        assert!(matches!(err, ShieldError::User(_)));
        assert!(err.to_string().contains("1.0"));
    }

    #[test]
    fn test_bad_severity_rejected() {
        let (_tmp, path) = write_policy(
            "version: \"1.0\"\nglobal:\n  blockSeverities: [catastrophic]\n",
        );
        assert!(load_policy(&path).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_user_error() {
        let (_tmp, path) = write_policy("version: [unclosed\n");
        let err = load_policy(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_schema_documents_are_valid_json() {
        serde_json::from_str::<serde_json::Value>(POLICY_SCHEMA).unwrap();
        serde_json::from_str::<serde_json::Value>(LOCKFILE_SCHEMA).unwrap();
    }
}
