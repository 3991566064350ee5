//! Namespace identity verification
//!
//! A namespace encodes an ownership claim: `io.github.<owner>/<name>` claims
//! a GitHub account, `<tld>.<domain>/<name>` claims a domain. Verification
//! checks that claim against what the registry record actually points at.
//! Domain challenges (DNS/HTTP) are not implemented; custom domains stay
//! unverified.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::types::{RegistryClaim, ServerRecord};

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // static pattern, validated by tests
    Regex::new(
        r"^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*/[a-z0-9][a-z0-9._-]*$",
    )
    .expect("valid namespace regex")
});

/// Verification method recorded into the lockfile.
pub const METHOD_REGISTRY_OFFICIAL: &str = "registry-official";
/// GitHub owner-match verification method.
pub const METHOD_GITHUB: &str = "github";

/// Trust status extracted from a server record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Official,
    Verified,
    Community,
}

/// Identity hints extracted from a server record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerIdentity {
    pub status: IdentityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npm_package: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubIdentity {
    pub owner: String,
    pub repo: String,
}

/// Outcome of verifying a namespace against its registry record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Claimed domain, extracted for reporting even when unverified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl VerificationResult {
    fn verified(method: &str, owner: Option<String>) -> Self {
        Self {
            verified: true,
            method: Some(method.to_string()),
            owner,
            reason: None,
            domain: None,
        }
    }

    fn unverified(reason: String) -> Self {
        Self {
            verified: false,
            method: None,
            owner: None,
            reason: Some(reason),
            domain: None,
        }
    }
}

/// Check a namespace against the reverse-DNS grammar.
#[must_use]
pub fn is_valid_format(name: &str) -> bool {
    NAMESPACE_RE.is_match(name)
}

/// GitHub owner claimed by an `io.github.<owner>/<name>` namespace.
#[must_use]
pub fn github_owner(namespace: &str) -> Option<&str> {
    let rest = namespace.strip_prefix("io.github.")?;
    let (owner, _name) = rest.split_once('/')?;
    if owner.is_empty() { None } else { Some(owner) }
}

/// Domain claimed by a custom-domain namespace, in DNS order.
/// `com.example.tools/srv` → `tools.example.com` (labels reversed).
#[must_use]
pub fn claimed_domain(namespace: &str) -> Option<String> {
    let (host_part, _name) = namespace.split_once('/')?;
    let labels: Vec<&str> = host_part.split('.').collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels.into_iter().rev().collect::<Vec<_>>().join("."))
}

/// Parse `(owner, repo)` out of a repository URL. Tolerates a `.git`
/// suffix and the `git@github.com:owner/repo` SSH form.
#[must_use]
pub fn parse_github_repo(repo_url: &str) -> Option<(String, String)> {
    let path = if let Some(ssh_path) = repo_url.strip_prefix("git@github.com:") {
        ssh_path.to_string()
    } else {
        let parsed = Url::parse(repo_url).ok()?;
        if !parsed
            .host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case("github.com"))
        {
            return None;
        }
        parsed.path().trim_start_matches('/').to_string()
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?.trim_end_matches(".git");
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Extract trust status and identity hints from a server record.
#[must_use]
pub fn extract_identity(record: &ServerRecord) -> ServerIdentity {
    let status = match record.claim {
        Some(RegistryClaim::Official) => IdentityStatus::Official,
        Some(RegistryClaim::Verified) => IdentityStatus::Verified,
        None => IdentityStatus::Community,
    };
    let github = record
        .repository
        .as_deref()
        .and_then(parse_github_repo)
        .map(|(owner, repo)| GithubIdentity { owner, repo });
    let npm_package = record
        .packages
        .iter()
        .find(|p| p.kind == crate::core::types::PackageKind::Npm)
        .map(|p| p.identifier.clone());
    ServerIdentity {
        status,
        github,
        npm_package,
    }
}

/// Verify the ownership claim a namespace makes, against the registry record.
#[must_use]
pub fn verify(namespace: &str, record: &ServerRecord) -> VerificationResult {
    if !is_valid_format(namespace) {
        return VerificationResult::unverified(format!(
            "namespace '{namespace}' is not in reverse-DNS form"
        ));
    }

    if matches!(
        record.claim,
        Some(RegistryClaim::Official | RegistryClaim::Verified)
    ) {
        return VerificationResult::verified(METHOD_REGISTRY_OFFICIAL, None);
    }

    if let Some(claimed_owner) = github_owner(namespace) {
        let Some((repo_owner, _repo)) = record.repository.as_deref().and_then(parse_github_repo)
        else {
            return VerificationResult::unverified(format!(
                "namespace claims GitHub owner '{claimed_owner}' but the record has no GitHub repository"
            ));
        };
        if repo_owner.eq_ignore_ascii_case(claimed_owner) {
            return VerificationResult::verified(METHOD_GITHUB, Some(repo_owner));
        }
        return VerificationResult::unverified(format!(
            "namespace claims GitHub owner '{claimed_owner}' but repository belongs to '{repo_owner}'"
        ));
    }

    if let Some(domain) = claimed_domain(namespace) {
        let mut result =
            VerificationResult::unverified("domain challenge verification is not implemented".into());
        result.domain = Some(domain);
        return result;
    }

    VerificationResult::unverified("community namespace without an ownership proof".into())
}
