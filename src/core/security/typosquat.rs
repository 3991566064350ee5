//! Typosquat detection
//!
//! Compares a bare package name against curated lists of popular names by
//! Levenshtein edit distance. Distance 1 is a high-signal hit, distance 2
//! medium; an exact match is the real package and yields nothing.

use crate::core::types::{Finding, PackageKind, Severity};

/// Risk weight for an edit-distance-1 hit.
pub const WEIGHT_DISTANCE_ONE: u32 = 30;
/// Risk weight for an edit-distance-2 hit.
pub const WEIGHT_DISTANCE_TWO: u32 = 15;

const POPULAR_NPM: &[&str] = &[
    "express",
    "react",
    "react-dom",
    "lodash",
    "axios",
    "chalk",
    "commander",
    "moment",
    "webpack",
    "typescript",
    "vue",
    "next",
    "eslint",
    "prettier",
    "jest",
    "mocha",
    "dotenv",
    "uuid",
    "debug",
    "glob",
    "rimraf",
    "semver",
    "minimist",
    "yargs",
    "inquirer",
    "request",
    "node-fetch",
    "socket.io",
    "redux",
    "vite",
];

const POPULAR_PYPI: &[&str] = &[
    "requests",
    "numpy",
    "pandas",
    "django",
    "flask",
    "pytest",
    "scipy",
    "pillow",
    "urllib3",
    "boto3",
    "setuptools",
    "cryptography",
    "pydantic",
    "fastapi",
    "sqlalchemy",
    "matplotlib",
    "httpx",
    "rich",
    "click",
    "certifi",
];

/// Check a bare package name for typosquatting; emits at most one finding
/// with its risk weight.
#[must_use]
pub fn check(name: &str, kind: PackageKind) -> Option<(Finding, u32)> {
    let list = match kind {
        PackageKind::Npm => POPULAR_NPM,
        PackageKind::Pypi => POPULAR_PYPI,
        _ => return None,
    };

    let bare = bare_name(name);
    let mut best: Option<(&str, usize)> = None;
    for popular in list {
        let distance = edit_distance(bare, popular);
        if distance == 0 {
            return None; // it is the real package
        }
        if distance <= 2 && best.is_none_or(|(_, d)| distance < d) {
            best = Some((popular, distance));
        }
    }

    let (target, distance) = best?;
    let (severity, weight) = if distance == 1 {
        (Severity::High, WEIGHT_DISTANCE_ONE)
    } else {
        (Severity::Medium, WEIGHT_DISTANCE_TWO)
    };
    let finding = Finding::new(
        "TYPOSQUAT_NAME",
        severity,
        "typosquat",
        format!("package name '{bare}' is edit distance {distance} from popular package '{target}'"),
    )
    .with_details(serde_json::json!({
        "target": target,
        "distance": distance,
    }));
    Some((finding, weight))
}

/// Strip an npm scope: `@scope/name` → `name`.
fn bare_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Classic two-row Levenshtein.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("expres", "express"), 1);
        assert_eq!(edit_distance("exprss", "express"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_distance_one_is_high() {
        let (finding, weight) = check("expres", PackageKind::Npm).unwrap();
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(weight, WEIGHT_DISTANCE_ONE);
        assert!(finding.message.contains("express"));
    }

    #[test]
    fn test_distance_two_is_medium() {
        let (finding, weight) = check("exprs", PackageKind::Npm).unwrap();
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(weight, WEIGHT_DISTANCE_TWO);
    }

    #[test]
    fn test_exact_match_is_clean() {
        assert!(check("express", PackageKind::Npm).is_none());
        assert!(check("requests", PackageKind::Pypi).is_none());
    }

    #[test]
    fn test_distant_name_is_clean() {
        assert!(check("completely-original-server", PackageKind::Npm).is_none());
    }

    #[test]
    fn test_scope_is_stripped() {
        let (finding, _) = check("@evil/expres", PackageKind::Npm).unwrap();
        assert!(finding.message.contains("'expres'"));
    }

    #[test]
    fn test_pypi_list_applies() {
        let (finding, weight) = check("reqests", PackageKind::Pypi).unwrap();
        assert_eq!(weight, WEIGHT_DISTANCE_ONE);
        assert!(finding.message.contains("requests"));
    }

    #[test]
    fn test_unsupported_kind_skipped() {
        assert!(check("expres", PackageKind::Oci).is_none());
    }
}
