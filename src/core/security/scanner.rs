//! Artifact scanner
//!
//! Takes a package and its tarball bytes through typosquat checking, safe
//! extraction, manifest/script/code analysis, and dependency vulnerability
//! lookup, producing findings, a 0-100 risk score, and a verdict.
//!
//! Only npm gets the full pipeline. pypi gets the name-based typosquat
//! check; other kinds yield a single "not implemented" info finding.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

use crate::core::archive::safe_extract;
use crate::core::error::{Result, ShieldError};
use crate::core::security::patterns::{CODE_PATTERNS, is_scannable, match_count};
use crate::core::security::typosquat;
use crate::core::security::vulnerability::{
    self, DependencyQuery, VulnerabilityClient, affects_version,
};
use crate::core::types::{
    Finding, Package, PackageKind, ScanOutcome, Severity, Verdict, sort_findings,
};

/// Lifecycle hooks inspected during script analysis.
const LIFECYCLE_HOOKS: &[&str] = &[
    "preinstall",
    "install",
    "postinstall",
    "preuninstall",
    "uninstall",
    "postuninstall",
];

/// Direct + dev + peer dependency count above which a finding is emitted.
const DEPENDENCY_COUNT_THRESHOLD: usize = 50;

/// Artifact scanner. Holds the advisory client used for dependency lookups;
/// `None` means offline and the lookup step is skipped.
pub struct Scanner<'a> {
    vuln_client: Option<&'a VulnerabilityClient>,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(vuln_client: Option<&'a VulnerabilityClient>) -> Self {
        Self { vuln_client }
    }

    /// Scan one artifact's tarball bytes.
    pub async fn scan(&self, package: &Package, tarball: &[u8]) -> Result<ScanOutcome> {
        match package.kind {
            PackageKind::Npm => self.scan_npm(package, tarball).await,
            PackageKind::Pypi => Ok(scan_pypi_by_name(package)),
            other => Ok(ScanOutcome::unknown(other)),
        }
    }

    async fn scan_npm(&self, package: &Package, tarball: &[u8]) -> Result<ScanOutcome> {
        let mut findings = Vec::new();
        let mut score: u32 = 0;

        if let Some((finding, weight)) = typosquat::check(&package.identifier, PackageKind::Npm) {
            findings.push(finding);
            score += weight;
        }

        // Extraction workspace lives only for this scan; deletion on drop is
        // best-effort and its absence is never fatal.
        let workspace = TempDir::new()?;
        let tarball_path = workspace.path().join("artifact.tgz");
        {
            let mut f = fs::File::create(&tarball_path)?;
            f.write_all(tarball)?;
        }
        let extract_dir = workspace.path().join("extract");

        let warnings = match safe_extract(&tarball_path, &extract_dir) {
            Ok(warnings) => warnings,
            Err(ShieldError::PathTraversal(detail)) => {
                findings.push(
                    Finding::new(
                        "EXTRACT_PATH_TRAVERSAL",
                        Severity::Critical,
                        "extraction",
                        format!("archive attempts path traversal: {detail}"),
                    ),
                );
                sort_findings(&mut findings);
                return Ok(ScanOutcome {
                    verdict: Verdict::Malicious,
                    risk_score: 100,
                    findings,
                    dependency_stats: None,
                });
            }
            Err(other) => return Err(other),
        };
        for warning in warnings {
            findings.push(
                Finding::new(
                    "EXTRACT_WARNING",
                    Severity::Info,
                    "extraction",
                    format!("{}: {}", warning.path, warning.message),
                ),
            );
        }

        let package_root = locate_package_root(&extract_dir);
        let manifest = read_manifest(&package_root);

        let mut dependency_specs: Vec<(String, String)> = Vec::new();
        if let Some(manifest) = &manifest {
            score += analyze_manifest(manifest, &mut findings, &mut dependency_specs);
            score += analyze_scripts(manifest, &mut findings);
        }
        score += scan_code(&package_root, &mut findings);

        let mut dependency_stats = None;
        if let Some(client) = self.vuln_client {
            let (stats, weight) =
                lookup_dependencies(client, &dependency_specs, &mut findings).await?;
            dependency_stats = Some(stats);
            score += weight;
        }

        let risk_score = score.min(100);
        sort_findings(&mut findings);
        let verdict = derive_verdict(&findings, risk_score);
        Ok(ScanOutcome {
            verdict,
            risk_score,
            findings,
            dependency_stats,
        })
    }
}

/// pypi coverage is limited to the name-based typosquat check.
fn scan_pypi_by_name(package: &Package) -> ScanOutcome {
    let mut outcome = ScanOutcome::unknown(PackageKind::Pypi);
    if let Some((finding, weight)) = typosquat::check(&package.identifier, PackageKind::Pypi) {
        outcome.findings.push(finding);
        outcome.risk_score = weight.min(100);
        sort_findings(&mut outcome.findings);
    }
    outcome
}

/// npm tarballs unpack under a `package/` prefix; tolerate a different
/// single top-level directory, falling back to the extraction root.
fn locate_package_root(extract_dir: &Path) -> PathBuf {
    let canonical = extract_dir.join("package");
    if canonical.is_dir() {
        return canonical;
    }
    let entries: Vec<_> = fs::read_dir(extract_dir)
        .map(|iter| iter.filter_map(std::result::Result::ok).collect())
        .unwrap_or_default();
    if entries.len() == 1 && entries[0].path().is_dir() {
        return entries[0].path();
    }
    extract_dir.to_path_buf()
}

fn read_manifest(package_root: &Path) -> Option<Value> {
    let raw = fs::read_to_string(package_root.join("package.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Dependency-count and dependency-spec analysis. Returns the added weight
/// and collects `(name, spec)` pairs of direct dependencies for the
/// vulnerability lookup.
fn analyze_manifest(
    manifest: &Value,
    findings: &mut Vec<Finding>,
    dependency_specs: &mut Vec<(String, String)>,
) -> u32 {
    let mut weight = 0;

    let sections = ["dependencies", "devDependencies", "peerDependencies"];
    let mut total = 0;
    for section in sections {
        if let Some(map) = manifest.get(section).and_then(Value::as_object) {
            total += map.len();
            for (name, spec) in map {
                let Some(spec) = spec.as_str() else { continue };
                if section == "dependencies" {
                    dependency_specs.push((name.clone(), spec.to_string()));
                }
                if spec.contains("git://") || spec.contains("git+") {
                    findings.push(
                        Finding::new(
                            "MANIFEST_GIT_DEPENDENCY",
                            Severity::High,
                            "dependencies",
                            format!("dependency '{name}' resolves from a git URL: {spec}"),
                        ),
                    );
                    weight += 15;
                } else if spec.starts_with("http://") {
                    findings.push(
                        Finding::new(
                            "MANIFEST_HTTP_DEPENDENCY",
                            Severity::Critical,
                            "dependencies",
                            format!("dependency '{name}' resolves over plain http: {spec}"),
                        ),
                    );
                    weight += 25;
                }
            }
        }
    }

    if total > DEPENDENCY_COUNT_THRESHOLD {
        findings.push(
            Finding::new(
                "MANIFEST_DEPENDENCY_COUNT",
                Severity::Medium,
                "dependencies",
                format!("{total} declared dependencies (threshold {DEPENDENCY_COUNT_THRESHOLD})"),
            ),
        );
        weight += 10;
    }

    weight
}

/// Lifecycle hook analysis. Network downloaders are high, dynamic
/// evaluation is critical.
fn analyze_scripts(manifest: &Value, findings: &mut Vec<Finding>) -> u32 {
    let Some(scripts) = manifest.get("scripts").and_then(Value::as_object) else {
        return 0;
    };
    let mut weight = 0;
    for hook in LIFECYCLE_HOOKS {
        let Some(body) = scripts.get(*hook).and_then(Value::as_str) else {
            continue;
        };
        if ["curl", "wget", "fetch"].iter().any(|n| body.contains(n)) {
            findings.push(
                Finding::new(
                    "SCRIPT_NETWORK_DOWNLOAD",
                    Severity::High,
                    "scripts",
                    format!("lifecycle hook '{hook}' downloads from the network: {body}"),
                ),
            );
            weight += 20;
        }
        if body.contains("eval") || body.contains("exec") {
            findings.push(
                Finding::new(
                    "SCRIPT_DYNAMIC_EXEC",
                    Severity::Critical,
                    "scripts",
                    format!("lifecycle hook '{hook}' evaluates dynamic code: {body}"),
                ),
            );
            weight += 30;
        }
    }
    weight
}

/// Regex rule scan over JS/TS sources under the package root, skipping
/// `node_modules` and dotted names. One finding per (file, rule) with the
/// match count; weight per finding by severity.
fn scan_code(package_root: &Path, findings: &mut Vec<Finding>) -> u32 {
    let mut weight = 0;
    for file in collect_source_files(package_root) {
        let Ok(source) = fs::read_to_string(&file) else {
            continue;
        };
        let rel = file
            .strip_prefix(package_root)
            .unwrap_or(&file)
            .display()
            .to_string();
        for pattern in CODE_PATTERNS.iter() {
            let count = match_count(pattern, &source);
            if count == 0 {
                continue;
            }
            findings.push(
                Finding::new(
                    pattern.rule_id,
                    pattern.severity,
                    "code",
                    format!("{}: {} ({count} match(es))", rel, pattern.description),
                )
                .with_details(serde_json::json!({
                    "file": rel,
                    "matches": count,
                })),
            );
            weight += pattern.severity.pattern_weight();
        }
    }
    weight
}

fn collect_source_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(std::result::Result::ok) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || name == "node_modules" {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_scannable(&name) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Batch-resolve direct dependencies against the advisory service.
/// Specs that do not pin down a concrete version each add a low finding.
async fn lookup_dependencies(
    client: &VulnerabilityClient,
    dependency_specs: &[(String, String)],
    findings: &mut Vec<Finding>,
) -> Result<(crate::core::types::DependencyStats, u32)> {
    let mut weight = 0;
    let mut queries = Vec::new();
    for (name, spec) in dependency_specs {
        match concrete_version(spec) {
            Some(version) => queries.push(DependencyQuery {
                package: name.clone(),
                ecosystem: "npm".into(),
                version,
            }),
            None => {
                findings.push(
                    Finding::new(
                        "DEPENDENCY_UNRESOLVED_SPEC",
                        Severity::Low,
                        "dependencies",
                        format!("dependency '{name}' spec '{spec}' does not resolve to a concrete version"),
                    ),
                );
                weight += 5;
            }
        }
    }

    let results = client.batch_query(&queries).await?;
    let mut hits = Vec::new();
    for (query, advisories) in queries.iter().zip(&results) {
        for advisory in advisories {
            if affects_version(advisory, &query.version) {
                hits.push(advisory);
            }
        }
    }
    let stats = vulnerability::aggregate(dependency_specs.len(), &hits);
    Ok((stats, weight))
}

/// Reduce a dependency spec to a concrete version when the range pins one:
/// `1.2.3`, `=1.2.3`, `^1.2.3`, `~1.2.3`, `v1.2.3`. Wildcards, tags, and
/// URLs do not resolve.
fn concrete_version(spec: &str) -> Option<String> {
    let trimmed = spec
        .trim()
        .trim_start_matches(['^', '~', '=', 'v'])
        .trim();
    vulnerability::parse_lenient(trimmed).map(|v| v.to_string())
}

/// Verdict ladder, applied to the final finding set and clamped score.
fn derive_verdict(findings: &[Finding], risk_score: u32) -> Verdict {
    let critical = findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count();
    let high = findings
        .iter()
        .filter(|f| f.severity == Severity::High)
        .count();

    if critical > 0 {
        return Verdict::Malicious;
    }
    if high > 2 || risk_score > 60 {
        return Verdict::Suspicious;
    }
    if high > 0 || risk_score > 30 {
        return Verdict::Warning;
    }
    if findings.is_empty() && risk_score == 0 {
        return Verdict::Clean;
    }
    if findings.iter().any(|f| f.severity != Severity::Info) {
        Verdict::Warning
    } else {
        Verdict::Clean
    }
}
