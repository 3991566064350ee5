//! Lockfile store
//!
//! `mcp.lock.json` is the canonical record of approved servers. Writes are
//! canonicalized (sorted servers map, sorted artifacts, refreshed
//! `generatedAt`, trailing newline) and durable: temp file, fsync, rename,
//! parent fsync. A crash at any point leaves either the old or the new
//! file, never a partial one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, ShieldError};
use crate::core::types::PackageKind;

/// Current lockfile schema version.
pub const LOCKFILE_VERSION: &str = "1.0.0";

/// One pinned artifact inside a lockfile entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedArtifact {
    pub kind: PackageKind,
    pub url: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl LockedArtifact {
    /// Canonical identity string used by [`diff`].
    fn canonical(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.kind,
            self.url,
            self.digest,
            self.size.map_or_else(String::new, |s| s.to_string())
        )
    }
}

/// One approved server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileEntry {
    pub namespace: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_owner: Option<String>,
    /// ISO-8601 UTC timestamp of the pinning fetch.
    pub fetched_at: String,
    pub artifacts: Vec<LockedArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
}

/// The lockfile document. Unknown fields from newer writers are tolerated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub servers: BTreeMap<String, LockfileEntry>,
}

impl Lockfile {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: LOCKFILE_VERSION.into(),
            generated_at: String::new(),
            servers: BTreeMap::new(),
        }
    }
}

/// Validation outcome for a lockfile document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Differences between two lockfiles.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockfileDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl LockfileDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Store for one lockfile path.
#[derive(Debug, Clone)]
pub struct LockfileStore {
    path: PathBuf,
}

impl LockfileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the lockfile; an absent file reads as the empty lockfile.
    pub fn read(&self) -> Result<Lockfile> {
        if !self.exists() {
            return Ok(Lockfile::empty());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| {
            ShieldError::User(format!(
                "lockfile {} is not valid: {e}",
                self.path.display()
            ))
        })
    }

    /// Canonicalize and durably write the lockfile.
    pub fn write(&self, lockfile: &Lockfile) -> Result<()> {
        let mut canonical = lockfile.clone();
        normalize(&mut canonical);

        let mut body = serde_json::to_string_pretty(&canonical)?;
        body.push('\n');
        self.write_atomic(body.as_bytes())
    }

    /// Insert or replace one server entry.
    pub fn add_server(&self, entry: LockfileEntry) -> Result<()> {
        let mut lockfile = self.read()?;
        lockfile.servers.insert(entry.namespace.clone(), entry);
        self.write(&lockfile)
    }

    /// Remove a server entry. Returns whether it was present.
    pub fn remove_server(&self, namespace: &str) -> Result<bool> {
        let mut lockfile = self.read()?;
        let removed = lockfile.servers.remove(namespace).is_some();
        if removed {
            self.write(&lockfile)?;
        }
        Ok(removed)
    }

    /// Fetch one entry.
    pub fn get_server(&self, namespace: &str) -> Result<Option<LockfileEntry>> {
        Ok(self.read()?.servers.get(namespace).cloned())
    }

    /// Durable write protocol: sibling temp file, fsync, rename onto the
    /// target, best-effort fsync of the parent directory. The temp file is
    /// unlinked on any failure.
    fn write_atomic(&self, body: &[u8]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("mcp.lock.json");
        let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

        let result = (|| -> Result<()> {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(body)?;
            tmp.sync_all()?;
            drop(tmp);
            fs::rename(&tmp_path, &self.path)?;
            if let Ok(dir_handle) = File::open(dir) {
                let _ = dir_handle.sync_all();
            }
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

/// Canonicalization applied on every write.
fn normalize(lockfile: &mut Lockfile) {
    if lockfile.version.is_empty() {
        lockfile.version = LOCKFILE_VERSION.into();
    }
    lockfile.generated_at = jiff::Timestamp::now().to_string();
    for entry in lockfile.servers.values_mut() {
        entry
            .artifacts
            .sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.url.cmp(&b.url)));
    }
}

/// Structural validation mirroring the lockfile schema.
#[must_use]
pub fn validate(lockfile: &Lockfile) -> LockfileValidation {
    let mut errors = Vec::new();
    if lockfile.version.is_empty() {
        errors.push("lockfile has no version".into());
    }
    for (key, entry) in &lockfile.servers {
        if entry.namespace.is_empty() {
            errors.push(format!("entry '{key}' has an empty namespace"));
        } else if &entry.namespace != key {
            errors.push(format!(
                "entry key '{key}' does not match its namespace '{}'",
                entry.namespace
            ));
        }
        if entry.version.is_empty() {
            errors.push(format!("entry '{key}' has no version"));
        }
        if entry.fetched_at.is_empty() {
            errors.push(format!("entry '{key}' has no fetchedAt timestamp"));
        }
        for artifact in &entry.artifacts {
            if artifact.digest.is_empty() {
                errors.push(format!("entry '{key}' has an artifact without a digest"));
            }
        }
    }
    LockfileValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Differences between two lockfiles: added/removed namespaces, and entries
/// whose version or canonical artifact set changed.
#[must_use]
pub fn diff(old: &Lockfile, new: &Lockfile) -> LockfileDiff {
    let mut result = LockfileDiff::default();
    for namespace in new.servers.keys() {
        if !old.servers.contains_key(namespace) {
            result.added.push(namespace.clone());
        }
    }
    for (namespace, old_entry) in &old.servers {
        match new.servers.get(namespace) {
            None => result.removed.push(namespace.clone()),
            Some(new_entry) => {
                if old_entry.version != new_entry.version
                    || artifact_set(old_entry) != artifact_set(new_entry)
                {
                    result.changed.push(namespace.clone());
                }
            }
        }
    }
    result
}

fn artifact_set(entry: &LockfileEntry) -> Vec<String> {
    let mut set: Vec<String> = entry.artifacts.iter().map(LockedArtifact::canonical).collect();
    set.sort();
    set
}
