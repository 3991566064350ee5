//! Content-addressed artifact cache
//!
//! Artifacts live under `root/<shard>/<algo>-<safe-hash>` where `safe-hash`
//! is the filesystem-safe base64url form of the raw hash and `shard` is its
//! first two characters. A legacy layout that kept the original base64 name
//! is still honored on reads; writes always use the safe layout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};

use crate::core::error::{Result, ShieldError};
use crate::core::paths;

/// On-disk content cache keyed by canonical digest.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    /// Cache rooted at the resolved platform cache directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: paths::cache_root(),
        }
    }

    /// Cache rooted at an explicit directory (tests, `--cache-dir`).
    #[must_use]
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when the digest has a cached artifact.
    #[must_use]
    pub fn has(&self, digest: &str) -> bool {
        self.get(digest).is_some()
    }

    /// Path of the cached artifact for `digest`, if present.
    ///
    /// Tries the safe layout first, then the legacy original-base64 name
    /// under the same shard.
    #[must_use]
    pub fn get(&self, digest: &str) -> Option<PathBuf> {
        let (safe, legacy) = self.slot_candidates(digest)?;
        if safe.is_file() {
            return Some(safe);
        }
        if legacy.is_file() {
            return Some(legacy);
        }
        None
    }

    /// Copy `source` into the cache slot for `digest`, creating parents.
    ///
    /// Idempotent: the slot is digest-addressed, so overwriting an existing
    /// entry is safe.
    pub fn put(&self, digest: &str, source: &Path) -> Result<PathBuf> {
        let (slot, _) = self
            .slot_candidates(digest)
            .ok_or_else(|| ShieldError::User(format!("malformed digest '{digest}'")))?;
        if let Some(parent) = slot.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &slot)?;
        Ok(slot)
    }

    /// Delete cached files older than `max_age` by mtime. Missing root is
    /// not an error. Returns the number of files removed.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let cutoff = SystemTime::now().checked_sub(max_age);
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };

        let mut removed = 0;
        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let meta = entry.metadata()?;
                if !meta.is_file() {
                    continue;
                }
                let stale = meta.modified().is_ok_and(|mtime| mtime < cutoff);
                if stale {
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
            // Drop emptied shards so purged trees stay tidy.
            let _ = fs::remove_dir(shard.path());
        }
        Ok(removed)
    }

    /// Remove every cached file and the cache root itself.
    /// Returns the number of files removed.
    pub fn purge(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in walk_files(&self.root)? {
            fs::remove_file(entry)?;
            removed += 1;
        }
        fs::remove_dir_all(&self.root)?;
        Ok(removed)
    }

    /// Total size in bytes and file count of the cache tree.
    pub fn stats(&self) -> Result<(u64, usize)> {
        if !self.root.exists() {
            return Ok((0, 0));
        }
        let mut bytes = 0;
        let mut count = 0;
        for path in walk_files(&self.root)? {
            bytes += fs::metadata(&path)?.len();
            count += 1;
        }
        Ok((bytes, count))
    }

    /// Safe and legacy slot paths for a digest. None when the digest is not
    /// `<algo>-<base64>` shaped.
    fn slot_candidates(&self, digest: &str) -> Option<(PathBuf, PathBuf)> {
        let (algo, b64) = digest.split_once('-')?;
        if algo.is_empty() || b64.is_empty() {
            return None;
        }
        let raw = BASE64.decode(b64).ok()?;
        let safe = BASE64_URL.encode(raw);
        let shard = if safe.len() >= 2 { &safe[..2] } else { "00" };
        let shard_dir = self.root.join(shard);
        Some((
            shard_dir.join(format!("{algo}-{safe}")),
            shard_dir.join(format!("{algo}-{b64}")),
        ))
    }
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let ty = entry.file_type()?;
            if ty.is_dir() {
                stack.push(entry.path());
            } else if ty.is_file() {
                files.push(entry.path());
            }
        }
    }
    Ok(files)
}
