//! Safe tar(.gz) extraction
//!
//! Pure Rust, no subprocess spawning. Every entry is validated before any
//! bytes touch the filesystem: absolute paths, `..` segments, backslashes on
//! non-Windows hosts, and links that escape the extraction root all abort
//! the extraction with a path-traversal error. Unknown entry types are
//! collected as warnings instead of failing the archive.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, Entry, EntryType};

use crate::core::error::{Result, ShieldError};

/// Non-fatal observation made while extracting.
#[derive(Debug, Clone)]
pub struct ExtractWarning {
    pub path: String,
    pub message: String,
}

/// Extract `archive_path` into `dest_dir`, which must be a fixed directory
/// dedicated to this archive. Returns the warnings collected along the way.
pub fn safe_extract(archive_path: &Path, dest_dir: &Path) -> Result<Vec<ExtractWarning>> {
    let file = File::open(archive_path)?;
    if is_gzip(archive_path)? {
        extract_entries(Archive::new(GzDecoder::new(file)), dest_dir)
    } else {
        extract_entries(Archive::new(file), dest_dir)
    }
}

fn is_gzip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == [0x1f, 0x8b]),
        Err(_) => Ok(false), // shorter than two bytes, let tar report it
    }
}

fn extract_entries<R: Read>(mut archive: Archive<R>, dest_dir: &Path) -> Result<Vec<ExtractWarning>> {
    fs::create_dir_all(dest_dir)?;
    let mut warnings = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = sanitized_entry_path(&entry)?;
        let Some(rel) = rel else {
            continue; // empty after normalization (e.g. bare "./")
        };
        let dest = dest_dir.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&dest)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                unpack_regular(&mut entry, &dest)?;
            }
            EntryType::Symlink => {
                let target = validated_link_target(&entry, &rel)?;
                unlink_existing(&dest)?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                make_symlink(&target, &dest)?;
            }
            EntryType::Link => {
                let target_rel = validated_link_target(&entry, &rel)?;
                let target_abs = dest_dir.join(&target_rel);
                unlink_existing(&dest)?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::hard_link(&target_abs, &dest)?;
            }
            other => {
                warnings.push(ExtractWarning {
                    path: rel.display().to_string(),
                    message: format!("skipped unsupported entry type {other:?}"),
                });
            }
        }
    }

    Ok(warnings)
}

fn unpack_regular<R: Read>(entry: &mut Entry<'_, R>, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    unlink_existing(dest)?;
    entry.unpack(dest)?;
    Ok(())
}

fn unlink_existing(dest: &Path) -> Result<()> {
    if dest.symlink_metadata().is_ok() && !dest.is_dir() {
        fs::remove_file(dest)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(target: &Path, dest: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, dest)?;
    Ok(())
}

/// Normalize an entry path and reject traversal attempts. Returns the
/// normalized relative path, or None when the entry resolves to nothing.
fn sanitized_entry_path<R: Read>(entry: &Entry<'_, R>) -> Result<Option<PathBuf>> {
    let raw = entry.path_bytes();

    #[cfg(not(windows))]
    if raw.contains(&b'\\') {
        return Err(ShieldError::PathTraversal(format!(
            "backslash in entry path '{}'",
            String::from_utf8_lossy(&raw)
        )));
    }

    let path = entry
        .path()
        .map_err(|e| ShieldError::PathTraversal(format!("unreadable entry path: {e}")))?;
    let normalized = normalize_relative(&path).map_err(|()| {
        ShieldError::PathTraversal(format!("entry '{}' escapes extraction root", path.display()))
    })?;
    if normalized.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(normalized))
}

/// Validate a symlink/hardlink target: it must be relative and, resolved
/// against the entry's parent directory, stay inside the extraction root.
/// Returns the link target exactly as recorded in the archive.
fn validated_link_target<R: Read>(entry: &Entry<'_, R>, entry_rel: &Path) -> Result<PathBuf> {
    let target = entry
        .link_name()
        .map_err(|e| ShieldError::PathTraversal(format!("unreadable link target: {e}")))?
        .ok_or_else(|| {
            ShieldError::PathTraversal(format!(
                "link entry '{}' has no target",
                entry_rel.display()
            ))
        })?;

    if target.is_absolute() || is_drive_lettered(&target) {
        return Err(ShieldError::PathTraversal(format!(
            "link '{}' targets absolute path '{}'",
            entry_rel.display(),
            target.display()
        )));
    }

    let parent = entry_rel.parent().unwrap_or_else(|| Path::new(""));
    let resolved = parent.join(&target);
    if normalize_relative(&resolved).is_err() {
        return Err(ShieldError::PathTraversal(format!(
            "link '{}' escapes extraction root via '{}'",
            entry_rel.display(),
            target.display()
        )));
    }
    Ok(target.into_owned())
}

/// Lexically normalize a path, rejecting absolute roots, drive letters and
/// any walk above the root. `Err(())` means the path escapes.
fn normalize_relative(path: &Path) -> std::result::Result<PathBuf, ()> {
    if path.is_absolute() || is_drive_lettered(path) {
        return Err(());
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(()),
        }
    }
    Ok(out)
}

fn is_drive_lettered(path: &Path) -> bool {
    let s = path.to_string_lossy();
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
