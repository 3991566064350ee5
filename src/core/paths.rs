//! Shared filesystem paths with test-friendly overrides.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::OnceLock;

#[derive(Default, Debug)]
struct PathOverrides {
    cache_root: Option<PathBuf>,
    config_dir: Option<PathBuf>,
}

static OVERRIDES: OnceLock<RwLock<PathOverrides>> = OnceLock::new();

fn get_overrides() -> &'static RwLock<PathOverrides> {
    OVERRIDES.get_or_init(|| RwLock::new(PathOverrides::default()))
}

/// Set path overrides for testing. Safe and thread-safe.
pub fn set_test_overrides(cache_root: Option<PathBuf>, config_dir: Option<PathBuf>) {
    let mut guard = get_overrides().write();
    guard.cache_root = cache_root;
    guard.config_dir = config_dir;
}

/// Reset all path overrides.
pub fn reset_test_overrides() {
    let mut guard = get_overrides().write();
    *guard = PathOverrides::default();
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn fallback_home_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Content cache root, resolved in priority order:
/// `MCPSHIELD_CACHE_DIR`, `XDG_CACHE_HOME`, the platform cache directory,
/// then `~/.cache`. The subdirectory is always `mcpshield`.
#[must_use]
pub fn cache_root() -> PathBuf {
    {
        let guard = get_overrides().read();
        if let Some(ref root) = guard.cache_root {
            return root.clone();
        }
    }

    if let Some(dir) = env_path("MCPSHIELD_CACHE_DIR") {
        return dir;
    }
    if let Some(xdg) = env_path("XDG_CACHE_HOME") {
        return xdg.join("mcpshield");
    }
    dirs::cache_dir().map_or_else(
        || fallback_home_dir().join(".cache/mcpshield"),
        |d| d.join("mcpshield"),
    )
}

/// Config directory (default: XDG config dir/mcpshield or ~/.config/mcpshield).
#[must_use]
pub fn config_dir() -> PathBuf {
    {
        let guard = get_overrides().read();
        if let Some(ref dir) = guard.config_dir {
            return dir.clone();
        }
    }

    env_path("MCPSHIELD_CONFIG_DIR").unwrap_or_else(|| {
        dirs::config_dir().map_or_else(
            || fallback_home_dir().join(".config/mcpshield"),
            |d| d.join("mcpshield"),
        )
    })
}

/// Lockfile name at the project root.
pub const LOCKFILE_NAME: &str = "mcp.lock.json";

/// Policy file name at the project root.
pub const POLICY_NAME: &str = "policy.yaml";

/// Default lockfile path in the current project directory.
#[must_use]
pub fn default_lockfile_path() -> PathBuf {
    PathBuf::from(LOCKFILE_NAME)
}

/// Default policy path in the current project directory.
#[must_use]
pub fn default_policy_path() -> PathBuf {
    PathBuf::from(POLICY_NAME)
}

/// Identity stamped onto policy-overridden lockfile entries.
/// `MCPSHIELD_APPROVER` wins over the current OS user.
#[must_use]
pub fn approver_identity() -> String {
    std::env::var("MCPSHIELD_APPROVER")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| whoami::username().unwrap_or_else(|_| "unknown".to_string()))
}
