//! Shared HTTP client utilities
//!
//! Centralizes reqwest client configuration for connection pooling
//! and consistent timeouts across the codebase. Timeouts are
//! per-call and overridable via `MCPSHIELD_CONNECT_TIMEOUT_MS` and
//! `MCPSHIELD_REQUEST_TIMEOUT_MS`; retries are left to callers.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use reqwest::redirect::Policy;

use crate::core::error::{Result, ShieldError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Default cap on redirects followed during artifact downloads.
/// Configurable via the `max_redirects` settings field.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

static SHARED_CLIENT: LazyLock<Client> =
    LazyLock::new(|| build_client(request_timeout(DEFAULT_TIMEOUT), connect_timeout(), None));

// One download client per configured redirect cap; in practice a process
// only ever uses one. `Client` clones share the connection pool.
static DOWNLOAD_CLIENTS: LazyLock<Mutex<HashMap<usize, Client>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn env_millis(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn connect_timeout() -> Duration {
    env_millis("MCPSHIELD_CONNECT_TIMEOUT_MS").unwrap_or(DEFAULT_CONNECT_TIMEOUT)
}

fn request_timeout(default: Duration) -> Duration {
    env_millis("MCPSHIELD_REQUEST_TIMEOUT_MS").unwrap_or(default)
}

/// Build HTTP client with standard configuration.
///
/// This function uses `.expect()` because:
/// 1. All configuration values are static and known-valid
/// 2. Building can only fail with TLS backend issues (extremely rare)
/// 3. If this fails, the application cannot function at all
///
/// # Panics
/// Panics if the HTTP client cannot be built, which should only happen with:
/// - Missing TLS certificates (system misconfiguration)
/// - Incompatible TLS backend (build issue)
#[allow(clippy::expect_used)] // System misconfiguration or build issue; panics documented above
fn build_client(timeout: Duration, connect_timeout: Duration, max_redirects: Option<usize>) -> Client {
    let redirect = max_redirects.map_or_else(Policy::default, Policy::limited);
    Client::builder()
        .user_agent(concat!("mcpshield/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .redirect(redirect)
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to build HTTP client - check TLS configuration")
}

/// Shared default HTTP client for registry metadata calls.
#[must_use]
pub fn shared_client() -> &'static Client {
    &SHARED_CLIENT
}

/// Shared HTTP client with extended timeouts for artifact downloads,
/// following at most `max_redirects` redirects.
#[must_use]
pub fn download_client(max_redirects: usize) -> Client {
    let mut clients = DOWNLOAD_CLIENTS.lock();
    clients
        .entry(max_redirects)
        .or_insert_with(|| {
            build_client(
                request_timeout(DOWNLOAD_TIMEOUT),
                connect_timeout(),
                Some(max_redirects),
            )
        })
        .clone()
}

/// Refuse a network entry point while in offline mode.
///
/// Every function that would open a connection calls this first so that
/// offline runs fail fast with a distinct error kind instead of timing out.
pub fn ensure_online(offline: bool, what: &str) -> Result<()> {
    if offline {
        return Err(ShieldError::Offline(format!(
            "network access required for {what}"
        )));
    }
    Ok(())
}
