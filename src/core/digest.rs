//! Streaming digest engine
//!
//! Digests are canonical strings `"<algo>-<base64>"` used on the wire and in
//! the lockfile. Files are hashed through a fixed-size buffer; the whole
//! artifact is never resident in memory.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest as _, Sha256, Sha512};

use crate::core::error::{Result, ShieldError};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Hash algorithm selected by the digest prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    /// Parse the leading token of a canonical digest (`sha256` or `sha512`).
    pub fn from_prefix(digest: &str) -> Result<Self> {
        match digest.split('-').next() {
            Some("sha256") => Ok(Self::Sha256),
            Some("sha512") => Ok(Self::Sha512),
            _ => Err(ShieldError::User(format!(
                "unrecognized digest algorithm in '{digest}'"
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// Result of comparing a file against an expected digest.
#[derive(Debug, Clone)]
pub struct DigestCheck {
    pub valid: bool,
    pub actual: String,
}

/// Incremental hasher that accumulates streamed chunks into a canonical digest.
///
/// Used by the download path to hash bytes as they arrive.
pub struct StreamingHasher {
    algo: Algorithm,
    state: HasherState,
}

enum HasherState {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl StreamingHasher {
    #[must_use]
    pub fn new(algo: Algorithm) -> Self {
        let state = match algo {
            Algorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            Algorithm::Sha512 => HasherState::Sha512(Sha512::new()),
        };
        Self { algo, state }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(h) => h.update(chunk),
            HasherState::Sha512(h) => h.update(chunk),
        }
    }

    /// Finish hashing and emit the canonical `"<algo>-<base64>"` digest.
    #[must_use]
    pub fn finalize(self) -> String {
        let raw = match self.state {
            HasherState::Sha256(h) => h.finalize().to_vec(),
            HasherState::Sha512(h) => h.finalize().to_vec(),
        };
        format!("{}-{}", self.algo, BASE64.encode(raw))
    }
}

/// Stream a file through the selected hash and emit the canonical digest.
pub fn compute(path: &Path, algo: Algorithm) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = StreamingHasher::new(algo);
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Compute over the file with the algorithm named by `expected`, then compare.
pub fn verify(path: &Path, expected: &str) -> Result<DigestCheck> {
    let algo = Algorithm::from_prefix(expected)?;
    let actual = compute(path, algo)?;
    Ok(DigestCheck {
        valid: actual == expected,
        actual,
    })
}

/// Human-readable drift report for a pinned artifact whose bytes changed.
#[must_use]
pub fn drift_report(namespace: &str, pinned: &str, actual: &str, url: &str) -> String {
    format!(
        "Drift detected for {namespace}\n  url:      {url}\n  pinned:   {pinned}\n  actual:   {actual}\n\n\
         The upstream artifact no longer matches the approved digest. Review the\n\
         change before re-approving with `mcpshield add`."
    )
}
