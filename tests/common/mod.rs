//! Shared helpers for MCPShield integration tests

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::Command;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// An isolated project directory plus cache/config roots for one test.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create test dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join("cache")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.path().join("mcp.lock.json")
    }

    pub fn policy_path(&self) -> PathBuf {
        self.path().join("policy.yaml")
    }

    /// Binary command wired to this environment's directories.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("mcpshield").expect("binary builds");
        cmd.current_dir(self.path())
            .env("MCPSHIELD_CACHE_DIR", self.cache_dir())
            .env("MCPSHIELD_CONFIG_DIR", self.path().join("config"))
            .env("NO_COLOR", "1");
        cmd
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        let mut f = File::create(&path).expect("create file");
        f.write_all(content.as_bytes()).expect("write file");
        path
    }
}

/// Build a gzipped tarball from (path, content) pairs.
pub fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    let enc = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(enc);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        {
            let name_bytes = name.as_bytes();
            let gnu = header.as_gnu_mut().expect("gnu header");
            gnu.name[..name_bytes.len()].copy_from_slice(name_bytes);
        }
        header.set_cksum();
        builder
            .append(&header, content.as_bytes())
            .expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Minimal valid lockfile body with one pinned npm artifact.
pub fn lockfile_json(namespace: &str, digest: &str) -> String {
    format!(
        r#"{{
  "version": "1.0.0",
  "generatedAt": "2026-08-01T00:00:00Z",
  "servers": {{
    "{namespace}": {{
      "namespace": "{namespace}",
      "version": "1.0.0",
      "verified": true,
      "verificationMethod": "github",
      "fetchedAt": "2026-08-01T00:00:00Z",
      "artifacts": [
        {{
          "kind": "npm",
          "url": "https://registry.npmjs.org/tool/-/tool-1.0.0.tgz",
          "digest": "{digest}"
        }}
      ]
    }}
  }}
}}
"#
    )
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
