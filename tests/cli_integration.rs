//! Integration tests for the MCPShield CLI
//!
//! Everything here runs hermetically: cache and config roots point into a
//! per-test temp directory and no test touches the network.

mod common;

use common::*;
use predicates::prelude::*;

#[test]
fn test_help_command() {
    // ===== ARRANGE =====
    let env = TestEnv::new();

    // ===== ACT / ASSERT =====
    env.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mcpshield"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("verify"));
}

#[test]
fn test_version_command() {
    let env = TestEnv::new();
    env.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mcpshield"));
}

#[test]
fn test_add_rejects_malformed_namespace() {
    // ===== ARRANGE =====
    let env = TestEnv::new();

    // ===== ACT =====
    let assert = env
        .cmd()
        .args(["add", "Not A Namespace", "--non-interactive"])
        .assert();

    // ===== ASSERT =====
    assert
        .code(2)
        .stderr(predicate::str::contains("not a valid namespace"));
    assert!(!env.lockfile_path().exists());
}

#[test]
fn test_scan_without_lockfile_is_user_error() {
    let env = TestEnv::new();
    env.cmd()
        .arg("scan")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no lockfile"));
}

#[test]
fn test_scan_offline_cache_miss_exits_2() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    env.write_file(
        "mcp.lock.json",
        &lockfile_json("io.github.owner/tool", "sha512-AAAA"),
    );

    // ===== ACT =====
    let output = env
        .cmd()
        .args(["--json", "scan", "--offline"])
        .output()
        .expect("run scan");

    // ===== ASSERT =====
    assert_eq!(output.status.code(), Some(2));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("OFFLINE_CACHE_MISS"), "stdout: {stdout}");
    assert!(stdout.contains("\"unknown\""));
}

#[test]
fn test_verify_offline_cache_miss_exits_2() {
    let env = TestEnv::new();
    env.write_file(
        "mcp.lock.json",
        &lockfile_json("io.github.owner/tool", "sha512-AAAA"),
    );
    env.cmd()
        .args(["verify", "--offline"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("cache miss"));
}

#[test]
fn test_corrupt_lockfile_is_user_error() {
    let env = TestEnv::new();
    env.write_file("mcp.lock.json", "{ not json");
    env.cmd().arg("scan").assert().code(2);
}

#[test]
fn test_remove_unknown_server_is_user_error() {
    let env = TestEnv::new();
    env.cmd()
        .args(["remove", "io.github.owner/tool"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not pinned"));
}

#[test]
fn test_remove_pinned_server() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    env.write_file(
        "mcp.lock.json",
        &lockfile_json("io.github.owner/tool", "sha512-AAAA"),
    );

    // ===== ACT =====
    env.cmd()
        .args(["remove", "io.github.owner/tool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));

    // ===== ASSERT =====
    let raw = std::fs::read_to_string(env.lockfile_path()).expect("lockfile still present");
    assert!(!raw.contains("io.github.owner/tool"));
    assert!(raw.ends_with('\n'));
}

#[test]
fn test_list_empty_and_populated() {
    let env = TestEnv::new();
    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no servers pinned"));

    env.write_file(
        "mcp.lock.json",
        &lockfile_json("io.github.owner/tool", "sha512-AAAA"),
    );
    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("io.github.owner/tool"));
}

#[test]
fn test_validate_reports_valid_documents() {
    let env = TestEnv::new();
    env.write_file(
        "mcp.lock.json",
        &lockfile_json("io.github.owner/tool", "sha512-AAAA"),
    );
    env.write_file(
        "policy.yaml",
        "version: \"1.0\"\nglobal:\n  denyUnverified: true\n",
    );
    env.cmd()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("lockfile: valid"))
        .stdout(predicate::str::contains("policy: valid"));
}

#[test]
fn test_validate_rejects_unknown_policy_keys() {
    let env = TestEnv::new();
    env.write_file("policy.yaml", "version: \"1.0\"\nsurprise: true\n");
    env.cmd()
        .arg("validate")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("policy: invalid"));
}

#[test]
fn test_validate_json_envelope() {
    // ===== ARRANGE =====
    let env = TestEnv::new();

    // ===== ACT =====
    let output = env
        .cmd()
        .args(["--json", "validate"])
        .output()
        .expect("run validate");

    // ===== ASSERT =====
    let value: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("valid JSON report");
    assert_eq!(value["tool"], "mcpshield");
    assert_eq!(value["command"], "validate");
    assert!(value["generatedAt"].as_str().unwrap_or("").contains('T'));
}

#[test]
fn test_doctor_reports_environment() {
    let env = TestEnv::new();
    env.cmd()
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("cache"))
        .stdout(predicate::str::contains("registry"));
}

#[test]
fn test_cache_info_cleanup_purge() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    std::fs::create_dir_all(env.cache_dir().join("ab")).expect("mk shard");
    std::fs::write(env.cache_dir().join("ab/sha256-abcd"), b"bytes").expect("seed cache");

    // ===== ACT / ASSERT =====
    env.cmd()
        .args(["cache", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 file(s)"));

    env.cmd()
        .args(["cache", "cleanup", "--max-age-days", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 1"));

    env.cmd().args(["cache", "purge", "-y"]).assert().success();
    assert!(!env.cache_dir().exists());
}

#[test]
fn test_config_init_show_round_trip() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    let config_path = env.path().join("config/config.toml");

    // ===== ACT =====
    env.cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    // ===== ASSERT =====
    let raw = std::fs::read_to_string(&config_path).expect("config written");
    assert!(raw.contains("registry_url"));
    assert!(raw.contains("max_redirects"));

    env.cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registry_url"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    env.cmd().args(["config", "init"]).assert().success();

    // ===== ACT / ASSERT =====
    env.cmd()
        .args(["config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    env.cmd()
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_reflects_file_settings() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    std::fs::create_dir_all(env.path().join("config")).expect("mk config dir");
    std::fs::write(
        env.path().join("config/config.toml"),
        "max_redirects = 2\n",
    )
    .expect("write config");

    // ===== ACT =====
    let output = env
        .cmd()
        .args(["--json", "config", "show"])
        .output()
        .expect("run config show");

    // ===== ASSERT =====
    let value: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("valid JSON");
    assert_eq!(value["max_redirects"], 2);
}

#[test]
fn test_policy_block_surfaces_reason_code() {
    // Scan with an enforced policy that denylists the pinned namespace.
    // The artifact is cached so no network is needed.

    // ===== ARRANGE =====
    let env = TestEnv::new();
    let bytes = tarball(&[
        ("package/package.json", r#"{"name":"tool","version":"1.0.0"}"#),
        ("package/index.js", "module.exports = 1;\n"),
    ]);
    let digest = seed_cache(&env, &bytes);
    env.write_file("mcp.lock.json", &lockfile_json("io.github.owner/tool", &digest));
    env.write_file(
        "policy.yaml",
        "version: \"1.0\"\nglobal:\n  denyNamespaces:\n    - \"io.github.owner/*\"\n",
    );

    // ===== ACT =====
    let output = env
        .cmd()
        .args(["--json", "scan", "--enforce", "--offline"])
        .output()
        .expect("run scan");

    // ===== ASSERT =====
    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("DENYLIST"), "stdout: {stdout}");
}

#[test]
fn test_scan_offline_with_cached_artifact_succeeds() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    let bytes = tarball(&[
        ("package/package.json", r#"{"name":"tool","version":"1.0.0"}"#),
        ("package/index.js", "module.exports = 1;\n"),
    ]);
    let digest = seed_cache(&env, &bytes);
    env.write_file("mcp.lock.json", &lockfile_json("io.github.owner/tool", &digest));

    // ===== ACT =====
    let output = env
        .cmd()
        .args(["--json", "scan", "--offline"])
        .output()
        .expect("run scan");

    // ===== ASSERT =====
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr_of(&output));
    let value: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("valid JSON");
    assert_eq!(value["summary"]["servers"], 1);
    assert_eq!(value["servers"][0]["verdict"], "clean");
}

#[test]
fn test_scan_writes_sarif_document() {
    // ===== ARRANGE =====
    let env = TestEnv::new();
    let bytes = tarball(&[
        ("package/package.json", r#"{"name":"tool","version":"1.0.0"}"#),
        ("package/index.js", "const cp = require('child_process');\n"),
    ]);
    let digest = seed_cache(&env, &bytes);
    env.write_file("mcp.lock.json", &lockfile_json("io.github.owner/tool", &digest));
    let sarif_path = env.path().join("scan.sarif");

    // ===== ACT =====
    env.cmd()
        .args(["scan", "--offline", "--sarif"])
        .arg(&sarif_path)
        .assert()
        .success();

    // ===== ASSERT =====
    let raw = std::fs::read_to_string(&sarif_path).expect("sarif written");
    let sarif: serde_json::Value = serde_json::from_str(&raw).expect("valid sarif json");
    assert_eq!(sarif["version"], "2.1.0");
    let results = sarif["runs"][0]["results"].as_array().expect("results");
    assert!(!results.is_empty());
    let fp = results[0]["partialFingerprints"]["mcpshield/finding/v1"]
        .as_str()
        .expect("fingerprint");
    assert_eq!(fp.len(), 16);
}

/// Hash a tarball, drop it into the env's cache, return the digest.
fn seed_cache(env: &TestEnv, bytes: &[u8]) -> String {
    use mcpshield_lib::core::ContentCache;
    use mcpshield_lib::core::digest::{Algorithm, compute};

    let staged = env.path().join("staged.tgz");
    std::fs::write(&staged, bytes).expect("stage artifact");
    let digest = compute(&staged, Algorithm::Sha512).expect("hash artifact");
    ContentCache::at(env.cache_dir())
        .put(&digest, &staged)
        .expect("seed cache");
    std::fs::remove_file(&staged).expect("drop staged artifact");
    digest
}
