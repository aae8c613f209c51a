//! CLI tests for `converge update`, `plan` and `get-assets`.
//!
//! Spawns the converge binary and verifies exit codes and stdout. Engine
//! runs use a small `sh` script configured through `--config`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use converge::exit_codes;
use converge::io::cluster_store::{FsClusterStore, write_cluster};
use converge::io::config::{DriverConfig, write_config};
use converge::test_support::cluster;

const NAME: &str = "k8s.example.com";

fn converge(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_converge"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run converge")
}

/// Config whose engine runs `script` under `sh`, with a seeded state dir.
fn setup(temp: &Path, script: &str) -> PathBuf {
    let state_dir = temp.join("state");
    write_cluster(&FsClusterStore::new(&state_dir), &cluster(NAME)).expect("write cluster");

    let mut cfg = DriverConfig {
        state_dir,
        ..DriverConfig::default()
    };
    cfg.engine.command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    cfg.kubectl.command = "false".to_string();
    let path = temp.join("config.toml");
    write_config(&path, &cfg).expect("write config");
    path
}

#[test]
fn unknown_phase_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = converge(
        &temp.path().join("missing.toml"),
        &["update", NAME, "--phase", "bogus"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("available phases: network,security,cluster"), "{stderr}");
}

#[test]
fn admin_and_user_together_exit_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = converge(
        &temp.path().join("missing.toml"),
        &["update", NAME, "--yes", "--admin", "--user", "bob"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot use both --admin and --user"));
}

#[test]
fn plan_prints_resolved_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = converge(
        &temp.path().join("missing.toml"),
        &["plan", NAME, "--target", "terraform", "--phase", "IAM"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).expect("plan json");
    assert_eq!(plan["mode"], "apply");
    assert_eq!(plan["backend"], "terraform");
    assert_eq!(plan["phase"], "security");
    assert_eq!(plan["out_dir"], "out/terraform");
}

#[cfg(unix)]
#[test]
fn dry_run_update_reports_pending_changes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = setup(
        temp.path(),
        r#"cat >/dev/null; printf '{"backend":"dryrun","has_pending_changes":true}'"#,
    );
    let output = converge(&config, &["update", NAME]);
    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Must specify --yes to apply changes\n"
    );
}

#[cfg(unix)]
#[test]
fn engine_failure_exits_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = setup(
        temp.path(),
        "cat >/dev/null; echo 'rate limited by cloud API' >&2; exit 3",
    );
    let output = converge(&config, &["update", NAME]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rate limited by cloud API"));
    assert!(output.stdout.is_empty());
}

#[cfg(unix)]
#[test]
fn get_assets_prints_assets_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = setup(
        temp.path(),
        r#"cat >/dev/null; printf '{"backend":"dryrun","image_assets":[{"download_location":"registry.k8s.io/pause:3.9"}]}'"#,
    );
    let output = converge(&config, &["get-assets", NAME]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let assets: serde_json::Value = serde_json::from_slice(&output.stdout).expect("assets json");
    assert_eq!(
        assets["image_assets"][0]["download_location"],
        "registry.k8s.io/pause:3.9"
    );
    assert_eq!(assets["file_assets"], serde_json::json!([]));
}

#[test]
fn missing_cluster_exits_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let state = temp.path().join("empty-state");
    fs::create_dir_all(&state).expect("mkdir");
    let output = converge(
        &temp.path().join("missing.toml"),
        &["update", NAME, "--state", state.to_str().expect("utf8 path")],
    );
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
