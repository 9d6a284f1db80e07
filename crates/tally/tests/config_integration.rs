//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. Precedence is
//! observed through `info --json`, which reports the resolved release
//! branch.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

fn info_json(dir: &Path) -> serde_json::Value {
    let output = cmd()
        .arg("-C")
        .arg(dir)
        .env("TALLY_LOG_DIR", dir.join(".logs"))
        .args(["--json", "info"])
        .assert()
        .success();
    serde_json::from_slice(&output.get_output().stdout).expect("info --json is JSON")
}

fn release_branch(dir: &Path) -> String {
    info_json(dir)["project"]["release_branch"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join(".git")).unwrap();
    assert_eq!(release_branch(tmp.path()), "main");
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[project]\nrelease_branch = \"trunk\"\n",
    )
    .unwrap();
    assert_eq!(release_branch(tmp.path()), "trunk");
}

#[test]
fn discovers_regular_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("tally.toml"),
        "[project]\nrelease_branch = \"stable\"\n",
    )
    .unwrap();
    assert_eq!(release_branch(tmp.path()), "stable");
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[project]\nrelease_branch = \"trunk\"\n",
    )
    .unwrap();
    assert_eq!(release_branch(&sub_dir), "trunk");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[project]\nrelease_branch = \"dot\"\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("tally.toml"),
        "[project]\nrelease_branch = \"plain\"\n",
    )
    .unwrap();
    assert_eq!(release_branch(tmp.path()), "dot");
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.yaml"),
        "project:\n  release_branch: yaml-branch\n",
    )
    .unwrap();
    assert_eq!(release_branch(tmp.path()), "yaml-branch");
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.json"),
        r#"{"project": {"release_branch": "json-branch"}}"#,
    )
    .unwrap();
    assert_eq!(release_branch(tmp.path()), "json-branch");
}

#[test]
fn task_overrides_reach_info() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[tasks]\ntest = [\"make check\"]\n",
    )
    .unwrap();
    let json = info_json(tmp.path());
    let tasks = json["project"]["tasks"].as_array().unwrap();
    assert!(
        tasks
            .iter()
            .any(|t| t[0] == "test" && t[1] == serde_json::json!(["make check"]))
    );
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("project");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[project]\nrelease_branch = \"outer\"\n",
    )
    .unwrap();
    fs::write(
        sub_dir.join(".tally.toml"),
        "[project]\nrelease_branch = \"inner\"\n",
    )
    .unwrap();
    assert_eq!(release_branch(&sub_dir), "inner");
}

#[test]
fn explicit_config_file_overrides_discovery() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[project]\nrelease_branch = \"discovered\"\n",
    )
    .unwrap();
    let explicit = tmp.path().join("explicit.toml");
    fs::write(&explicit, "[project]\nrelease_branch = \"explicit\"\n").unwrap();

    let output = cmd()
        .arg("-C")
        .arg(tmp.path())
        .arg("--config")
        .arg(&explicit)
        .env("TALLY_LOG_DIR", tmp.path().join(".logs"))
        .args(["--json", "info"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["project"]["release_branch"], "explicit");
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".tally.toml"), "this is not valid toml [[[").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_descriptor_pattern_is_rejected_at_load() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "[project]\ndescriptor_pattern = \"version=([\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pattern"));
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".tally.toml"),
        "log_level = \"info\"\nunknown_field = \"ignored\"\n",
    )
    .unwrap();
    assert_eq!(release_branch(tmp.path()), "main");
}

// =============================================================================
// Boundary Marker Tests
// =============================================================================

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        parent.join(".tally.toml"),
        "[project]\nrelease_branch = \"outside\"\n",
    )
    .unwrap();
    fs::create_dir(repo.join(".git")).unwrap();

    assert_eq!(release_branch(&src), "main");
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(
        repo.join(".tally.toml"),
        "[project]\nrelease_branch = \"repo\"\n",
    )
    .unwrap();

    assert_eq!(release_branch(&src), "repo");
}
