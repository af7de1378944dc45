//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. `info --json`
//! reports the effective configuration, so each test checks which file won.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("SHIPGATE_LOG_DIR", std::env::temp_dir().join("shipgate-test-logs"))
        .env_remove("RUST_LOG")
        .args(["-C", dir.to_str().unwrap()]);
    cmd
}

fn effective_config(dir: &Path) -> serde_json::Value {
    let output = cmd(dir).args(["info", "--json"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    json["config"].clone()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = effective_config(tmp.path());
    assert!(config.get("config_file").is_none());
    assert_eq!(config["releasable_branch_regex"], "master|release/.+");
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.toml"),
        "[release]\nreleasable_branch_regex = \"main\"\n",
    )
    .unwrap();

    let config = effective_config(tmp.path());
    assert_eq!(config["releasable_branch_regex"], "main");
    assert!(config["config_file"].as_str().unwrap().ends_with(".shipgate.toml"));
}

#[test]
fn discovers_regular_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("shipgate.toml"), "log_level = \"warn\"\n").unwrap();

    assert_eq!(effective_config(tmp.path())["log_level"], "warn");
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join(".shipgate.toml"),
        "[github]\nrepositories = [\"mockito/shipkit\"]\n",
    )
    .unwrap();

    let config = effective_config(&sub_dir);
    assert_eq!(config["repositories"][0], "mockito/shipkit");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = \"debug\"\n").unwrap();
    fs::write(tmp.path().join("shipgate.toml"), "log_level = \"error\"\n").unwrap();

    assert_eq!(effective_config(tmp.path())["log_level"], "debug");
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.yaml"),
        "release:\n  skip_compare_publications: true\n",
    )
    .unwrap();

    assert_eq!(effective_config(tmp.path())["skip_compare_publications"], true);
}

#[test]
fn parses_yml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.yml"),
        "contributors:\n  output_file: out/all.json\n",
    )
    .unwrap();

    assert_eq!(effective_config(tmp.path())["contributors_file"], "out/all.json");
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.json"),
        r#"{"github": {"api_url": "https://github.example.com/api/v3"}}"#,
    )
    .unwrap();

    assert_eq!(
        effective_config(tmp.path())["api_url"],
        "https://github.example.com/api/v3"
    );
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("sub");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = \"error\"\n").unwrap();
    fs::write(sub_dir.join(".shipgate.toml"), "log_level = \"debug\"\n").unwrap();

    assert_eq!(effective_config(&sub_dir)["log_level"], "debug");
}

#[test]
fn toml_preferred_over_yaml_in_same_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = \"warn\"\n").unwrap();
    fs::write(tmp.path().join(".shipgate.yaml"), "log_level: error\n").unwrap();

    assert_eq!(effective_config(tmp.path())["log_level"], "warn");
}

#[test]
fn explicit_config_flag_overrides_discovery() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = \"warn\"\n").unwrap();
    let explicit = tmp.path().join("ci.toml");
    fs::write(&explicit, "log_level = \"error\"\n").unwrap();

    let output = cmd(tmp.path())
        .args(["--config", explicit.to_str().unwrap(), "info", "--json"])
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["config"]["log_level"], "error");
}

// =============================================================================
// Invalid Config
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = [unterminated").unwrap();

    cmd(tmp.path())
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".shipgate.json"), "{ \"log_level\": ").unwrap();

    cmd(tmp.path()).arg("info").assert().failure();
}

#[test]
fn malformed_repository_in_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.toml"),
        "[github]\nrepositories = [\"https://example.com\"]\n",
    )
    .unwrap();

    cmd(tmp.path())
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.toml"),
        "log_level = \"warn\"\nunknown_field = \"ignored\"\n",
    )
    .unwrap();

    assert_eq!(effective_config(tmp.path())["log_level"], "warn");
}

#[test]
fn token_in_config_is_never_printed() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".shipgate.toml"),
        "[github]\nread_only_auth_token = \"ghp_do_not_print\"\n",
    )
    .unwrap();

    cmd(tmp.path())
        .args(["info", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ghp_do_not_print").not())
        .stdout(predicate::str::contains("\"token_configured\": true"));
}

// =============================================================================
// Git Boundary
// =============================================================================

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let work = repo.join("work");
    fs::create_dir_all(&work).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = \"error\"\n").unwrap();

    assert_eq!(effective_config(&work)["log_level"], "info");
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join(".git")).unwrap();
    fs::write(tmp.path().join(".shipgate.toml"), "log_level = \"warn\"\n").unwrap();

    assert_eq!(effective_config(tmp.path())["log_level"], "warn");
}
