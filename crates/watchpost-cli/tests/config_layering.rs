//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: hardcoded defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use watchpost_test_support::SyntheticFrameBuilder;

fn watchpost(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("watchpost").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env_remove("RUST_LOG")
        .current_dir(home);
    cmd
}

fn still_frames(n: usize) -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    let frames = temp.path().join("frames");
    fs::create_dir(&frames).unwrap();
    SyntheticFrameBuilder::write_png_sequence(&frames, &SyntheticFrameBuilder::still_sequence(n, 16, 16))
        .unwrap();
    temp
}

fn write_xdg(home: &Path, toml: &str) {
    let dir = home.join("xdg/watchpost");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), toml).unwrap();
}

fn write_project(dir: &Path, toml: &str) {
    fs::write(dir.join(".watchpost.toml"), toml).unwrap();
}

#[test]
fn test_project_config_applies_format() {
    let temp = still_frames(2);
    write_project(temp.path(), "[output]\nformat = 'json'\n");

    watchpost(temp.path())
        .arg("frames")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_cli_overrides_project_config() {
    let temp = still_frames(2);
    write_project(temp.path(), "[output]\nformat = 'json'\n");

    // jsonl without alerts prints nothing at all.
    watchpost(temp.path())
        .args(["--format", "jsonl", "frames"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_xdg_config_applies() {
    let temp = still_frames(2);
    write_xdg(temp.path(), "[output]\nformat = 'json'\n");

    watchpost(temp.path())
        .arg("frames")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_project_config_overrides_xdg() {
    let temp = still_frames(2);
    write_xdg(temp.path(), "[output]\nformat = 'json'\n");
    write_project(temp.path(), "[output]\nformat = 'jsonl'\n");

    watchpost(temp.path())
        .arg("frames")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_project_config_found_in_parent_dir() {
    let temp = still_frames(2);
    write_project(temp.path(), "[output]\nformat = 'json'\n");
    let nested = temp.path().join("nested/deeper");
    fs::create_dir_all(&nested).unwrap();

    watchpost(temp.path())
        .current_dir(&nested)
        .arg(temp.path().join("frames"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_config_values_merge_across_files() {
    let temp = still_frames(4);
    write_xdg(temp.path(), "[general]\nfps = 2.0\n");
    write_project(temp.path(), "[output]\nformat = 'json'\nresults = true\n");

    let output = watchpost(temp.path()).arg("frames").output().unwrap();
    assert!(output.status.success());

    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    let frames = doc["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 4);
    // fps from XDG: frame 3 lands at 1.5s.
    assert_eq!(frames[3]["timestamp"]["elapsed_secs"], 1.5);
}

#[test]
fn test_config_max_frames() {
    let temp = still_frames(5);
    write_project(temp.path(), "[general]\nmax_frames = 2\n");

    watchpost(temp.path())
        .arg("frames")
        .assert()
        .success()
        .stderr(predicate::str::contains("Done: 2 frames processed"));
}

#[test]
fn test_invalid_config_value_rejected() {
    let temp = still_frames(1);
    write_project(temp.path(), "[anomaly]\nstart_hour = 25\n");

    watchpost(temp.path())
        .arg("frames")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid config"))
        .stderr(predicate::str::contains("anomaly.start_hour"));
}

#[test]
fn test_invalid_format_in_config_rejected() {
    let temp = still_frames(1);
    write_project(temp.path(), "[output]\nformat = 'xml'\n");

    watchpost(temp.path())
        .arg("frames")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("output.format"));
}

#[test]
fn test_unparseable_config_is_skipped() {
    let temp = still_frames(1);
    write_project(temp.path(), "this is not toml = = =");

    watchpost(temp.path()).arg("frames").assert().success();
}

#[test]
fn test_detector_disabled_in_config() {
    let temp = tempfile::tempdir().unwrap();
    write_project(temp.path(), "[anomaly]\nenabled = false\n");

    let output = watchpost(temp.path())
        .args(["detectors", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let listing: Value = serde_json::from_slice(&output.stdout).unwrap();
    let anomaly = listing
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["id"] == "anomaly_detector")
        .unwrap();
    assert_eq!(anomaly["enabled"], false);
}

#[test]
fn test_alert_settings_from_config() {
    let temp = tempfile::tempdir().unwrap();
    write_project(
        temp.path(),
        "[altercation]\nsustain_secs = 3.0\ncooldown_secs = 12.5\n",
    );

    let output = watchpost(temp.path())
        .args(["detectors", "--json"])
        .output()
        .unwrap();
    let listing: Value = serde_json::from_slice(&output.stdout).unwrap();
    let altercation = listing
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["id"] == "altercation_detector")
        .unwrap();
    assert_eq!(altercation["sustain_secs"], 3.0);
    assert_eq!(altercation["cooldown_secs"], 12.5);
}
