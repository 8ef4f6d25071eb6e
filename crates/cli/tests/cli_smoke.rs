//! CLI smoke tests for tpbuild.
//!
//! These run the binary against empty project roots: argument handling,
//! `clean`, and dry runs. Nothing here needs real build tools.

use std::fs;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// A tpbuild command isolated from the caller's environment.
fn tpbuild_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("tpbuild");
  for var in ["TPBUILD_ROOT", "GCC_ROOT", "FABRIC_SCENE_GRAPH_DIR", "RUST_LOG"] {
    cmd.env_remove(var);
  }
  cmd
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  tpbuild_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"))
    .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn version_flag_works() {
  tpbuild_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("tpbuild"));
}

// =============================================================================
// Target validation
// =============================================================================

#[test]
fn unknown_target_prints_allow_list() {
  let temp = TempDir::new().unwrap();

  tpbuild_cmd()
    .arg("bogus")
    .arg("--root")
    .arg(temp.path())
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Usage"))
    .stderr(predicate::str::contains("unknown target 'bogus'"))
    .stderr(predicate::str::contains("clean, all, zlib"))
    .stderr(predicate::str::contains("opensubdiv"));

  assert!(!temp.path().join("build").exists());
}

#[test]
fn target_names_are_case_sensitive() {
  let temp = TempDir::new().unwrap();

  tpbuild_cmd().arg("TBB").arg("--root").arg(temp.path()).assert().code(1);
}

#[test]
fn missing_root_is_reported() {
  let temp = TempDir::new().unwrap();

  tpbuild_cmd()
    .arg("--dry-run")
    .arg("--root")
    .arg(temp.path().join("nope"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load configuration"));
}

// =============================================================================
// Clean
// =============================================================================

#[test]
fn clean_removes_build_and_stage() {
  let temp = TempDir::new().unwrap();
  let root = temp.path();
  fs::create_dir_all(root.join("build/tbb")).unwrap();
  fs::write(root.join("build/tbb/.tbb.marker"), "done").unwrap();
  fs::create_dir_all(root.join("stage/lib")).unwrap();
  fs::write(root.join("stage/lib/libtbb.a"), "lib").unwrap();
  fs::create_dir_all(root.join("pkgs")).unwrap();
  fs::write(root.join("pkgs/tbb-tbb43u6.tgz"), "archive").unwrap();

  tpbuild_cmd()
    .arg("clean")
    .arg("--root")
    .arg(root)
    .assert()
    .success()
    .stdout(predicate::str::contains("Clean complete"));

  assert!(!root.join("build").exists());
  assert!(!root.join("stage").exists());
  assert!(root.join("pkgs/tbb-tbb43u6.tgz").exists());
}

#[test]
fn clean_on_empty_root_succeeds() {
  let temp = TempDir::new().unwrap();

  tpbuild_cmd()
    .arg("clean")
    .arg("--root")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to clean"));
}

#[test]
fn clean_json_lists_deleted_paths() {
  let temp = TempDir::new().unwrap();
  fs::create_dir_all(temp.path().join("stage/include")).unwrap();

  let output = tpbuild_cmd()
    .args(["clean", "-o", "json", "--root"])
    .arg(temp.path())
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["deleted_paths"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Dry run
// =============================================================================

#[test]
fn dry_run_json_describes_plan_without_side_effects() {
  let temp = TempDir::new().unwrap();

  let output = tpbuild_cmd()
    .args(["ptex", "--dry-run", "-o", "json", "--root"])
    .arg(temp.path())
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["request"], "ptex");
  assert_eq!(json["trigger"], "one-hop");
  let targets = json["targets"].as_array().unwrap();
  assert_eq!(targets.len(), 1);
  assert_eq!(targets[0]["name"], "ptex");
  assert_eq!(targets[0]["status"], "build");
  assert!(!targets[0]["commands"].as_array().unwrap().is_empty());
  let not_selected: Vec<&str> = json["not_selected"]
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v.as_str().unwrap())
    .collect();
  assert!(not_selected.contains(&"zlib"));
  assert!(!temp.path().join("build").exists());
}

#[test]
fn dry_run_transitive_pulls_in_prerequisites() {
  let temp = TempDir::new().unwrap();

  let output = tpbuild_cmd()
    .args(["opensubdiv", "--dry-run", "--transitive", "-o", "json", "--root"])
    .arg(temp.path())
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let names: Vec<&str> = json["targets"]
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["name"].as_str().unwrap())
    .collect();
  assert_eq!(names, vec!["zlib", "tbb", "ptex", "opensubdiv"]);
}

#[test]
fn dry_run_text_marks_completed_targets() {
  let temp = TempDir::new().unwrap();
  fs::create_dir_all(temp.path().join("build/tbb")).unwrap();
  fs::write(temp.path().join("build/tbb/.tbb.marker"), "done").unwrap();

  tpbuild_cmd()
    .args(["opensubdiv", "--dry-run", "--root"])
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("tbb (up to date)"))
    .stdout(predicate::str::contains("To build: 2"));
}
