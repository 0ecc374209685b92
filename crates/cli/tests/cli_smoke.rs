//! CLI smoke tests for linscript.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the linscript binary.
fn linscript_cmd() -> Command {
  cargo_bin_cmd!("linscript")
}

/// Create a temp directory with a resources.json file.
fn temp_resources(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("resources.json"), content).unwrap();
  temp
}

/// A resource file managing one file in the given directory.
fn managed_file_config(dir: &std::path::Path) -> String {
  let target = dir.join("managed.txt");
  let target = target.to_str().unwrap();
  format!(
    r#"{{
      "resources": {{
        "managed": {{
          "lifecycle_commands": {{
            "create": "printf created > {target}",
            "read": "cat {target}",
            "delete": "rm -f {target}"
          }}
        }}
      }}
    }}"#
  )
}

#[test]
fn help_flag_works() {
  linscript_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  linscript_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("linscript"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["apply", "plan", "destroy", "status"] {
    linscript_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn status_with_empty_state_is_fine() {
  let temp = TempDir::new().unwrap();
  linscript_cmd()
    .arg("status")
    .arg("--state-dir")
    .arg(temp.path().join("state"))
    .assert()
    .success()
    .stdout(predicate::str::contains("No resources in state"));
}

#[test]
fn apply_with_missing_file_fails() {
  let temp = TempDir::new().unwrap();
  linscript_cmd()
    .arg("apply")
    .arg(temp.path().join("nonexistent.json"))
    .arg("--state-dir")
    .arg(temp.path().join("state"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to read resource file"));
}

#[test]
fn apply_with_invalid_json_fails() {
  let temp = temp_resources("{ not json");
  linscript_cmd()
    .arg("apply")
    .arg(temp.path().join("resources.json"))
    .arg("--state-dir")
    .arg(temp.path().join("state"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("failed to parse resource file"));
}

#[cfg(unix)]
#[test]
fn apply_plan_status_destroy_round_trip() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("resources.json"), managed_file_config(temp.path())).unwrap();
  let file = temp.path().join("resources.json");
  let state_dir = temp.path().join("state");

  linscript_cmd()
    .arg("plan")
    .arg(&file)
    .arg("--state-dir")
    .arg(&state_dir)
    .assert()
    .success()
    .stdout(predicate::str::contains("create"));

  linscript_cmd()
    .arg("apply")
    .arg(&file)
    .arg("--state-dir")
    .arg(&state_dir)
    .assert()
    .success()
    .stdout(predicate::str::contains("Apply complete"));
  assert!(temp.path().join("managed.txt").exists());

  linscript_cmd()
    .arg("status")
    .arg("--state-dir")
    .arg(&state_dir)
    .assert()
    .success()
    .stdout(predicate::str::contains("managed"));

  linscript_cmd()
    .arg("plan")
    .arg(&file)
    .arg("--state-dir")
    .arg(&state_dir)
    .assert()
    .success()
    .stdout(predicate::str::contains("refresh"));

  linscript_cmd()
    .arg("destroy")
    .arg(&file)
    .arg("--state-dir")
    .arg(&state_dir)
    .assert()
    .success()
    .stdout(predicate::str::contains("Destroy complete"));
  assert!(!temp.path().join("managed.txt").exists());
}

#[cfg(unix)]
#[test]
fn state_dir_env_var_is_honored() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("resources.json"), managed_file_config(temp.path())).unwrap();
  let state_dir = temp.path().join("env-state");

  linscript_cmd()
    .arg("apply")
    .arg(temp.path().join("resources.json"))
    .env("LINSCRIPT_STATE_DIR", &state_dir)
    .assert()
    .success();

  assert!(state_dir.join("managed").join("state.json").exists());
}
