//! CLI smoke tests for relmatrix.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the relmatrix binary.
fn relmatrix_cmd() -> Command {
  cargo_bin_cmd!("relmatrix")
}

/// Create a temp directory with a matrix file.
fn temp_matrix(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("matrix.toml"), content).unwrap();
  temp
}

/// A matrix with one target per supported platform.
const FULL_MATRIX: &str = r#"
[[target]]
os = "linux"
artifact = "libnative.so"
script = "build.sh"
requires = ["clang>=11"]

[[target]]
os = "macos"
arch = "arm64"
artifact = "libnative.dylib"
script = "build.sh"
args = ["--arch", "arm64"]

[[target]]
os = "windows"
artifact = "native.dll"
script = "build.bat"
requires = ["windows:nasm"]
"#;

/// A matrix whose only target succeeds trivially on linux hosts.
#[cfg(target_os = "linux")]
const TOUCH_MATRIX: &str = r#"
[[target]]
os = "linux"
artifact = "out.bin"
script = "sh"
args = ["-c", "touch out.bin"]
"#;

#[cfg(target_os = "linux")]
const FAILING_MATRIX: &str = r#"
[[target]]
os = "linux"
artifact = "out.bin"
script = "sh"
args = ["-c", "exit 1"]
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  relmatrix_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  relmatrix_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("relmatrix"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["run", "plan", "validate"] {
    relmatrix_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Validate
// =============================================================================

#[test]
fn validate_accepts_well_formed_matrix() {
  let temp = temp_matrix(FULL_MATRIX);
  relmatrix_cmd()
    .current_dir(temp.path())
    .arg("validate")
    .assert()
    .success()
    .stdout(predicate::str::contains("3 targets"));
}

#[test]
fn validate_rejects_duplicate_artifacts() {
  let temp = temp_matrix(
    r#"
[[target]]
os = "linux"
artifact = "same.so"
script = "build.sh"

[[target]]
os = "macos"
artifact = "same.so"
script = "build.sh"
"#,
  );
  relmatrix_cmd()
    .current_dir(temp.path())
    .arg("validate")
    .assert()
    .failure()
    .stderr(predicate::str::contains("same.so"));
}

#[test]
fn validate_reports_missing_file() {
  let temp = TempDir::new().unwrap();
  relmatrix_cmd()
    .current_dir(temp.path())
    .arg("validate")
    .assert()
    .failure();
}

// =============================================================================
// Plan
// =============================================================================

#[test]
fn plan_lists_every_target() {
  let temp = temp_matrix(FULL_MATRIX);
  relmatrix_cmd()
    .current_dir(temp.path())
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("libnative.so"))
    .stdout(predicate::str::contains("libnative.dylib"))
    .stdout(predicate::str::contains("native.dll"))
    .stdout(predicate::str::contains("macos/arm64"));
}

#[test]
fn plan_emits_json() {
  let temp = temp_matrix(FULL_MATRIX);
  let output = relmatrix_cmd()
    .current_dir(temp.path())
    .args(["plan", "--format", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let entries: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(entries.as_array().unwrap().len(), 3);
  assert_eq!(entries[0]["artifact"], "libnative.so");
}

// =============================================================================
// Run
// =============================================================================

#[cfg(target_os = "linux")]
#[test]
fn run_with_skip_publish_succeeds() {
  let temp = temp_matrix(TOUCH_MATRIX);
  relmatrix_cmd()
    .current_dir(temp.path())
    .args(["run", "v1.0.0", "--skip-publish", "--no-install"])
    .assert()
    .success()
    .stdout(predicate::str::contains("out.bin"));
  assert!(temp.path().join("out.bin").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn run_exits_nonzero_on_build_failure() {
  let temp = temp_matrix(FAILING_MATRIX);
  relmatrix_cmd()
    .current_dir(temp.path())
    .args(["run", "v1.0.0", "--skip-publish", "--no-install"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("build failed"));
}

#[cfg(target_os = "linux")]
#[test]
fn run_emits_json_report() {
  let temp = temp_matrix(TOUCH_MATRIX);
  let output = relmatrix_cmd()
    .current_dir(temp.path())
    .args(["run", "v1.0.0", "--skip-publish", "--no-install", "--format", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(report["outcomes"][0]["status"], "succeeded");
}

#[cfg(target_os = "linux")]
#[test]
fn run_logs_progress_when_enabled() {
  let temp = temp_matrix(TOUCH_MATRIX);
  relmatrix_cmd()
    .current_dir(temp.path())
    .env("RUST_LOG", "info")
    .args(["run", "v1.0.0", "--skip-publish", "--no-install"])
    .assert()
    .success()
    .stderr(predicate::str::contains("matrix loaded"))
    .stderr(predicate::str::contains("starting run"));
}

#[test]
fn run_without_repo_or_token_fails_cleanly() {
  let temp = temp_matrix(FULL_MATRIX);
  relmatrix_cmd()
    .current_dir(temp.path())
    .env_remove("RELMATRIX_REPO")
    .env_remove("GITHUB_REPOSITORY")
    .env_remove("RELMATRIX_TOKEN")
    .env_remove("GITHUB_TOKEN")
    .args(["run", "v1.0.0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("repo").or(predicate::str::contains("credential")));
}
