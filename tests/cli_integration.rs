//! CLI integration tests for Slipway.
//!
//! These tests exercise the full CLI workflow: scaffolding a manifest,
//! planning and validating a matrix, and running pipelines end to end.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the slipway binary command.
fn slipway() -> Command {
    Command::cargo_bin("slipway").unwrap()
}

/// Create a temporary directory for test pipelines.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

/// Write a Slipway.toml into the directory.
fn write_manifest(dir: &TempDir, contents: &str) {
    fs::write(dir.path().join("Slipway.toml"), contents).unwrap();
}

const MATRIX_MANIFEST: &str = r#"
[pipeline]
name = "matrix"

[[axis]]
name = "platform"
[[axis.value]]
name = "linux"
flags = ["--linux"]
[[axis.value]]
name = "windows"

[[axis]]
name = "linkage"
[[axis.value]]
name = "static"
[[axis.value]]
name = "dll"

[[exclude]]
platform = "linux"
linkage = "dll"

[[step]]
name = "build"
program = "echo"
args = ["building"]
"#;

// ============================================================================
// slipway init
// ============================================================================

#[test]
fn test_init_creates_manifest() {
    let tmp = temp_dir();

    slipway()
        .args(["init", "--name", "myproj"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let manifest = fs::read_to_string(tmp.path().join("Slipway.toml")).unwrap();
    assert!(manifest.contains("name = \"myproj\""));
    assert!(manifest.contains("[[axis]]"));
    assert!(manifest.contains("[[step]]"));
}

#[test]
fn test_init_fails_if_manifest_exists() {
    let tmp = temp_dir();
    write_manifest(&tmp, "[pipeline]\nname = \"existing\"\n");

    slipway()
        .args(["init"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_scaffold_validates() {
    let tmp = temp_dir();

    slipway()
        .args(["init", "--name", "scaffold"])
        .current_dir(tmp.path())
        .assert()
        .success();

    slipway()
        .args(["validate"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("2 job(s)"));
}

// ============================================================================
// slipway plan
// ============================================================================

#[test]
fn test_plan_lists_expanded_jobs() {
    let tmp = temp_dir();
    write_manifest(&tmp, MATRIX_MANIFEST);

    slipway()
        .args(["plan"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("linux-static")
                .and(predicate::str::contains("windows-dll"))
                .and(predicate::str::contains("3 job(s)")),
        );
}

#[test]
fn test_plan_excludes_combination() {
    let tmp = temp_dir();
    write_manifest(&tmp, MATRIX_MANIFEST);

    slipway()
        .args(["plan"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("linux-dll").not());
}

#[test]
fn test_plan_json_output() {
    let tmp = temp_dir();
    write_manifest(&tmp, MATRIX_MANIFEST);

    let output = slipway()
        .args(["plan", "--format", "json"])
        .current_dir(tmp.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["jobs"].as_array().unwrap().len(), 3);
}

#[test]
fn test_plan_without_manifest_fails() {
    let tmp = temp_dir();

    slipway()
        .args(["plan"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("slipway init"));
}

// ============================================================================
// slipway validate
// ============================================================================

#[test]
fn test_validate_reports_empty_axis() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "broken"

        [[axis]]
        name = "platform"
        value = []

        [[step]]
        name = "build"
        program = "make"
        "#,
    );

    slipway()
        .args(["validate"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no values"));
}

#[test]
fn test_validate_warns_on_fully_excluded_matrix() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "hollow"

        [[axis]]
        name = "platform"
        [[axis.value]]
        name = "linux"

        [[exclude]]
        platform = "linux"

        [[step]]
        name = "build"
        program = "make"
        "#,
    );

    slipway()
        .args(["validate"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("zero jobs"));
}

// ============================================================================
// slipway run
// ============================================================================

#[cfg(unix)]
#[test]
fn test_run_passing_pipeline() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "green"

        [[step]]
        name = "build"
        program = "echo"
        args = ["ok"]
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("1 job(s) passed"));
}

#[cfg(unix)]
#[test]
fn test_run_failing_step_retains_logs() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "red"

        [[step]]
        name = "explode"
        program = "sh"
        args = ["-c", "echo boom >&2; exit 7"]
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("exited 7").and(predicate::str::contains("1 of 1 job(s)")),
        );

    // Logs land under the retention root keyed by the job.
    let retained = tmp.path().join(".slipway/retained/default");
    assert!(retained.join("logs/01-explode.log").is_file());
    let log = fs::read_to_string(retained.join("logs/01-explode.log")).unwrap();
    assert!(log.contains("boom"));
    assert!(tmp.path().join(".slipway/retained/default.tar.gz").is_file());
}

#[cfg(unix)]
#[test]
fn test_run_artifact_count_mismatch_fails_with_actual() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "counted"

        [[step]]
        name = "package"
        program = "sh"
        args = ["-c", "mkdir -p dist && touch dist/a.rpm"]

        [[expect]]
        kind = "artifact-count"
        pattern = "dist/*.rpm"
        count = 2
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("found 1"));
}

#[cfg(unix)]
#[test]
fn test_run_artifact_count_match_passes() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "counted"

        [[step]]
        name = "package"
        program = "sh"
        args = ["-c", "mkdir -p dist && touch dist/a.rpm dist/b.rpm"]

        [[expect]]
        kind = "artifact-count"
        pattern = "dist/*.rpm"
        count = 2
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn test_run_forbidden_token_fails() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "compat"

        [[step]]
        name = "generate"
        program = "sh"
        args = ["-c", "echo '#define HAVE_OLD_COMPAT 1' > config.h"]

        [[expect]]
        kind = "absent"
        file = "config.h"
        token = "HAVE_OLD_COMPAT"
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("HAVE_OLD_COMPAT"));
}

#[cfg(unix)]
#[test]
fn test_run_timeout_fails_without_hanging() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "stuck"

        [limits]
        job_timeout_secs = 1

        [[step]]
        name = "hang"
        program = "sh"
        args = ["-c", "sleep 60"]
        "#,
    );

    let start = std::time::Instant::now();
    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("timed out in step `hang`"));
    assert!(start.elapsed() < std::time::Duration::from_secs(30));
}

#[cfg(unix)]
#[test]
fn test_run_rejected_event_executes_nothing() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "push-only"

        [trigger]
        events = ["push"]

        [[step]]
        name = "build"
        program = "echo"
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "pull-request"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("not admitted"));
}

#[cfg(unix)]
#[test]
fn test_run_test_phase_failure_is_verification_failure() {
    let tmp = temp_dir();
    write_manifest(
        &tmp,
        r#"
        [pipeline]
        name = "checked"

        [[step]]
        name = "build"
        program = "echo"
        args = ["built"]

        [[step]]
        name = "check"
        program = "sh"
        args = ["-c", "exit 5"]
        test = true
        "#,
    );

    slipway()
        .args(["run", "--ref", "master", "--event", "push"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("test phase `check` exited 5"));
}
