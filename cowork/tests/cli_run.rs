//! CLI tests for `cowork run` and `cowork validate`.
//!
//! Spawns the cowork binary and verifies exit codes and workspace effects
//! for matched, unmatched, dry-run, and invalid-plan inputs.

use std::fs;
use std::path::Path;
use std::process::Command;

use cowork::exit_codes;

fn cowork(workspace: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_cowork"))
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .output()
        .expect("run cowork")
}

#[test]
fn run_organize_goal_creates_folders() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("receipt1.pdf"), "pdf").expect("write");

    let output = cowork(temp.path(), &["run", "organize receipts", "--yes"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("documents").is_dir());
    assert!(temp.path().join("images").is_dir());
}

#[test]
fn dry_run_leaves_workspace_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("receipt1.pdf"), "pdf").expect("write");

    let output = cowork(temp.path(), &["run", "organize receipts", "--dry-run"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!temp.path().join("documents").exists());
    assert!(!temp.path().join("images").exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[DRY RUN] createFolder:"));
}

#[test]
fn unmatched_goal_exits_ok_without_changes() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cowork(temp.path(), &["run", "fold my laundry", "--yes"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no known pattern"));
}

#[test]
fn invalid_plan_file_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan_path = temp.path().join("plan.json");
    fs::write(
        &plan_path,
        r#"{"goal": "g", "steps": [{"type": "frobnicate"}]}"#,
    )
    .expect("write plan");

    let output = cowork(
        temp.path(),
        &["validate", "--plan", plan_path.to_str().expect("utf8 path")],
    );

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown step type"));
}

#[test]
fn plan_file_with_failing_step_exits_step_failed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan_path = temp.path().join("plan.json");
    fs::write(
        &plan_path,
        r#"{"goal": "g", "steps": [{"type": "readFiles", "path": "missing"}]}"#,
    )
    .expect("write plan");

    let output = cowork(
        temp.path(),
        &[
            "run",
            "ignored goal",
            "--yes",
            "--plan",
            plan_path.to_str().expect("utf8 path"),
        ],
    );

    assert_eq!(output.status.code(), Some(exit_codes::STEP_FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed"));
}
