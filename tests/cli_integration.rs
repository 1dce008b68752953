//! Integration tests for the Foreman CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the foreman binary
fn foreman() -> Command {
    Command::new(cargo::cargo_bin!("foreman"))
}

fn in_project(temp: &TempDir) -> Command {
    let mut cmd = foreman();
    cmd.arg("--project").arg(temp.path());
    cmd
}

const PLAN: &str = r#"{
  "name": "shop",
  "components": [
    {"id": "db", "name": "Database"},
    {"id": "api", "name": "API", "dependencies": ["db"]}
  ],
  "tasks": [
    {"id": "t-api", "component_id": "api", "description": "Handlers", "prerequisites": ["t-db"]},
    {"id": "t-db", "component_id": "db", "description": "Schema", "priority": "high"}
  ]
}"#;

fn write_plan(dir: &Path, content: &str) {
    fs::write(dir.join("plan.json"), content).unwrap();
}

/// An executor that completes every task and writes one file.
fn write_executor_config(dir: &Path) {
    let meta = dir.join(".foreman");
    fs::create_dir_all(&meta).unwrap();
    fs::write(
        meta.join("foreman.toml"),
        r#"[collaborators]
executor = ["sh", "-c", '''cat > /dev/null; printf '{"files": {"main.py": "print(1)"}, "completed": true}' ''']
"#,
    )
    .unwrap();
}

#[test]
fn test_help() {
    foreman()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dependency-aware build loop"));
}

#[test]
fn test_version() {
    foreman()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_status_not_started() {
    let temp = TempDir::new().unwrap();

    in_project(&temp)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"not_started\""));
}

#[test]
fn test_validate_clean_plan() {
    let temp = TempDir::new().unwrap();
    write_plan(temp.path(), PLAN);

    in_project(&temp)
        .arg("validate")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 components, 2 tasks"))
        .stdout(predicate::str::contains("No planning defects"));
}

#[test]
fn test_validate_reports_dangling_prerequisite() {
    let temp = TempDir::new().unwrap();
    write_plan(
        temp.path(),
        r#"{"components": [{"id": "a", "name": "A"}],
            "tasks": [{"id": "t1", "component_id": "a", "prerequisites": ["ghost"]}]}"#,
    );

    in_project(&temp)
        .arg("validate")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ghost"));
}

#[test]
fn test_invalid_plan_exit_code() {
    let temp = TempDir::new().unwrap();
    write_plan(
        temp.path(),
        r#"{"components": [{"id": "a", "name": "A"}, {"id": "a", "name": "again"}], "tasks": []}"#,
    );

    in_project(&temp)
        .arg("validate")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .assert()
        .code(4);
}

#[test]
fn test_next_prefers_ready_task() {
    let temp = TempDir::new().unwrap();
    write_plan(temp.path(), PLAN);

    in_project(&temp)
        .arg("next")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("t-db"))
        .stdout(predicate::str::contains("prerequisites met"));
}

#[test]
fn test_run_without_executor_fails() {
    let temp = TempDir::new().unwrap();
    write_plan(temp.path(), PLAN);

    in_project(&temp)
        .arg("run")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .assert()
        .code(7)
        .stderr(predicate::str::contains("executor"));
}

#[cfg(unix)]
#[test]
fn test_run_completes_plan_and_reports_status() {
    let temp = TempDir::new().unwrap();
    write_plan(temp.path(), PLAN);
    write_executor_config(temp.path());

    in_project(&temp)
        .arg("run")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .arg("--no-test")
        .assert()
        .success()
        .stdout(predicate::str::contains("done_all_complete"))
        .stdout(predicate::str::contains("Components: 2/2"));

    assert!(temp.path().join(".foreman/progress.json").exists());
    assert!(temp.path().join(".foreman/plan.json").exists());

    in_project(&temp)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"completed\""))
        .stdout(predicate::str::contains("\"iteration\": 2"));

    // The copied plan is the default for later commands.
    in_project(&temp)
        .arg("next")
        .assert()
        .success()
        .stdout(predicate::str::contains("No incomplete tasks remain"));
}

#[cfg(unix)]
#[test]
fn test_run_respects_max_iterations_and_resumes() {
    let temp = TempDir::new().unwrap();
    write_plan(temp.path(), PLAN);
    write_executor_config(temp.path());

    in_project(&temp)
        .args(["run", "--no-test", "--max-iterations", "1", "--plan"])
        .arg(temp.path().join("plan.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("done_max_iterations"));

    in_project(&temp)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"in_progress\""));

    in_project(&temp)
        .args(["run", "--no-test", "--resume"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming after iteration 1"))
        .stdout(predicate::str::contains("done_all_complete"));
}

#[test]
fn test_reset_requires_force() {
    let temp = TempDir::new().unwrap();
    let meta = temp.path().join(".foreman");
    fs::create_dir_all(&meta).unwrap();
    fs::write(
        meta.join("progress.json"),
        r#"{"version": 1, "iteration": 1, "completion_status": {}, "artifact_mapping": {}, "last_updated": "2026-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    in_project(&temp).arg("reset").assert().code(1);
    assert!(meta.join("progress.json").exists());

    in_project(&temp)
        .args(["reset", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress record deleted"));
    assert!(!meta.join("progress.json").exists());
}

#[test]
fn test_list_finds_projects() {
    let workspace = TempDir::new().unwrap();
    fs::create_dir_all(workspace.path().join("alpha/.foreman")).unwrap();
    fs::create_dir_all(workspace.path().join("beta/.foreman")).unwrap();
    fs::create_dir_all(workspace.path().join("not-a-project")).unwrap();

    foreman()
        .arg("list")
        .arg("--workspace")
        .arg(workspace.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha"))
        .stdout(predicate::str::contains("beta"))
        .stdout(predicate::str::contains("not-a-project").not());
}

#[test]
fn test_config_show_defaults() {
    let temp = TempDir::new().unwrap();

    in_project(&temp)
        .args(["config", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_iterations\": 1000"));
}

#[test]
fn test_config_validate_rejects_empty_command() {
    let temp = TempDir::new().unwrap();
    let meta = temp.path().join(".foreman");
    fs::create_dir_all(&meta).unwrap();
    fs::write(meta.join("foreman.toml"), "[collaborators]\nexecutor = []\n").unwrap();

    in_project(&temp)
        .args(["config", "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("collaborators.executor"));
}
