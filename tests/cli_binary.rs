// tests/cli_binary.rs

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn execwatch() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_execwatch"));
    cmd.env_remove("EXECWATCH_LOG");
    cmd
}

#[test]
fn entry_subcommand_exits_with_requested_code() {
    let status = execwatch().args(["entry", "--", "Exit", "9"]).status().unwrap();
    assert_eq!(status.code(), Some(9));
}

#[test]
fn entry_subcommand_prints_properties() {
    let output = execwatch()
        .args(["entry", "-D", "who=world", "--", "PrintProperty", "who"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "world\n");
}

#[test]
fn entry_subcommand_unknown_name_fails() {
    let status = execwatch().args(["entry", "--", "NoSuchThing"]).status().unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn run_prints_published_variables() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("Execwatch.toml");
    fs::write(
        &config,
        r#"
[job.hello]
entry_point = "Echo"
args = ["hi"]
output = "hello.txt"
result_property = "hello.rc"

[job.lenient]
entry_point = "Exit"
args = ["2"]
fail_on_error = false
result_property = "lenient.rc"
"#,
    )
    .unwrap();

    let output = execwatch()
        .args(["run", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello.rc=0"));
    assert!(stdout.contains("lenient.rc=2"));
    assert_eq!(fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hi\n");
}

#[test]
fn run_stops_on_strict_failure() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("Execwatch.toml");
    fs::write(
        &config,
        r#"
[default]
fail_on_error = true

[job.a_fails]
entry_point = "Exit"
args = ["3"]

[job.b_never_runs]
entry_point = "Echo"
args = ["late"]
output = "late.txt"
"#,
    )
    .unwrap();

    let output = execwatch()
        .args(["run", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("process returned: 3"));
    assert!(!dir.path().join("late.txt").exists());
}

#[test]
fn dry_run_lists_jobs_without_running_them() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("Execwatch.toml");
    fs::write(
        &config,
        r#"
[job.writer]
entry_point = "Echo"
args = ["x"]
output = "written.txt"
fork = true
timeout = "1s"
"#,
    )
    .unwrap();

    let output = execwatch()
        .args(["run", "--dry-run", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("writer"));
    assert!(stdout.contains("timeout: 1s"));
    assert!(!dir.path().join("written.txt").exists());
}
