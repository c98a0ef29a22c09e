// tests/forked_execution.rs

#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::*;
use execwatch::command::redirect::RedirectionSpec;
use execwatch::errors::ExecError;
use execwatch::exec::{ProcessLauncher, Redirector};
use execwatch::exec::result::KILLED_EXIT_CODE;
use execwatch::types::Severity;
use tempfile::TempDir;

#[tokio::test]
async fn exit_code_of_forked_entry_point_is_reported() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    for code in [0, 1, 7] {
        let spec = forked_entry("Exit").arg(code.to_string()).build().unwrap();
        let redirector = Redirector::new(&RedirectionSpec::inherit(), dir.path(), reporter.clone());
        let run = with_timeout(launcher.run(&spec, redirector)).await.unwrap();
        assert_eq!(run.result.exit_code, code);
        assert!(!run.result.timed_out);
        assert!(!run.result.killed);
    }
}

#[tokio::test]
async fn exit_code_of_artifact_is_reported() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = shell("exit 42").build().unwrap();
    let redirector = Redirector::new(&RedirectionSpec::inherit(), dir.path(), reporter);
    let run = with_timeout(launcher.run(&spec, redirector)).await.unwrap();

    assert_eq!(run.result.exit_code, 42);
    assert!(run.result.is_failure());
}

#[tokio::test]
async fn forked_echo_writes_output_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("Echo").arg("hi").build().unwrap();
    let redirect = RedirectionSpec::builder().output("out.txt").build().unwrap();
    let redirector = Redirector::new(&redirect, dir.path(), reporter);
    let run = with_timeout(launcher.run(&spec, redirector)).await.unwrap();

    assert_eq!(run.result.exit_code, 0);
    assert_eq!(read(&dir.path().join("out.txt")), "hi\n");
}

#[tokio::test]
async fn timeout_kills_process_and_reports_it() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("Sleep")
        .arg("10000")
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let redirector = Redirector::new(&RedirectionSpec::inherit(), dir.path(), reporter);

    let started = Instant::now();
    let handle = launcher.launch(&spec, redirector).unwrap();
    let pid = handle.id().expect("child has a pid");
    let run = with_timeout(launcher.await_completion(handle)).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(run.result.timed_out);
    assert!(run.result.killed);
    assert_eq!(run.result.exit_code, KILLED_EXIT_CODE);
    assert!(!process_alive(pid), "process {pid} survived its timeout");
    assert!(rec.logged(Severity::Warn, "Timeout: killed the sub-process"));
}

#[tokio::test]
async fn timeout_longer_than_runtime_is_not_triggered() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("Exit")
        .arg("3")
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let redirector = Redirector::new(&RedirectionSpec::inherit(), dir.path(), reporter);
    let run = with_timeout(launcher.run(&spec, redirector)).await.unwrap();

    assert_eq!(run.result.exit_code, 3);
    assert!(!run.result.timed_out);
    assert!(!run.result.killed);
    assert!(!rec.logged(Severity::Warn, "Timeout"));
}

#[tokio::test]
async fn timeout_kills_grandchildren_holding_the_pipe() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    // The background sleep inherits stdout; only a group kill closes it.
    let spec = shell("sleep 30 & echo started; wait")
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let redirect = RedirectionSpec::builder()
        .output_property("out")
        .build()
        .unwrap();
    let redirector = Redirector::new(&redirect, dir.path(), reporter);

    let started = Instant::now();
    let run = with_timeout(launcher.run(&spec, redirector)).await.unwrap();

    assert!(run.result.timed_out);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(run.captured.get("out"), Some("started\n"));
}

#[tokio::test]
async fn concurrent_invocations_keep_their_own_environment_and_directory() {
    init_tracing();
    let base = TempDir::new().unwrap();
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(base.path(), reporter.clone());

    let spec_a = shell("echo $WHO; pwd")
        .env("WHO", "alpha")
        .working_dir(dir_a.path())
        .build()
        .unwrap();
    let spec_b = shell("echo $WHO; pwd")
        .env("WHO", "beta")
        .working_dir(dir_b.path())
        .build()
        .unwrap();
    let capture = RedirectionSpec::builder()
        .output_property("out")
        .build()
        .unwrap();

    let (a, b) = with_timeout(async {
        tokio::join!(
            launcher.run(&spec_a, Redirector::new(&capture, base.path(), reporter.clone())),
            launcher.run(&spec_b, Redirector::new(&capture, base.path(), reporter.clone())),
        )
    })
    .await;
    let (a, b) = (a.unwrap(), b.unwrap());

    let out_a = a.captured.get("out").unwrap().to_string();
    let out_b = b.captured.get("out").unwrap().to_string();
    let canon_a = dir_a.path().canonicalize().unwrap();
    let canon_b = dir_b.path().canonicalize().unwrap();

    assert!(out_a.starts_with("alpha\n"));
    assert!(out_b.starts_with("beta\n"));
    assert!(out_a.contains(canon_a.to_str().unwrap()));
    assert!(out_b.contains(canon_b.to_str().unwrap()));
    assert!(std::env::var("WHO").is_err(), "host environment was touched");
}

#[tokio::test]
async fn new_environment_hides_inherited_variables() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = shell("echo \"[$HOME][$ONLY]\"")
        .env("ONLY", "me")
        .new_environment(true)
        .build()
        .unwrap();
    let capture = RedirectionSpec::builder()
        .output_property("out")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&capture, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(run.captured.get("out"), Some("[][me]\n"));
}

#[tokio::test]
async fn extended_environment_keeps_inherited_variables() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let inherited_path = std::env::var("PATH").unwrap_or_default();
    let spec = shell("echo \"$PATH|$EXTRA\"")
        .env("EXTRA", "yes")
        .build()
        .unwrap();
    let capture = RedirectionSpec::builder()
        .output_property("out")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&capture, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(
        run.captured.get("out"),
        Some(format!("{inherited_path}|yes\n").as_str())
    );
}

#[tokio::test]
async fn forked_entry_point_sees_configured_variable() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("PrintEnv")
        .arg("EXECWATCH_TEST_VAR")
        .env("EXECWATCH_TEST_VAR", "set")
        .build()
        .unwrap();
    let capture = RedirectionSpec::builder()
        .output_property("out")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&capture, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(run.captured.get("out"), Some("set\n"));
}

#[tokio::test]
async fn system_properties_reach_forked_entry_point() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("PrintProperty")
        .arg("color")
        .property("color", "blue")
        .build()
        .unwrap();
    let capture = RedirectionSpec::builder()
        .output_property("out")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&capture, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(run.result.exit_code, 0);
    assert_eq!(run.captured.get("out"), Some("blue\n"));
}

#[tokio::test]
async fn missing_working_directory_is_a_configuration_error() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let marker = dir.path().join("ran");
    let spec = shell(&format!("touch {}", marker.display()))
        .working_dir(dir.path().join("does-not-exist"))
        .build()
        .unwrap();
    let err = launcher
        .run(&spec, Redirector::new(&RedirectionSpec::inherit(), dir.path(), reporter))
        .await
        .unwrap_err();

    assert!(err.is_configuration(), "got {err:?}");
    assert!(!marker.exists());
}

#[tokio::test]
async fn unlaunchable_artifact_is_an_execution_error() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = execwatch::command::CommandSpec::builder()
        .artifact(dir.path().join("no-such-tool"))
        .fork(true)
        .build()
        .unwrap();
    let err = launcher
        .run(&spec, Redirector::new(&RedirectionSpec::inherit(), dir.path(), reporter))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Execution(_)), "got {err:?}");
}

#[tokio::test]
async fn literal_input_is_fed_to_stdin() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("Cat").build().unwrap();
    let redirect = RedirectionSpec::builder()
        .input_string("line one\nline two\n")
        .output_property("out")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&redirect, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(run.captured.get("out"), Some("line one\nline two\n"));
}

#[tokio::test]
async fn input_file_is_fed_to_stdin() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.txt"), "from file\n").unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = shell("cat").build().unwrap();
    let redirect = RedirectionSpec::builder()
        .input("in.txt")
        .output_property("out")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&redirect, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(run.captured.get("out"), Some("from file\n"));
}

#[tokio::test]
async fn missing_input_file_fails_before_spawn() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let marker = dir.path().join("ran");
    let spec = shell(&format!("touch {}", marker.display())).build().unwrap();
    let redirect = RedirectionSpec::builder().input("absent.txt").build().unwrap();
    let result = launcher
        .run(&spec, Redirector::new(&redirect, dir.path(), reporter))
        .await;

    assert!(result.is_err());
    assert!(!marker.exists());
}

#[tokio::test]
async fn stderr_follows_stdout_into_the_same_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = shell("echo out; echo err 1>&2").build().unwrap();
    let redirect = RedirectionSpec::builder().output("both.txt").build().unwrap();
    with_timeout(launcher.run(&spec, Redirector::new(&redirect, dir.path(), reporter)))
        .await
        .unwrap();

    let content = read(&dir.path().join("both.txt"));
    assert!(content.contains("out\n"));
    assert!(content.contains("err\n"));
    assert_eq!(content.len(), "out\nerr\n".len());
}

#[tokio::test]
async fn log_error_reports_stderr_lines() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = forked_entry("EchoErr").arg("something broke").build().unwrap();
    let redirect = RedirectionSpec::builder().log_error(true).build().unwrap();
    with_timeout(launcher.run(&spec, Redirector::new(&redirect, dir.path(), reporter)))
        .await
        .unwrap();

    assert!(rec.logged(Severity::Warn, "something broke"));
}

#[tokio::test]
async fn separate_error_capture() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (_rec, reporter) = recorder();
    let launcher = ProcessLauncher::new(dir.path(), reporter.clone());

    let spec = shell("echo out; echo err 1>&2").build().unwrap();
    let redirect = RedirectionSpec::builder()
        .output_property("o")
        .error_property("e")
        .build()
        .unwrap();
    let run = with_timeout(launcher.run(&spec, Redirector::new(&redirect, dir.path(), reporter)))
        .await
        .unwrap();

    assert_eq!(run.captured.get("o"), Some("out\n"));
    assert_eq!(run.captured.get("e"), Some("err\n"));
}
