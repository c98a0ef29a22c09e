// tests/failure_policy.rs

mod common;

use std::sync::Arc;

use common::*;
use execwatch::command::CommandSpec;
use execwatch::errors::ExecError;
use execwatch::report::{MemoryStore, OutputStore};
use execwatch::task::{ExecTask, FailurePolicy};
use execwatch::types::Severity;
use tempfile::TempDir;

fn task(spec: CommandSpec, dir: &TempDir, policy: FailurePolicy) -> (ExecTask, MemoryStore, RecordingReporter) {
    let store = MemoryStore::new();
    let (rec, reporter) = recorder();
    let shared: Arc<dyn OutputStore> = Arc::new(store.clone());
    let task = ExecTask::new("job", spec, dir.path())
        .with_policy(policy)
        .with_reporter(reporter)
        .with_store(shared);
    (task, store, rec)
}

fn lenient(result_property: &str) -> FailurePolicy {
    FailurePolicy {
        fail_on_error: false,
        result_property: Some(result_property.to_string()),
    }
}

fn strict() -> FailurePolicy {
    FailurePolicy {
        fail_on_error: true,
        result_property: Some("rc".to_string()),
    }
}

#[tokio::test]
async fn lenient_failure_is_logged_and_publishes_the_true_code() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = CommandSpec::builder().entry_point("Exit").arg("1").build().unwrap();
    let (task, store, rec) = task(spec, &dir, lenient("rc"));

    let report = task.execute().await.unwrap();

    assert_eq!(report.exit_code, 0);
    assert!(report.recovered);
    assert_eq!(report.result.map(|r| r.exit_code), Some(1));
    assert_eq!(store.get("rc").as_deref(), Some("1"));
    assert!(rec.logged(Severity::Error, "Result: 1"));
}

#[tokio::test]
async fn strict_failure_is_raised_with_the_code() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = CommandSpec::builder().entry_point("Exit").arg("5").build().unwrap();
    let (task, store, _rec) = task(spec, &dir, strict());

    let err = task.execute().await.unwrap_err();

    assert!(matches!(err, ExecError::Failed { code: 5 }));
    assert_eq!(err.to_string(), "process returned: 5");
    assert_eq!(store.get("rc"), None);
}

#[tokio::test]
async fn success_publishes_zero() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = CommandSpec::builder().entry_point("Exit").build().unwrap();
    let (task, store, _rec) = task(spec, &dir, strict());

    let report = task.execute().await.unwrap();

    assert_eq!(report.exit_code, 0);
    assert!(!report.recovered);
    assert_eq!(store.get("rc").as_deref(), Some("0"));
}

#[tokio::test]
async fn lenient_execution_error_is_logged_without_a_result() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = CommandSpec::builder().entry_point("Fail").arg("kaput").build().unwrap();
    let (task, store, rec) = task(spec, &dir, lenient("rc"));

    let report = task.execute().await.unwrap();

    assert_eq!(report.exit_code, 0);
    assert!(report.recovered);
    assert_eq!(report.result, None);
    assert_eq!(store.get("rc"), None);
    assert!(rec.logged(Severity::Error, "kaput"));
}

#[tokio::test]
async fn strict_execution_error_is_raised() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = CommandSpec::builder().entry_point("Fail").build().unwrap();
    let (task, _store, _rec) = task(spec, &dir, strict());

    let err = task.execute().await.unwrap_err();
    assert!(matches!(err, ExecError::Execution(_)));
}

#[tokio::test]
async fn configuration_error_is_fatal_even_when_lenient() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = CommandSpec::builder()
        .entry_point("Echo")
        .fork(true)
        .launcher(entry_launcher())
        .working_dir(dir.path().join("missing"))
        .build()
        .unwrap();
    let (task, store, _rec) = task(spec, &dir, lenient("rc"));

    let err = task.execute().await.unwrap_err();

    assert!(err.is_configuration());
    assert!(store.snapshot().is_empty());
}

#[test]
fn artifact_and_entry_point_together_is_a_configuration_error() {
    let err = CommandSpec::builder()
        .artifact("tool.bin")
        .entry_point("Echo")
        .fork(true)
        .build()
        .unwrap_err();
    assert!(err.is_configuration());

    let err = CommandSpec::builder().build().unwrap_err();
    assert!(err.is_configuration());

    let err = CommandSpec::builder().artifact("tool.bin").build().unwrap_err();
    assert!(err.is_configuration());
}

#[cfg(unix)]
#[tokio::test]
async fn lenient_forked_timeout_publishes_killed_code() {
    use std::time::Duration;

    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = forked_entry("Sleep")
        .arg("10000")
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let (task, store, rec) = task(spec, &dir, lenient("rc"));

    let report = with_timeout(task.execute()).await.unwrap();

    assert_eq!(report.exit_code, 0);
    assert!(report.result.is_some_and(|r| r.timed_out && r.killed));
    assert_eq!(store.get("rc").as_deref(), Some("-1"));
    assert!(rec.logged(Severity::Warn, "Timeout"));
}

#[cfg(unix)]
#[tokio::test]
async fn forked_capture_is_published_to_the_store() {
    use execwatch::command::redirect::RedirectionSpec;

    init_tracing();
    let dir = TempDir::new().unwrap();
    let spec = forked_entry("Echo").arg("captured").build().unwrap();
    let (task, store, _rec) = task(spec, &dir, strict());
    let task = task.with_redirection(
        RedirectionSpec::builder()
            .output_property("out")
            .build()
            .unwrap(),
    );

    with_timeout(task.execute()).await.unwrap();

    assert_eq!(store.get("out").as_deref(), Some("captured\n"));
    assert_eq!(store.get("rc").as_deref(), Some("0"));
}
