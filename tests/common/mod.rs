#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use execwatch::command::CommandSpecBuilder;
use execwatch::command::CommandSpec;
use execwatch::exec::EntryPointRegistry;
use execwatch::report::Reporter;

pub use execwatch_test_utils::{RecordingReporter, init_tracing, with_timeout};

/// Launcher prefix that runs a forked entry point through this crate's binary.
pub fn entry_launcher() -> Vec<String> {
    vec![env!("CARGO_BIN_EXE_execwatch").to_string(), "entry".to_string()]
}

/// Builder for a forked entry point run through [`entry_launcher`].
pub fn forked_entry(name: &str) -> CommandSpecBuilder {
    CommandSpec::builder()
        .launcher(entry_launcher())
        .entry_point(name)
        .fork(true)
}

/// Builder for a forked `sh -c <script>`.
pub fn shell(script: &str) -> CommandSpecBuilder {
    CommandSpec::builder()
        .artifact("/bin/sh")
        .args(["-c", script])
        .fork(true)
}

pub fn recorder() -> (RecordingReporter, Arc<dyn Reporter>) {
    let rec = RecordingReporter::new();
    let shared: Arc<dyn Reporter> = Arc::new(rec.clone());
    (rec, shared)
}

pub fn builtins() -> Arc<EntryPointRegistry> {
    Arc::new(EntryPointRegistry::with_builtins())
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// True while `pid` names a live (or unreaped) process.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}
