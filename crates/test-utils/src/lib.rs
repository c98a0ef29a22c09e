//! Fixtures shared by the `execwatch` integration tests.

pub mod builders;
pub mod recording_reporter;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use recording_reporter::RecordingReporter;

/// Upper bound for any single awaited step in a test.
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Route `tracing` output through the test writer, once per test binary.
///
/// Output only shows for failing tests (or with `--nocapture`). The filter
/// is read from `EXECWATCH_LOG`, then `RUST_LOG`; without either, execwatch
/// logs at debug and everything else at warn.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = ["EXECWATCH_LOG", "RUST_LOG"]
            .into_iter()
            .find_map(|var| EnvFilter::try_from_env(var).ok())
            .unwrap_or_else(|| EnvFilter::new("warn,execwatch=debug"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, failing the test if it outlives [`TEST_DEADLINE`].
///
/// Forked runs that leak a child or a drain hang forever otherwise.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_DEADLINE:?}"),
    }
}
