//! Tracing initialisation helpers for tests.
//!
//! [`init_test_tracing`] routes events to the test-harness writer;
//! [`capture_logs`] additionally lets a test assert on what was logged.

use evloop_core::{LogCollector, LogReader};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise a global subscriber that writes to the test-harness writer
/// and respects `RUST_LOG`. Later calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Capture every event emitted on the current thread until the guard is
/// dropped.
///
/// ```ignore
/// let (logs, _guard) = capture_logs();
/// engine.run(-1)?;
/// assert_eq!(logs.warnings_and_errors(), (0, 1));
/// ```
pub fn capture_logs() -> (LogReader, DefaultGuard) {
    let collector = LogCollector::new(1024);
    let reader = collector.reader();
    let guard = tracing_subscriber::registry()
        .with(collector)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .set_default();
    (reader, guard)
}
