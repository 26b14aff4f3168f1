//! Test logging setup.

use tracing_subscriber::EnvFilter;

/// Set up test logging with the given filter.
///
/// Output goes through the test writer, so it is captured per test. Only the
/// first call in a process installs a subscriber; later calls are no-ops.
///
/// ```rust,ignore
/// use lifeline_test::setup_test_logging;
///
/// #[test]
/// fn my_test() {
///     setup_test_logging("lifeline_presence=trace");
///     // ... test code
/// }
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging at `warn`, or at `LIFELINE_LOG` when set.
pub fn init_test_logging() {
    let filter = std::env::var("LIFELINE_LOG").unwrap_or_else(|_| "warn".to_string());
    setup_test_logging(&filter);
}
